use async_trait::async_trait;
use tracing::{debug, info};

use crate::types::{is_spam, Direction, Message};

/// Receives freshly scored messages. Implementations decide for themselves
/// whether to show anything and must apply [`should_surface`].
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, message: &Message);
}

/// Only inbound, non-spam messages reach the user.
pub fn should_surface(message: &Message) -> bool {
    message.direction == Direction::Inbound && !is_spam(message.spam_score)
}

/// Surfaces messages as log lines. Used by the CLI host.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, message: &Message) {
        if !should_surface(message) {
            debug!(message_id = message.id, score = ?message.spam_score, "Notification suppressed");
            return;
        }
        info!(
            message_id = message.id,
            from = %message.address,
            body = %message.body,
            "New message"
        );
    }
}
