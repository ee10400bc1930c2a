use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::BatchScorer;

/// Why a run is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Host started. Only runs when unscored messages exist; never notifies.
    Startup,
    /// A message was just stored.
    MessageReceived { notify: bool },
}

/// Queue in front of the [`BatchScorer`]. Sending never blocks: when the
/// queue is full the trigger is dropped, since the queued ones already
/// guarantee a run.
#[derive(Clone)]
pub struct ScorerHandle {
    sender: mpsc::Sender<Trigger>,
}

impl ScorerHandle {
    pub fn new(scorer: Arc<BatchScorer>) -> Self {
        let (sender, receiver) = mpsc::channel(8);
        let dispatcher = Dispatcher { receiver, scorer };
        tokio::spawn(async move { dispatcher.run().await });
        Self { sender }
    }

    /// Returns `false` when the trigger was coalesced or the dispatcher is gone.
    pub fn request(&self, trigger: Trigger) -> bool {
        match self.sender.try_send(trigger) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(?trigger, "Trigger queue full; coalescing");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(?trigger, "Scoring dispatcher stopped; trigger dropped");
                false
            }
        }
    }

    pub fn request_startup(&self) -> bool {
        self.request(Trigger::Startup)
    }

    pub fn message_received(&self, notify: bool) -> bool {
        self.request(Trigger::MessageReceived { notify })
    }
}

struct Dispatcher {
    receiver: mpsc::Receiver<Trigger>,
    scorer: Arc<BatchScorer>,
}

impl Dispatcher {
    async fn run(mut self) {
        info!("Scoring dispatcher started");
        while let Some(trigger) = self.receiver.recv().await {
            self.handle(trigger).await;
        }
        info!("Scoring dispatcher stopped");
    }

    async fn handle(&self, trigger: Trigger) {
        match trigger {
            Trigger::Startup => match self.scorer.store().unscored_count().await {
                Ok(0) => debug!("No unscored messages at startup"),
                Ok(pending) => {
                    info!(pending, "Unscored messages found at startup");
                    self.scorer.trigger(false);
                }
                Err(e) => warn!(error = %e, "Counting unscored messages failed"),
            },
            Trigger::MessageReceived { notify } => {
                self.scorer.trigger(notify);
            }
        }
    }
}
