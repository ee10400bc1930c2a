use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SPAM_THRESHOLD;
use crate::errors::ClassifyError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "inbound" => Some(Direction::Inbound),
            "outbound" => Some(Direction::Outbound),
            _ => None,
        }
    }
}

/// A short text message as held by the message store. The engine only ever
/// writes `spam_score`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub address: String,
    pub body: String,
    #[serde(default = "now_ms")]
    pub timestamp: i64, // epoch millis
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub seen: bool,
    #[serde(default)]
    pub spam_score: Option<f32>,
}

impl Message {
    pub fn is_scored(&self) -> bool {
        self.spam_score.is_some()
    }
}

/// Derived per-conversation view. Never persisted and never patched: every
/// change to the message set produces a new value.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub peer_address: String,
    pub last_message_id: i64,
    pub last_message_body: String,
    pub last_message_timestamp: i64,
    pub message_count: usize,
    pub unread_count: usize,
    pub unread_normal_count: usize,
    pub unread_spam_count: usize,
    pub is_spam_conversation: bool,
}

/// Outcome of classifying one text.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreResult {
    Scored(f32),
    NotReady,
    Failed(ClassifyError),
}

/// The single spam test. Unscored messages count as `0.0`.
pub fn is_spam(score: Option<f32>) -> bool {
    score.unwrap_or(0.0) > SPAM_THRESHOLD
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        assert!(!is_spam(Some(0.7)));
        assert!(is_spam(Some(0.7001)));
        assert!(!is_spam(None));
        assert!(is_spam(Some(1.0)));
    }
}
