use std::collections::HashMap;

use super::{group_by_conversation, summarize_conversation, ThreadViews};
use crate::types::{ConversationSummary, Message};

struct CachedConversation {
    messages: Vec<Message>, // sorted by id
    summary: ConversationSummary,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    pub recomputed: usize,
    pub reused: usize,
    pub removed: usize,
}

/// Keeps the last summary of each conversation and recomputes only the
/// conversations whose messages differ from the previous snapshot.
#[derive(Default)]
pub struct ThreadIndex {
    conversations: HashMap<i64, CachedConversation>,
}

impl ThreadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, snapshot: &[Message]) -> ApplyStats {
        let mut stats = ApplyStats::default();
        let groups = group_by_conversation(snapshot);

        let before = self.conversations.len();
        self.conversations.retain(|id, _| groups.contains_key(id));
        stats.removed = before - self.conversations.len();

        for (conversation_id, mut group) in groups {
            group.sort_by_key(|m| m.id);

            let unchanged = self.conversations.get(&conversation_id).is_some_and(|cached| {
                cached.messages.len() == group.len()
                    && cached.messages.iter().zip(&group).all(|(a, b)| a == *b)
            });
            if unchanged {
                stats.reused += 1;
                continue;
            }

            if let Some(summary) = summarize_conversation(conversation_id, &group) {
                self.conversations.insert(
                    conversation_id,
                    CachedConversation {
                        messages: group.into_iter().cloned().collect(),
                        summary,
                    },
                );
                stats.recomputed += 1;
            }
        }

        stats
    }

    pub fn views(&self) -> ThreadViews {
        ThreadViews::from_summaries(
            self.conversations
                .values()
                .map(|cached| cached.summary.clone())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}
