//! Per-conversation unread/spam summaries derived from the message set.
//!
//! Everything here is a pure function of the messages passed in. The
//! incremental [`ThreadIndex`] and the [`ThreadObserver`] built on it only
//! skip recomputing conversations whose messages did not change; their output
//! always equals a full [`summarize`].
mod index;
mod observer;

pub use index::{ApplyStats, ThreadIndex};
pub use observer::ThreadObserver;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{is_spam, ConversationSummary, Message};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum ThreadFilter {
    #[default]
    All,
    Normal,
    Spam,
}

impl ThreadFilter {
    pub fn matches(&self, summary: &ConversationSummary) -> bool {
        match self {
            ThreadFilter::All => true,
            ThreadFilter::Normal => !summary.is_spam_conversation,
            ThreadFilter::Spam => summary.is_spam_conversation,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub struct ThreadCounts {
    pub all: usize,
    pub normal: usize,
    pub spam: usize,
}

/// The three conversation lists plus their counts, all read from the same
/// sorted summary list so a count can never disagree with its list.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ThreadViews {
    conversations: Vec<ConversationSummary>,
}

impl ThreadViews {
    pub fn from_summaries(mut conversations: Vec<ConversationSummary>) -> Self {
        conversations.sort_by(newest_first);
        Self { conversations }
    }

    pub fn all(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn filtered(&self, filter: ThreadFilter) -> Vec<&ConversationSummary> {
        self.conversations
            .iter()
            .filter(|summary| filter.matches(summary))
            .collect()
    }

    pub fn normal(&self) -> Vec<&ConversationSummary> {
        self.filtered(ThreadFilter::Normal)
    }

    pub fn spam(&self) -> Vec<&ConversationSummary> {
        self.filtered(ThreadFilter::Spam)
    }

    pub fn counts(&self) -> ThreadCounts {
        let spam = self
            .conversations
            .iter()
            .filter(|summary| summary.is_spam_conversation)
            .count();
        ThreadCounts {
            all: self.conversations.len(),
            normal: self.conversations.len() - spam,
            spam,
        }
    }

    pub fn get(&self, conversation_id: i64) -> Option<&ConversationSummary> {
        self.conversations
            .iter()
            .find(|summary| summary.conversation_id == conversation_id)
    }
}

fn newest_first(a: &ConversationSummary, b: &ConversationSummary) -> Ordering {
    (b.last_message_timestamp, b.last_message_id, b.conversation_id).cmp(&(
        a.last_message_timestamp,
        a.last_message_id,
        a.conversation_id,
    ))
}

/// Full recompute over the whole message set.
pub fn summarize(messages: &[Message]) -> ThreadViews {
    let summaries = group_by_conversation(messages)
        .into_iter()
        .filter_map(|(conversation_id, group)| summarize_conversation(conversation_id, &group))
        .collect();
    ThreadViews::from_summaries(summaries)
}

pub(crate) fn group_by_conversation(messages: &[Message]) -> BTreeMap<i64, Vec<&Message>> {
    let mut groups: BTreeMap<i64, Vec<&Message>> = BTreeMap::new();
    for message in messages {
        groups.entry(message.conversation_id).or_default().push(message);
    }
    groups
}

/// Summary of one conversation, or `None` for an empty one.
///
/// With unread messages the conversation is spam only when every unread
/// message is spam; a single unread legitimate message keeps it out of the
/// spam view. With nothing unread it is spam when any message is.
pub fn summarize_conversation(
    conversation_id: i64,
    messages: &[&Message],
) -> Option<ConversationSummary> {
    let last = messages.iter().max_by_key(|m| (m.timestamp, m.id))?;

    let mut unread_count = 0;
    let mut unread_spam_count = 0;
    for message in messages.iter().filter(|m| !m.read) {
        unread_count += 1;
        if is_spam(message.spam_score) {
            unread_spam_count += 1;
        }
    }
    let unread_normal_count = unread_count - unread_spam_count;

    let is_spam_conversation = if unread_count > 0 {
        unread_normal_count == 0
    } else {
        messages.iter().any(|m| is_spam(m.spam_score))
    };

    Some(ConversationSummary {
        conversation_id,
        peer_address: last.address.clone(),
        last_message_id: last.id,
        last_message_body: last.body.clone(),
        last_message_timestamp: last.timestamp,
        message_count: messages.len(),
        unread_count,
        unread_normal_count,
        unread_spam_count,
        is_spam_conversation,
    })
}
