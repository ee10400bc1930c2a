use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, RwLock};

use super::{MessageStore, Snapshot};
use crate::errors::StoreResult;
use crate::types::Message;

/// In-process message store with the same semantics as [`super::Database`].
pub struct MemoryStore {
    messages: RwLock<BTreeMap<i64, Message>>,
    changes: watch::Sender<Snapshot>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(Snapshot::default());
        Self {
            messages: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    pub async fn with_messages(messages: Vec<Message>) -> Self {
        let store = Self::new();
        store.insert_messages(&messages).await;
        store
    }

    fn publish(&self, messages: &BTreeMap<i64, Message>) {
        self.changes.send_replace(Arc::new(newest_first(messages.values())));
    }

    pub async fn insert_messages(&self, messages: &[Message]) -> u64 {
        let mut map = self.messages.write().await;
        let mut inserted = 0;
        for message in messages {
            if !map.contains_key(&message.id) {
                map.insert(message.id, message.clone());
                inserted += 1;
            }
        }
        if inserted > 0 {
            self.publish(&map);
        }
        inserted
    }

    pub async fn load_all(&self) -> Vec<Message> {
        newest_first(self.messages.read().await.values())
    }

    pub async fn conversation_messages(&self, conversation_id: i64) -> Vec<Message> {
        let map = self.messages.read().await;
        let mut out: Vec<Message> = map
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| (m.timestamp, m.id));
        out
    }

    pub async fn mark_conversation_read(&self, conversation_id: i64) -> u64 {
        let mut map = self.messages.write().await;
        let mut updated = 0;
        for message in map.values_mut() {
            if message.conversation_id == conversation_id && !message.read {
                message.read = true;
                updated += 1;
            }
        }
        if updated > 0 {
            self.publish(&map);
        }
        updated
    }

    pub async fn delete_conversations(&self, conversation_ids: &[i64]) -> u64 {
        let mut map = self.messages.write().await;
        let before = map.len();
        map.retain(|_, m| !conversation_ids.contains(&m.conversation_id));
        let removed = (before - map.len()) as u64;
        if removed > 0 {
            self.publish(&map);
        }
        removed
    }
}

fn newest_first<'a>(messages: impl Iterator<Item = &'a Message>) -> Vec<Message> {
    let mut out: Vec<Message> = messages.cloned().collect();
    out.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
    out
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn fetch_unscored(&self, limit: usize) -> StoreResult<Vec<Message>> {
        self.fetch_unscored_excluding(limit, &HashSet::new()).await
    }

    async fn fetch_unscored_excluding(
        &self,
        limit: usize,
        exclude: &HashSet<i64>,
    ) -> StoreResult<Vec<Message>> {
        let map = self.messages.read().await;
        let mut unscored = newest_first(
            map.values()
                .filter(|m| !m.is_scored() && !exclude.contains(&m.id)),
        );
        unscored.truncate(limit);
        Ok(unscored)
    }

    async fn write_score(&self, id: i64, score: f32) -> StoreResult<bool> {
        let mut map = self.messages.write().await;
        let written = match map.get_mut(&id) {
            Some(message) if message.spam_score.is_none() => {
                message.spam_score = Some(score);
                true
            }
            _ => false,
        };
        if written {
            self.publish(&map);
        }
        Ok(written)
    }

    async fn read(&self, id: i64) -> StoreResult<Option<Message>> {
        Ok(self.messages.read().await.get(&id).cloned())
    }

    async fn delete(&self, ids: &[i64]) -> StoreResult<u64> {
        let mut map = self.messages.write().await;
        let removed = ids.iter().filter(|id| map.remove(*id).is_some()).count() as u64;
        if removed > 0 {
            self.publish(&map);
        }
        Ok(removed)
    }

    async fn unscored_count(&self) -> StoreResult<u64> {
        let map = self.messages.read().await;
        Ok(map.values().filter(|m| !m.is_scored()).count() as u64)
    }

    fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.changes.subscribe()
    }
}
