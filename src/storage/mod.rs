mod db;
mod memory;

pub use db::{default_data_dir, Database};
pub use memory::MemoryStore;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::errors::StoreResult;
use crate::types::Message;

/// Full message set as seen after a mutation, newest first.
pub type Snapshot = Arc<Vec<Message>>;

/// The message store as the scoring engine sees it. Implementations must
/// tolerate concurrent external mutation.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Up to `limit` messages without a score, most recent first.
    async fn fetch_unscored(&self, limit: usize) -> StoreResult<Vec<Message>>;

    /// Like [`MessageStore::fetch_unscored`], skipping the ids in `exclude`.
    /// The default over-fetches by `exclude.len()` and filters.
    async fn fetch_unscored_excluding(
        &self,
        limit: usize,
        exclude: &HashSet<i64>,
    ) -> StoreResult<Vec<Message>> {
        let mut batch = self.fetch_unscored(limit + exclude.len()).await?;
        batch.retain(|m| !exclude.contains(&m.id));
        batch.truncate(limit);
        Ok(batch)
    }

    /// Sets the score if the message still exists and is still unscored.
    /// Returns `false` when nothing was written.
    async fn write_score(&self, id: i64, score: f32) -> StoreResult<bool>;

    async fn read(&self, id: i64) -> StoreResult<Option<Message>>;

    async fn delete(&self, ids: &[i64]) -> StoreResult<u64>;

    async fn unscored_count(&self) -> StoreResult<u64>;

    /// Live view of the message set. The current value is always the latest
    /// snapshot.
    fn subscribe(&self) -> watch::Receiver<Snapshot>;
}
