use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{ThreadIndex, ThreadViews};
use crate::storage::Snapshot;

/// Subscribes to store snapshots and republishes thread views. The task stops
/// when the store side closes or the observer is dropped.
pub struct ThreadObserver {
    views: watch::Receiver<Arc<ThreadViews>>,
    task: JoinHandle<()>,
}

impl ThreadObserver {
    pub fn spawn(mut source: watch::Receiver<Snapshot>) -> Self {
        let mut index = ThreadIndex::new();
        let initial = source.borrow_and_update().clone();
        index.apply(&initial);
        let (tx, views) = watch::channel(Arc::new(index.views()));

        let task = tokio::spawn(async move {
            while source.changed().await.is_ok() {
                let snapshot = source.borrow_and_update().clone();
                let stats = index.apply(&snapshot);
                debug!(
                    recomputed = stats.recomputed,
                    reused = stats.reused,
                    removed = stats.removed,
                    "Thread views refreshed"
                );
                if tx.send(Arc::new(index.views())).is_err() {
                    break;
                }
            }
        });

        Self { views, task }
    }

    /// The most recently published views.
    pub fn latest(&self) -> Arc<ThreadViews> {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ThreadViews>> {
        self.views.clone()
    }
}

impl Drop for ThreadObserver {
    fn drop(&mut self) {
        self.task.abort();
    }
}
