//! Background batch scoring of unscored messages.
//!
//! A run goes `Idle -> Running -> Idle`. Only one run exists at a time: a
//! trigger that arrives while a run is active is dropped, so bursts of
//! triggers collapse into the run already in progress.
mod handle;

pub use handle::{ScorerHandle, Trigger};

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::classifier::SpamClassifier;
use crate::config::ScorerSettings;
use crate::errors::StoreResult;
use crate::notify::NotificationSink;
use crate::storage::MessageStore;
use crate::types::ScoreResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every unscored message was visited once. Failures wait for the next run.
    Drained,
    /// The classifier could not be loaded, or stopped being ready mid-run.
    NotReady,
    /// A store error or panic ended the run early.
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub scored: usize,
    pub failed: usize,
    pub vanished: usize,
    pub batches: usize,
    pub outcome: RunOutcome,
}

impl Default for RunReport {
    fn default() -> Self {
        Self {
            scored: 0,
            failed: 0,
            vanished: 0,
            batches: 0,
            outcome: RunOutcome::Drained,
        }
    }
}

/// Clears the running flag however the run ends, including cancellation.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct BatchScorer {
    store: Arc<dyn MessageStore>,
    classifier: Arc<SpamClassifier>,
    notifier: Arc<dyn NotificationSink>,
    settings: ScorerSettings,
    running: Arc<AtomicBool>,
}

impl BatchScorer {
    pub fn new(
        store: Arc<dyn MessageStore>,
        classifier: Arc<SpamClassifier>,
        notifier: Arc<dyn NotificationSink>,
        settings: ScorerSettings,
    ) -> Self {
        Self {
            store,
            classifier,
            notifier,
            settings,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a run on a background task. Returns `None` without doing
    /// anything when a run is already active.
    pub fn trigger(self: &Arc<Self>, notify: bool) -> Option<JoinHandle<RunReport>> {
        let Some(guard) = RunGuard::acquire(&self.running) else {
            debug!("Already processing messages, skipping");
            return None;
        };

        let scorer = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _guard = guard;
            scorer.drain(notify).await
        }))
    }

    /// Runs on the calling task. Same coalescing as [`BatchScorer::trigger`].
    pub async fn run(&self, notify: bool) -> Option<RunReport> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!("Already processing messages, skipping");
            return None;
        };
        Some(self.drain(notify).await)
    }

    async fn drain(&self, notify: bool) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::default();

        let outcome = match AssertUnwindSafe(self.drain_batches(notify, &mut report))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(error = %e, "Scoring run aborted by store error");
                RunOutcome::Aborted(e.to_string())
            }
            Err(_) => {
                error!("Scoring run panicked");
                RunOutcome::Aborted("scoring run panicked".to_string())
            }
        };
        report.outcome = outcome;

        info!(
            scored = report.scored,
            failed = report.failed,
            vanished = report.vanished,
            batches = report.batches,
            outcome = ?report.outcome,
            elapsed_ms = ?started.elapsed().as_millis(),
            "Scoring run finished"
        );
        report
    }

    async fn drain_batches(&self, notify: bool, report: &mut RunReport) -> StoreResult<RunOutcome> {
        if !self.classifier.is_ready() {
            debug!("Initializing spam classifier");
            // Failure is logged by the classifier and retried on the next trigger.
            let _ = self.classifier.initialize().await;
        }
        if !self.classifier.is_ready() {
            error!("Spam classifier could not be initialized");
            return Ok(RunOutcome::NotReady);
        }

        let batch_size = self.settings.batch_size.max(1);
        // Ids already tried in this run; each fetch moves past them.
        let mut attempted: HashSet<i64> = HashSet::new();
        loop {
            let batch = self
                .store
                .fetch_unscored_excluding(batch_size, &attempted)
                .await?;
            if batch.is_empty() {
                debug!("No more pending messages to process");
                break;
            }
            let has_more = batch.len() == batch_size;
            report.batches += 1;

            for message in batch {
                attempted.insert(message.id);
                match self.classifier.classify(&message.body).await {
                    ScoreResult::Scored(score) => {
                        if !self.store.write_score(message.id, score).await? {
                            debug!(message_id = message.id, "Message gone or already scored; skipping");
                            report.vanished += 1;
                        } else {
                            report.scored += 1;
                            if notify {
                                if let Some(updated) = self.store.read(message.id).await? {
                                    self.notifier.notify(&updated).await;
                                }
                            }
                        }
                    }
                    ScoreResult::Failed(e) => {
                        warn!(message_id = message.id, error = %e, "Error detecting spam");
                        report.failed += 1;
                    }
                    ScoreResult::NotReady => {
                        warn!(message_id = message.id, "Spam classifier not ready; stopping run");
                        return Ok(RunOutcome::NotReady);
                    }
                }
                sleep(self.settings.per_message_delay).await;
            }

            if !has_more {
                break;
            }
            sleep(self.settings.batch_cooldown).await;
        }

        Ok(RunOutcome::Drained)
    }
}
