//! Spam classifier: tokenizer plus an opaque model behind one lock.
mod assets;
mod model;

pub use assets::{AssetSource, FsAssets, StaticAssets};
pub use model::{LogisticBackend, LogisticModel, ModelBackend, SpamModel};

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{ClassifyError, LoadError};
use crate::tokenizer::{Tokenizer, Vocabulary};
use crate::types::ScoreResult;

struct Engine {
    tokenizer: Tokenizer,
    model: Box<dyn SpamModel>,
}

impl Engine {
    fn score(&self, text: &str) -> ScoreResult {
        let tokens = match catch_unwind(AssertUnwindSafe(|| self.tokenizer.tokenize(text))) {
            Ok(tokens) => tokens,
            Err(panic) => return ScoreResult::Failed(ClassifyError::Tokenize(panic_reason(panic))),
        };
        let input: Vec<f32> = tokens.iter().map(|t| *t as f32).collect();

        match catch_unwind(AssertUnwindSafe(|| self.model.predict(&input))) {
            Ok(Ok(p)) if p.is_finite() => ScoreResult::Scored(p.clamp(0.0, 1.0)),
            Ok(Ok(_)) => ScoreResult::Failed(ClassifyError::NonFinite),
            Ok(Err(reason)) => ScoreResult::Failed(ClassifyError::Inference(reason)),
            Err(panic) => ScoreResult::Failed(ClassifyError::Inference(panic_reason(panic))),
        }
    }
}

/// Shared single-instance detector. Loading and every inference run under the
/// same lock, so no two inferences and no inference during a load ever overlap.
pub struct SpamClassifier {
    assets: Arc<dyn AssetSource>,
    backend: Arc<dyn ModelBackend>,
    max_sequence_length: usize,
    ready: AtomicBool,
    engine: Mutex<Option<Engine>>,
}

impl SpamClassifier {
    pub fn new(
        assets: Arc<dyn AssetSource>,
        backend: Arc<dyn ModelBackend>,
        max_sequence_length: usize,
    ) -> Self {
        Self {
            assets,
            backend,
            max_sequence_length,
            ready: AtomicBool::new(false),
            engine: Mutex::new(None),
        }
    }

    /// Loads the model and vocabulary. Calls after a successful load return
    /// immediately; concurrent callers queue on the lock and at most one load
    /// runs at a time.
    pub async fn initialize(&self) -> Result<(), LoadError> {
        if self.is_ready() {
            return Ok(());
        }

        let mut engine = self.engine.lock().await;
        if engine.is_some() {
            return Ok(());
        }

        debug!("Loading spam model and vocabulary");
        let loaded = self.load().await.inspect_err(|e| {
            warn!(error = %e, "Spam classifier failed to load");
        })?;
        info!(
            vocabulary = loaded.tokenizer.vocabulary().len(),
            max_sequence_length = loaded.tokenizer.max_len(),
            "Spam classifier ready"
        );
        *engine = Some(loaded);
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn load(&self) -> Result<Engine, LoadError> {
        let bytes = self.assets.open_model_bytes().await?;
        let model = self.backend.load(&bytes)?;
        let counts = self.assets.open_vocabulary_descriptor().await?;
        if counts.is_empty() {
            warn!("Vocabulary descriptor is empty; every word will map to OOV");
        }
        let vocabulary = Vocabulary::from_word_counts(counts);
        Ok(Engine {
            tokenizer: Tokenizer::new(vocabulary, self.max_sequence_length),
            model,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Never panics and never returns an error: failures come back as
    /// [`ScoreResult::Failed`].
    pub async fn classify(&self, text: &str) -> ScoreResult {
        if !self.is_ready() {
            return ScoreResult::NotReady;
        }

        let engine = self.engine.lock().await;
        match engine.as_ref() {
            Some(engine) => engine.score(text),
            None => ScoreResult::NotReady,
        }
    }
}

fn panic_reason(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "model panicked".to_string()
    }
}
