use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::{MODEL_FILE_NAME, VOCABULARY_FILE_NAME};
use crate::errors::LoadError;
use crate::tokenizer::{parse_word_counts, WordCounts};

/// Where model weights and the vocabulary descriptor come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn open_model_bytes(&self) -> Result<Vec<u8>, LoadError>;
    async fn open_vocabulary_descriptor(&self) -> Result<WordCounts, LoadError>;
}

/// Assets read from a directory holding `spam_model.json` and `tokenizer.json`.
#[derive(Debug, Clone)]
pub struct FsAssets {
    dir: PathBuf,
}

impl FsAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, LoadError> {
        let path = self.dir.join(name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| LoadError::Asset(format!("reading {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl AssetSource for FsAssets {
    async fn open_model_bytes(&self) -> Result<Vec<u8>, LoadError> {
        self.read(MODEL_FILE_NAME).await
    }

    async fn open_vocabulary_descriptor(&self) -> Result<WordCounts, LoadError> {
        let raw = self.read(VOCABULARY_FILE_NAME).await?;
        let text = String::from_utf8(raw)
            .map_err(|e| LoadError::Vocabulary(format!("{} is not UTF-8: {}", VOCABULARY_FILE_NAME, e)))?;
        parse_word_counts(&text)
    }
}

/// Assets already in memory, e.g. bundled with `include_bytes!`.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    model: Vec<u8>,
    word_counts: WordCounts,
}

impl StaticAssets {
    pub fn new(model: Vec<u8>, word_counts: WordCounts) -> Self {
        Self { model, word_counts }
    }
}

#[async_trait]
impl AssetSource for StaticAssets {
    async fn open_model_bytes(&self) -> Result<Vec<u8>, LoadError> {
        Ok(self.model.clone())
    }

    async fn open_vocabulary_descriptor(&self) -> Result<WordCounts, LoadError> {
        Ok(self.word_counts.clone())
    }
}
