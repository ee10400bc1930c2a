use thiserror::Error;

/// Failure to bring the classifier up. Fatal for the current run only; the
/// next trigger retries the load.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Asset error: {0}")]
    Asset(String),
    #[error("Vocabulary error: {0}")]
    Vocabulary(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::Vocabulary(format!("JSON error: {}", err))
    }
}

/// Per-message failure. The message stays unscored and is retried later.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Tokenization failed: {0}")]
    Tokenize(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model produced a non-finite score")]
    NonFinite,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
