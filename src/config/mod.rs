use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Number of token positions fed to the model; shorter texts are padded.
pub const MAX_SEQUENCE_LENGTH: usize = 51;

/// Scores strictly above this value are spam. Every spam decision goes through
/// [`crate::types::is_spam`], which is the only reader of this constant.
pub const SPAM_THRESHOLD: f32 = 0.7;

pub const BATCH_SIZE: usize = 10;
pub const PER_MESSAGE_DELAY_MS: u64 = 50;
pub const BATCH_COOLDOWN_MS: u64 = 1000;

pub const OOV_TOKEN: &str = "<OOV>";
pub const PAD_INDEX: u32 = 0;
pub const OOV_INDEX: u32 = 1;

pub const MODEL_FILE_NAME: &str = "spam_model.json";
pub const VOCABULARY_FILE_NAME: &str = "tokenizer.json";

/// Pacing knobs for a batch run.
#[derive(Debug, Clone)]
pub struct ScorerSettings {
    pub batch_size: usize,
    pub per_message_delay: Duration,
    pub batch_cooldown: Duration,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            per_message_delay: Duration::from_millis(PER_MESSAGE_DELAY_MS),
            batch_cooldown: Duration::from_millis(BATCH_COOLDOWN_MS),
        }
    }
}

/// Application-wide defaults. These can be overridden by env vars but do not
/// require any user-authored config files. The spam threshold is not among them.
#[derive(Debug, Clone)]
pub struct AppDefaults {
    pub assets_dir: PathBuf,
    pub max_sequence_length: usize,
    pub scorer: ScorerSettings,
}

impl AppDefaults {
    pub fn load() -> Result<Self> {
        let assets_dir = env::var("SPAMGUARD_ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("assets"));
        let max_sequence_length = env_parse("SPAMGUARD_MAX_SEQUENCE_LENGTH")
            .filter(|len| *len > 0)
            .unwrap_or(MAX_SEQUENCE_LENGTH);
        let batch_size = env_parse("SPAMGUARD_BATCH_SIZE")
            .filter(|size| *size > 0)
            .unwrap_or(BATCH_SIZE);
        let per_message_delay = env_parse("SPAMGUARD_MESSAGE_DELAY_MS")
            .unwrap_or(PER_MESSAGE_DELAY_MS);
        let batch_cooldown = env_parse("SPAMGUARD_BATCH_COOLDOWN_MS")
            .unwrap_or(BATCH_COOLDOWN_MS);

        Ok(Self {
            assets_dir,
            max_sequence_length,
            scorer: ScorerSettings {
                batch_size,
                per_message_delay: Duration::from_millis(per_message_delay),
                batch_cooldown: Duration::from_millis(batch_cooldown),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}
