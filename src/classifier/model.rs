use std::collections::HashMap;

use serde::Deserialize;

use crate::config::PAD_INDEX;
use crate::errors::LoadError;

/// The opaque scoring function: one token sequence in, one probability out.
///
/// Implementations need not be safe to call concurrently; the classifier
/// serializes every call.
pub trait SpamModel: Send + Sync {
    fn predict(&self, input: &[f32]) -> Result<f32, String>;
}

impl<F> SpamModel for F
where
    F: Fn(&[f32]) -> Result<f32, String> + Send + Sync,
{
    fn predict(&self, input: &[f32]) -> Result<f32, String> {
        self(input)
    }
}

/// Turns raw model bytes into a runnable model. Swap this to plug in a
/// different inference runtime.
pub trait ModelBackend: Send + Sync {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn SpamModel>, LoadError>;
}

/// Bag-of-tokens logistic regression stored as JSON:
/// `{"bias": -1.2, "weights": {"2": 0.8, "17": 1.5}}`.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    bias: f32,
    weights: HashMap<u32, f32>,
}

#[derive(Deserialize)]
struct LogisticFile {
    #[serde(default)]
    bias: f32,
    weights: HashMap<String, f32>,
}

impl LogisticModel {
    pub fn from_json(bytes: &[u8]) -> Result<Self, LoadError> {
        let file: LogisticFile = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::Model(format!("invalid logistic model: {}", e)))?;

        let mut weights = HashMap::with_capacity(file.weights.len());
        for (key, weight) in file.weights {
            let index = key
                .parse::<u32>()
                .map_err(|_| LoadError::Model(format!("weight key {:?} is not a token index", key)))?;
            if !weight.is_finite() {
                return Err(LoadError::Model(format!("weight for token {} is not finite", index)));
            }
            weights.insert(index, weight);
        }

        if !file.bias.is_finite() {
            return Err(LoadError::Model("bias is not finite".to_string()));
        }

        Ok(Self {
            bias: file.bias,
            weights,
        })
    }
}

impl SpamModel for LogisticModel {
    fn predict(&self, input: &[f32]) -> Result<f32, String> {
        let mut z = self.bias;
        for value in input {
            if !value.is_finite() || *value < 0.0 {
                return Err(format!("invalid token value {}", value));
            }
            let token = *value as u32;
            if token == PAD_INDEX {
                continue;
            }
            z += self.weights.get(&token).copied().unwrap_or(0.0);
        }
        Ok(1.0 / (1.0 + (-z).exp()))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogisticBackend;

impl ModelBackend for LogisticBackend {
    fn load(&self, bytes: &[u8]) -> Result<Box<dyn SpamModel>, LoadError> {
        Ok(Box::new(LogisticModel::from_json(bytes)?))
    }
}
