use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::config::{OOV_INDEX, OOV_TOKEN};
use crate::errors::LoadError;

/// Word occurrence counts in descriptor order.
pub type WordCounts = Vec<(String, u64)>;

/// Word to index mapping. Index 0 is padding, 1 is out-of-vocabulary, and
/// the remaining words follow from 2 in descending frequency.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Ties keep their input order (the sort is stable). The OOV marker is
    /// pinned to index 1 whatever its count.
    pub fn from_word_counts(counts: WordCounts) -> Self {
        let mut sorted: Vec<(String, u64)> = counts
            .into_iter()
            .filter(|(word, _)| word != OOV_TOKEN)
            .collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let mut index = HashMap::with_capacity(sorted.len() + 1);
        index.insert(OOV_TOKEN.to_string(), OOV_INDEX);
        let mut next = OOV_INDEX + 1;
        for (word, _) in sorted {
            if index.contains_key(&word) {
                continue;
            }
            index.insert(word, next);
            next += 1;
        }

        Self { index }
    }

    pub fn index_of(&self, word: &str) -> u32 {
        self.index.get(word).copied().unwrap_or(OOV_INDEX)
    }

    pub fn get(&self, word: &str) -> Option<u32> {
        self.index.get(word).copied()
    }

    /// Number of indexed entries, OOV included.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Reads word counts out of a tokenizer descriptor.
///
/// Accepts the Keras layout (`config.word_counts` holding either a JSON string
/// or an object) as well as a bare `{word: count}` object.
pub fn parse_word_counts(json: &str) -> Result<WordCounts, LoadError> {
    let root: Value = serde_json::from_str(json)?;

    let counts = match root.get("config").and_then(|c| c.get("word_counts")) {
        Some(Value::String(inner)) => serde_json::from_str::<Value>(inner)?,
        Some(other) => other.clone(),
        None => root,
    };

    let Value::Object(map) = counts else {
        return Err(LoadError::Vocabulary(
            "word counts must be a JSON object".to_string(),
        ));
    };
    collect_counts(map)
}

fn collect_counts(map: Map<String, Value>) -> Result<WordCounts, LoadError> {
    let mut out = Vec::with_capacity(map.len());
    for (word, value) in map {
        let count = value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| {
                LoadError::Vocabulary(format!("count for {:?} is not a number: {}", word, value))
            })?;
        out.push((word, count));
    }
    Ok(out)
}
