//! Text normalization and fixed-length token encoding.
mod vocab;

pub use vocab::{parse_word_counts, Vocabulary, WordCounts};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::PAD_INDEX;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?|ftp)://\S+").expect("static url pattern"));

/// Extended Latin letters of the Turkish alphabet that survive normalization.
const EXTENDED_LETTERS: [char; 6] = ['ç', 'ğ', 'ı', 'ö', 'ş', 'ü'];

/// Lowercases, strips `http(s)://` and `ftp://` links, drops everything outside the
/// allow-list and collapses runs of spaces.
///
/// Only the ASCII space is allowed through, so other whitespace (newlines,
/// tabs) is removed rather than turned into a word break. That matches the
/// cleaning the vocabulary was built with.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL_RE.replace_all(&lowered, "");
    let kept: String = without_urls.chars().filter(|c| is_allowed(*c)).collect();
    kept.split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ' || EXTENDED_LETTERS.contains(&c)
}

/// Maps text to exactly `max_len` token indices under a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocabulary: Vocabulary,
    max_len: usize,
}

impl Tokenizer {
    pub fn new(vocabulary: Vocabulary, max_len: usize) -> Self {
        Self {
            vocabulary,
            max_len,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Words past `max_len` are dropped; missing positions get the padding index.
    pub fn tokenize(&self, text: &str) -> Vec<u32> {
        let normalized = normalize(text);
        let mut sequence: Vec<u32> = normalized
            .split(' ')
            .filter(|word| !word.is_empty())
            .take(self.max_len)
            .map(|word| self.vocabulary.index_of(word))
            .collect();
        sequence.resize(self.max_len, PAD_INDEX);
        sequence
    }
}
