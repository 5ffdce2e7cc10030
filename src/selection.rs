use crate::dictionary::DictionaryRow;
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

pub const DEFAULT_WORD_COUNT: usize = 10;
pub const MAX_WORD_COUNT: usize = 500;

/// Phonetic symbol filter; empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectedSymbol(String);

impl SelectedSymbol {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into().trim().to_string())
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn as_filter(&self) -> Option<&str> {
        if self.0.is_empty() {
            None
        } else {
            Some(&self.0)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<Option<String>> for SelectedSymbol {
    fn from(value: Option<String>) -> Self {
        value.map(Self::new).unwrap_or_default()
    }
}

/// How many words one selection request draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordCount(NonZeroUsize);

impl WordCount {
    /// `None` outside `1..=MAX_WORD_COUNT`.
    pub fn new(count: usize) -> Option<Self> {
        if count > MAX_WORD_COUNT {
            return None;
        }
        NonZeroUsize::new(count).map(Self)
    }

    /// Clamps free-form user input into `1..=MAX_WORD_COUNT`.
    pub fn clamped(count: usize) -> Self {
        let count = count.clamp(1, MAX_WORD_COUNT);
        Self(NonZeroUsize::new(count).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for WordCount {
    fn default() -> Self {
        Self::clamped(DEFAULT_WORD_COUNT)
    }
}

impl fmt::Display for WordCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a selection extends the worksheet or replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Append,
    Replace,
}

/// Rows whose symbol string contains `symbol`, in dictionary order.
pub fn filter_by_symbol<'a>(
    words: &'a [DictionaryRow],
    symbol: &SelectedSymbol,
) -> Vec<&'a DictionaryRow> {
    match symbol.as_filter() {
        Some(filter) => words
            .par_iter()
            .filter(|row| row.contains_symbol(filter))
            .collect(),
        None => words.iter().collect(),
    }
}

/// Filters, shuffles, truncates to `count`, then drops repeated word keys.
pub fn select_words<R: Rng + ?Sized>(
    words: &[DictionaryRow],
    symbol: &SelectedSymbol,
    count: WordCount,
    rng: &mut R,
) -> Vec<DictionaryRow> {
    let mut candidates = filter_by_symbol(words, symbol);
    candidates.shuffle(rng);
    candidates.truncate(count.get());
    let mut seen = HashSet::with_capacity(candidates.len());
    let mut picked = Vec::with_capacity(candidates.len());
    for row in candidates {
        if seen.insert(row.word()) {
            picked.push(row.clone());
        }
    }
    picked
}
