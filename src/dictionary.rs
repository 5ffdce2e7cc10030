use crate::error::{Result, WorksheetError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_WORDS_PATH: &str = "data/cmudict.csv";
pub const DEFAULT_SYMBOLS_PATH: &str = "data/cmudict_symbols.csv";

/// Locations of the two dictionary files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryConfig {
    pub words_path: PathBuf,
    pub symbols_path: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            words_path: PathBuf::from(DEFAULT_WORDS_PATH),
            symbols_path: PathBuf::from(DEFAULT_SYMBOLS_PATH),
        }
    }
}

/// One entry of the word list: the word followed by its phonetic symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DictionaryRow {
    fields: Vec<String>,
}

impl DictionaryRow {
    pub fn new(word: impl Into<String>, symbols: impl Into<String>) -> Self {
        Self {
            fields: vec![word.into(), symbols.into()],
        }
    }

    pub fn from_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn word(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    /// The raw symbol string (field 1), if the row has one.
    pub fn symbols(&self) -> Option<&str> {
        self.fields.get(1).map(String::as_str)
    }

    /// Substring containment against field 1; rows without symbols never match.
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbols()
            .is_some_and(|symbols| !symbols.is_empty() && symbols.contains(symbol))
    }
}

/// One entry of the symbol list; field 0 is the filter token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolRow {
    fields: Vec<String>,
}

impl SymbolRow {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            fields: vec![symbol.into()],
        }
    }

    pub fn from_fields(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn symbol(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    /// Remaining columns, e.g. the phoneme class in `cmudict_symbols.csv`.
    pub fn description(&self) -> Option<&str> {
        self.fields.get(1).map(String::as_str)
    }
}

/// Read-only word and symbol lists shared by every worksheet.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: Vec<DictionaryRow>,
    symbols: Vec<SymbolRow>,
    index: HashMap<String, usize>,
}

impl Dictionary {
    pub fn new(words: Vec<DictionaryRow>, symbols: Vec<SymbolRow>) -> Self {
        let mut index = HashMap::with_capacity(words.len());
        for (position, row) in words.iter().enumerate() {
            index.entry(row.word().to_string()).or_insert(position);
        }
        Self {
            words,
            symbols,
            index,
        }
    }

    /// Reads both files named by the config.
    pub fn load(config: &DictionaryConfig) -> Result<Self> {
        let words = read_rows(&config.words_path)?
            .into_iter()
            .map(DictionaryRow::from_fields)
            .collect::<Vec<_>>();
        let symbols = read_rows(&config.symbols_path)?
            .into_iter()
            .map(SymbolRow::from_fields)
            .collect::<Vec<_>>();
        info!(
            words = words.len(),
            symbols = symbols.len(),
            "dictionary loaded"
        );
        Ok(Self::new(words, symbols))
    }

    pub fn from_csv_str(words: &str, symbols: &str) -> Result<Self> {
        let words = parse_rows(words)
            .map_err(|source| WorksheetError::Csv {
                path: PathBuf::from("<words>"),
                source,
            })?
            .into_iter()
            .map(DictionaryRow::from_fields)
            .collect();
        let symbols = parse_rows(symbols)
            .map_err(|source| WorksheetError::Csv {
                path: PathBuf::from("<symbols>"),
                source,
            })?
            .into_iter()
            .map(SymbolRow::from_fields)
            .collect();
        Ok(Self::new(words, symbols))
    }

    pub fn words(&self) -> &[DictionaryRow] {
        &self.words
    }

    pub fn symbols(&self) -> &[SymbolRow] {
        &self.symbols
    }

    /// Looks up a row by its word key.
    pub fn get(&self, word: &str) -> Option<&DictionaryRow> {
        self.index.get(word).map(|&position| &self.words[position])
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Parses header-less comma-delimited text into rows of trimmed fields.
///
/// Blank lines and rows whose first field is empty are dropped.
pub fn parse_rows(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        if fields.first().is_none_or(|word| word.is_empty()) {
            continue;
        }
        rows.push(fields);
    }
    Ok(rows)
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path).map_err(|source| WorksheetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = parse_rows(&text).map_err(|source| WorksheetError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = rows.len(), "parsed dictionary file");
    Ok(rows)
}
