use std::path::PathBuf;

/// Errors raised while loading dictionaries or editing a worksheet.
#[derive(Debug, thiserror::Error)]
pub enum WorksheetError {
    /// A dictionary file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The delimited-text reader rejected the input.
    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// Rating text outside of "1".."5".
    #[error("invalid rating {0:?}; expected a value from 1 to 5")]
    InvalidRating(String),
    /// A word that the loaded dictionary does not contain.
    #[error("word {0:?} is not in the dictionary")]
    UnknownWord(String),
}

pub type Result<T, E = WorksheetError> = std::result::Result<T, E>;
