mod error;

pub mod dictionary;
pub mod export;
pub mod rating;
pub mod selection;
pub mod sessions;
pub mod worksheet;

#[cfg(feature = "web")]
pub mod web;

pub use dictionary::{Dictionary, DictionaryConfig, DictionaryRow, SymbolRow};
pub use error::{Result, WorksheetError};
pub use export::{EXPORT_FILENAME, Export, PdfLayout, render_pdf, render_text};
pub use rating::{Rating, Ratings};
pub use selection::{SelectedSymbol, SelectionMode, WordCount, filter_by_symbol, select_words};
pub use sessions::SessionStore;
pub use worksheet::Worksheet;
