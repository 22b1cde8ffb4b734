//! Chunked batch labeling over an input table.
//!
//! Reader → ReportLabeler (per row) → checkpoint writer after every chunk.
//! Runs sequentially, one model call at a time, since a local Ollama serves
//! one generation at a time anyway.

pub mod reader;
pub mod writer;
pub mod progress;
pub mod runner;

pub use reader::*;
pub use writer::*;
pub use progress::*;
pub use runner::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Unsupported input format: {0} (expected .xlsx, .xlsm, .xls, .csv or .tsv)")]
    UnsupportedFormat(String),

    #[error("Required column '{0}' not found in input header")]
    MissingColumn(String),

    #[error("Workbook has no worksheet")]
    EmptyWorkbook,

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed existing output: {0}")]
    MalformedOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BatchError {
    /// Errors that reject the input before any row is processed.
    pub fn is_input_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_) | Self::MissingColumn(_) | Self::EmptyWorkbook
        )
    }
}
