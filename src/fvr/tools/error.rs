use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads sheets, compares metrics, or emits reports.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet cannot be turned into a table.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when a selected sheet is not available.
    #[error("sheet '{0}' not found")]
    MissingSheet(String),

    /// Raised when a discrepancy check is requested without any sheet.
    #[error("no sheets selected")]
    EmptySelection,

    /// Raised when a sheet lacks a column needed for the comparison.
    #[error("sheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },

    /// Raised when the baseline total of a metric is zero.
    #[error("baseline sheet '{sheet}' totals zero for '{metric}'")]
    ZeroBaseline { metric: String, sheet: String },

    /// Raised when a date cell cannot be interpreted as a calendar date.
    /// `data_row` counts the loaded rows below the header from 1; blank rows
    /// dropped while reading are not counted.
    #[error("unparseable date '{value}' in column '{column}' of sheet '{sheet}' (data row {data_row})")]
    DateParse {
        sheet: String,
        column: String,
        data_row: usize,
        value: String,
    },

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the input is not an `.xlsx` workbook.
    #[error("unsupported input file (expected .xlsx): {0}")]
    UnsupportedInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
