//! Error types for each pipeline stage

use thiserror::Error;

/// Errors raised while turning a file into a [`crate::record::Dataset`]
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Failed to read file: {0}")]
    Read(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("The sheet is empty")]
    Empty,

    #[error("Required column '{0}' is missing")]
    MissingColumn(String),

    #[error("Row {row}: '{value}' in column '{column}' is not a date")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Row {row}: '{value}' in column '{column}' is not a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
}

impl From<calamine::Error> for LoadError {
    fn from(e: calamine::Error) -> Self {
        LoadError::Read(e.to_string())
    }
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Read(e.to_string())
    }
}

/// Errors raised by the sales forecaster
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient data: need at least {required} monthly buckets, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Numerical error: {0}")]
    Numerical(String),
}

/// Errors raised while serializing downloads
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Spreadsheet export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF export failed: {0}")]
    Pdf(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date for export: {0}")]
    Date(String),
}

/// Errors raised while rasterizing charts
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Chart drawing failed: {0}")]
    Draw(String),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Top-level error of a dashboard request
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Chart(#[from] ChartError),
}
