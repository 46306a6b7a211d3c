//! Error types for the hub-ensemble library.

use thiserror::Error;

/// Result type alias for ensemble operations.
pub type Result<T> = std::result::Result<T, EnsembleError>;

/// Errors that can occur while building an ensemble.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnsembleError {
    /// A required input (e.g. an evaluation snapshot) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A required column is absent from tabular input.
    #[error("missing column `{column}` in {source_name}")]
    Schema { column: String, source_name: String },

    /// Options that the selected method does not accept.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Mismatched lengths or degenerate numeric input.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(String),

    /// A cell or record could not be parsed.
    #[error("parse error at {location}: {message}")]
    Parse { location: String, message: String },
}

impl EnsembleError {
    pub(crate) fn schema(column: &str, source_name: impl Into<String>) -> Self {
        Self::Schema {
            column: column.to_string(),
            source_name: source_name.into(),
        }
    }
}

impl From<std::io::Error> for EnsembleError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for EnsembleError {
    fn from(err: csv::Error) -> Self {
        let location = err
            .position()
            .map(|p| format!("line {}", p.line()))
            .unwrap_or_else(|| "unknown position".to_string());
        Self::Parse {
            location,
            message: err.to_string(),
        }
    }
}
