use thiserror::Error;

use crate::ingestion::IngestionFormat;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by [`crate::ingestion::ingest`].
///
/// Failures are terminal for the call: no partial [`crate::types::Table`] is ever returned.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The file name does not map to a supported format.
    #[error("unsupported format for '{file_name}': {reason}")]
    UnsupportedFormat {
        file_name: String,
        /// Lower-cased extension, if the name had one.
        extension: Option<String>,
        reason: String,
    },

    /// The bytes could not be decoded under the implied format / encoding.
    #[error("malformed {format} input: {message}")]
    MalformedInput {
        format: IngestionFormat,
        message: String,
    },

    /// The upload stream itself failed to read or seek.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`IngestionError`], for exhaustive matching by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionErrorKind {
    UnsupportedFormat,
    MalformedInput,
    Io,
}

impl IngestionError {
    pub fn kind(&self) -> IngestionErrorKind {
        match self {
            Self::UnsupportedFormat { .. } => IngestionErrorKind::UnsupportedFormat,
            Self::MalformedInput { .. } => IngestionErrorKind::MalformedInput,
            Self::Io(_) => IngestionErrorKind::Io,
        }
    }

    pub(crate) fn malformed(format: IngestionFormat, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            format,
            message: message.into(),
        }
    }

    /// Convert a `csv` crate error, keeping stream failures as [`IngestionError::Io`].
    pub(crate) fn from_csv(err: csv::Error) -> Self {
        if err.is_io_error() {
            return match err.into_kind() {
                csv::ErrorKind::Io(io) => Self::Io(io),
                other => Self::malformed(IngestionFormat::Csv, format!("{other:?}")),
            };
        }
        Self::malformed(IngestionFormat::Csv, err.to_string())
    }

    #[cfg(feature = "excel")]
    pub(crate) fn from_calamine(err: calamine::Error) -> Self {
        match err {
            calamine::Error::Io(io) => Self::Io(io),
            other => Self::malformed(IngestionFormat::Excel, other.to_string()),
        }
    }
}

/// Violation of the [`crate::types::Table`] invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("column '{column}' has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

/// Error returned when re-serializing a [`crate::types::Table`].
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json export error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
