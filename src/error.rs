use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading snapshots and caches, or configuring a run.
///
/// Matching misses and fit failures are not errors: they are recorded as
/// null series entries and NaN / unset fits respectively.
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}, line {line}: {message}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Unsupported snapshot extension: .{0}")]
    UnsupportedExtension(String),

    #[error("{path}: missing '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Could not parse a date from '{0}'")]
    Timestamp(String),

    #[error("No file path passed in and no cache path configured")]
    NoCachePath,

    #[error("Invalid tracker for λ={wavelength}: {reason}")]
    InvalidTracker { wavelength: f64, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Series of {len} points is too short to smooth with window {window}")]
    TooShortToSmooth { len: usize, window: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, DriftError>;

impl DriftError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DriftError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        DriftError::MalformedRow {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}
