use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or normalise the source dataset.  Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("delimited text: {0}")]
    Csv(#[from] csv::Error),

    #[error("parsing JSON source: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reading parquet source: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("decoding arrow batch: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("delimiter {0:?} is not a single ASCII character")]
    InvalidDelimiter(char),

    #[error("JSON source must be an array of objects ({0})")]
    JsonShape(String),

    #[error("required column '{0}' is missing after normalisation")]
    MissingColumn(String),

    #[error("column '{0}' appears more than once after normalisation")]
    DuplicateColumn(String),

    #[error("column '{0}' holds coordinates and cannot be categorical")]
    CoordinateCategorical(String),
}

/// A field name absent from the loaded schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field '{field}'")]
pub struct UnknownFieldError {
    pub field: String,
}

impl UnknownFieldError {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Errors raised by [`DatasetStore`](super::store::DatasetStore) queries,
/// which both load the dataset and resolve a field.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    UnknownField(#[from] UnknownFieldError),
}
