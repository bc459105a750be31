//! Error and warning types shared across the crate

use std::fmt;

/// Fatal errors: the archive itself cannot be read or decoded
#[derive(Debug, thiserror::Error)]
pub enum SolutionError {
    /// The file could not be opened or read, or is not a zip
    #[error("Failed to read solution archive: {0}")]
    ArchiveRead(#[from] zip::result::ZipError),

    #[error("Solution archive contains no .xml entry")]
    ArchiveFormat,

    #[error("Malformed XML in {entry}: {message}")]
    Xml { entry: String, message: String },

    #[error("Binary entry {entry} is {len} bytes, not a whole number of f64 samples")]
    Payload { entry: String, len: usize },
}

impl From<std::io::Error> for SolutionError {
    fn from(e: std::io::Error) -> Self {
        SolutionError::ArchiveRead(zip::result::ZipError::Io(e))
    }
}

/// Errors raised by relational operations on a [`crate::table::Table`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TableError {
    #[error("table {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("column {column} of {table} holds non-integer value {value:?}")]
    InvalidInteger {
        table: String,
        column: String,
        value: String,
    },

    #[error("column {column} of {table} holds unparseable timestamp {value:?}")]
    InvalidTimestamp {
        table: String,
        column: String,
        value: String,
    },

    #[error("frame operation failed: {0}")]
    Frame(String),
}

impl From<polars::prelude::PolarsError> for TableError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        TableError::Frame(e.to_string())
    }
}

/// Why a single derived table could not be built. Never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("raw record type {record} is missing")]
    MissingRecordType { record: String },

    #[error("derived table {table} is unavailable")]
    MissingPrerequisite { table: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Recovered conditions surfaced to the caller alongside the model
#[derive(Debug, Clone, PartialEq)]
pub enum ModelWarning {
    /// A raw table fell through every rule of the legacy index policy
    IndexAmbiguity { table: String },
    /// The key table lost (or gained) rows while being joined
    ModelConsistency { raw_keys: usize, resolved_keys: usize },
}

impl fmt::Display for ModelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelWarning::IndexAmbiguity { table } => {
                write!(f, "unable to set index for {}", table)
            }
            ModelWarning::ModelConsistency {
                raw_keys,
                resolved_keys,
            } => write!(
                f,
                "key resolution is lossy: {} raw keys but {} resolved rows",
                raw_keys, resolved_keys
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, SolutionError>;
