//! Error types for the pattern catalog
//!
//! Two tiers:
//! - [`CatalogError`] aborts a load (duplicate ids, undecodable source, empty catalog)
//! - [`RecordError`] rejects a single record; the load continues without it

use crate::hash::HashError;
use std::path::PathBuf;

/// Fatal catalog load errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Two records share an id
    #[error("duplicate pattern id '{id}' (records {first} and {second})")]
    DuplicateId {
        /// The colliding id
        id: String,
        /// Index of the first record carrying the id
        first: usize,
        /// Index of the colliding record
        second: usize,
    },

    /// Catalog source could not be decoded at all
    #[error("catalog decode failed: {0}")]
    Decode(String),

    /// IO error reading the catalog source
    #[error("io error reading {path}: {source}")]
    Io {
        /// Catalog path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Unsupported catalog file extension
    #[error("unsupported catalog format: '{0}'")]
    UnsupportedFormat(String),

    /// No record survived validation
    #[error("catalog contains no valid patterns ({skipped} skipped)")]
    Empty {
        /// Number of records rejected during validation
        skipped: usize,
    },

    /// Catalog hashing failed
    #[error("catalog hash failed: {0}")]
    Hash(#[from] HashError),
}

impl CatalogError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-record validation errors (non-fatal)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Record is not an object or has wrongly typed fields
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Required field missing or blank
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// Id contains characters outside [a-z0-9_-]
    #[error("invalid pattern id '{0}'")]
    InvalidId(String),

    /// Category not one of the known categories
    #[error("unknown category '{0}'")]
    InvalidCategory(String),

    /// Pattern has no usable signal phrase
    #[error("pattern has no usable signals")]
    NoSignals,

    /// Signal phrase cannot be compiled into a matcher
    #[error("signal '{phrase}' rejected: {reason}")]
    InvalidSignal {
        /// Offending phrase
        phrase: String,
        /// Compiler message
        reason: String,
    },
}
