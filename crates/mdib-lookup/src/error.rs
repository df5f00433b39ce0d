//! Error types for the lookup tables.

use mdib_core::ObjectId;
use thiserror::Error;

/// Errors raised by index maintenance and index queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Duplicate key {key} in unique index '{index}'")]
    DuplicateKey { index: String, key: String },

    #[error("Index '{index}' has {count} entries for key {key}, expected one")]
    MultipleMatches {
        index: String,
        key: String,
        count: usize,
    },

    #[error("No entry for key {key} in index '{index}'")]
    NotFound { index: String, key: String },

    #[error("Unknown index: {0}")]
    UnknownIndex(String),

    #[error("Index already defined: {0}")]
    IndexExists(String),

    #[error("Object {0} is not in the lookup")]
    UnknownObject(ObjectId),

    #[error("Object {0} is already in the lookup")]
    DuplicateObject(ObjectId),

    #[error("Rejected {handle}: {reason}")]
    Rejected { handle: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LookupError>;
