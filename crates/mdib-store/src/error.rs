//! Error types for the MDIB store.

use mdib_core::Kind;
use mdib_lookup::LookupError;
use thiserror::Error;

/// Errors that can occur while loading, querying or mutating the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("State for {handle} is a {found} state, descriptor is {expected}")]
    KindMismatch {
        handle: String,
        expected: Kind,
        found: Kind,
    },

    #[error("Code path {path} matches {count} descriptors, expected at most one")]
    AmbiguousCode { path: String, count: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
