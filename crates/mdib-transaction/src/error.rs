//! Error types for transactions and commit processing.

use crate::transaction::TransactionKind;
use mdib_core::{Kind, StateCategory};
use mdib_lookup::LookupError;
use mdib_store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`TransactionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller used the API wrongly: wrong transaction kind, mixed
    /// categories, double staging, use after close.
    Usage,
    /// The change would break an MDIB invariant.
    Consistency,
    /// A referenced descriptor or state does not exist.
    NotFound,
}

/// Errors that can occur while staging or committing a transaction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("Transaction is closed")]
    Closed,

    #[error("Transaction failed earlier and accepts no further calls")]
    Poisoned,

    #[error("Another transaction is in progress")]
    TransactionInProgress,

    #[error("{operation} is not allowed in a {kind} transaction")]
    WrongKind {
        operation: &'static str,
        kind: TransactionKind,
    },

    #[error("Transaction is bound to {bound} states, got a {found} state")]
    CategoryMismatch {
        bound: StateCategory,
        found: StateCategory,
    },

    #[error("{0} is already staged in this transaction")]
    AlreadyStaged(String),

    #[error("{0} is not staged in this transaction")]
    NotStaged(String),

    #[error("Context state of {0} has no handle")]
    MissingStateHandle(String),

    #[error("Handle already exists: {0}")]
    DuplicateHandle(String),

    #[error("Descriptor {handle} cannot have parent {parent:?}")]
    InvalidParent {
        handle: String,
        parent: Option<String>,
    },

    #[error("A {parent} cannot contain {child} ({handle})")]
    InvalidContainment {
        handle: String,
        parent: Kind,
        child: Kind,
    },

    #[error("{field} of descriptor {handle} cannot change")]
    ImmutableField {
        handle: String,
        field: &'static str,
    },

    #[error("State for {handle} is a {found} state, descriptor is {expected}")]
    KindMismatch {
        handle: String,
        expected: Kind,
        found: Kind,
    },

    #[error("Inconsistent change set: {0}")]
    Inconsistent(String),

    #[error("Descriptor not found: {0}")]
    DescriptorNotFound(String),

    #[error("State not found: {0}")]
    StateNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LookupError> for TransactionError {
    fn from(err: LookupError) -> Self {
        TransactionError::Store(StoreError::Lookup(err))
    }
}

impl TransactionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::Closed
            | TransactionError::Poisoned
            | TransactionError::TransactionInProgress
            | TransactionError::WrongKind { .. }
            | TransactionError::CategoryMismatch { .. }
            | TransactionError::AlreadyStaged(_)
            | TransactionError::NotStaged(_)
            | TransactionError::MissingStateHandle(_) => ErrorKind::Usage,
            TransactionError::DuplicateHandle(_)
            | TransactionError::InvalidParent { .. }
            | TransactionError::InvalidContainment { .. }
            | TransactionError::ImmutableField { .. }
            | TransactionError::KindMismatch { .. }
            | TransactionError::Inconsistent(_) => ErrorKind::Consistency,
            TransactionError::DescriptorNotFound(_) | TransactionError::StateNotFound(_) => {
                ErrorKind::NotFound
            }
            TransactionError::Store(StoreError::DescriptorNotFound(_))
            | TransactionError::Store(StoreError::Lookup(LookupError::NotFound { .. })) => {
                ErrorKind::NotFound
            }
            TransactionError::Store(_) => ErrorKind::Consistency,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransactionError>;
