//! # mdib-transaction
//!
//! Transactional access to an SDC MDIB.
//!
//! This crate provides:
//! - [`Mdib`]: the facade owning the store, the transaction lock and the notifier
//! - [`Transaction`]: a staged change set restricted to one report category
//! - [`TransactionProcessor`]: validation, version cascade and apply on commit
//! - [`TransactionResult`]: what a commit changed, routed by report kind
//!
//! ## Example
//!
//! ```rust
//! use mdib_core::{Descriptor, Kind, MetricValue};
//! use mdib_transaction::{Mdib, TransactionKind};
//!
//! let mdib = Mdib::default();
//! let mut tx = mdib.transaction(TransactionKind::Descriptor);
//! tx.add_descriptor(Descriptor::mds("mds0"), false, None).unwrap();
//! tx.add_descriptor(Descriptor::child(Kind::Vmd, "vmd0", "mds0"), false, None).unwrap();
//! tx.add_descriptor(Descriptor::child(Kind::Channel, "ch0", "vmd0"), false, None).unwrap();
//! tx.add_descriptor(Descriptor::child(Kind::NumericMetric, "hr", "ch0"), false, None).unwrap();
//! tx.commit().unwrap();
//! drop(tx);
//!
//! let mut tx = mdib.transaction(TransactionKind::metric());
//! tx.get_state("hr").unwrap().set_metric_value(MetricValue::numeric(72.0));
//! let result = tx.commit().unwrap();
//!
//! assert_eq!(result.mdib_version(), 2);
//! assert_eq!(result.metric_updates.len(), 1);
//! ```

pub mod config;
pub mod error;
pub mod mdib;
pub mod notifier;
pub mod processor;
pub mod result;
pub mod transaction;

pub use config::{MdibConfig, MdibConfigBuilder};
pub use error::{ErrorKind, Result, TransactionError};
pub use mdib::Mdib;
pub use notifier::{ObserverId, TransactionObserver};
pub use processor::{ChangeSet, TransactionProcessor};
pub use result::{TransactionItem, TransactionResult};
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
