//! # mdib-store
//!
//! The canonical MDIB: descriptor tree, single states, context states and
//! the version counters that identify one MDIB snapshot.
//!
//! This crate provides:
//! - [`MdibStore`]: tree navigation, code-based lookup, bulk load
//! - [`MdibSnapshot`]: a detached, serde-serializable copy of the store
//! - [`RemovedObjects`]: what a subtree removal took out
//!
//! ## Example
//!
//! ```rust
//! use mdib_core::{CodedValue, Coding, Descriptor, Kind};
//! use mdib_store::MdibStore;
//!
//! let mut store = MdibStore::default();
//! store
//!     .add_description_containers(vec![
//!         Descriptor::mds("mds0"),
//!         Descriptor::child(Kind::Vmd, "vmd0", "mds0").with_type(CodedValue::new("69650")),
//!     ])
//!     .unwrap();
//! store.mk_state_containers_for_all_descriptors().unwrap();
//!
//! let vmd = store.get_descriptor_by_code(&Coding::new("69650")).unwrap();
//! assert_eq!(vmd.map(|d| d.handle().as_str()), Some("vmd0"));
//! assert_eq!(store.mdib_version(), 0);
//! ```

pub mod error;
pub mod snapshot;
pub mod store;

pub use error::{Result, StoreError};
pub use snapshot::MdibSnapshot;
pub use store::{MdibStore, RemovedObjects};
