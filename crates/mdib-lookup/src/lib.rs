//! # mdib-lookup
//!
//! Indexed tables backing the MDIB store.
//!
//! This crate provides:
//! - [`MultiKeyLookup`]: an object set with named unique / non-unique indices
//! - [`VersionedLookup`]: remembers the last version of every removed key
//! - [`DescriptorsLookup`], [`StatesLookup`], [`MultiStatesLookup`]: the
//!   three concrete tables of an MDIB
//!
//! The tables are plain `&mut self` structures. Whoever owns them provides
//! the locking; holding the guard is what makes a call safe.
//!
//! ## Example
//!
//! ```rust
//! use mdib_core::{Descriptor, Kind};
//! use mdib_lookup::DescriptorsLookup;
//!
//! let mut lookup = DescriptorsLookup::new();
//! lookup.add_object(Descriptor::mds("mds0")).unwrap();
//! lookup.add_object(Descriptor::child(Kind::Vmd, "vmd0", "mds0")).unwrap();
//!
//! assert_eq!(lookup.children_of("mds0").len(), 1);
//!
//! lookup.remove_object("vmd0").unwrap();
//! assert_eq!(lookup.remembered_version("vmd0"), Some(0));
//! ```

pub mod descriptors;
pub mod error;
pub mod multikey;
pub mod states;
pub mod versioned;

pub use descriptors::DescriptorsLookup;
pub use error::{LookupError, Result};
pub use multikey::{IndexDefinition, IndexView, KeyFn, MultiKeyLookup};
pub use states::{MultiStatesLookup, StatesLookup};
pub use versioned::VersionedLookup;
