//! # mdib-core
//!
//! Entity model for the SDC MDIB (Medical Device Information Base).
//!
//! This crate provides:
//! - [`Descriptor`] and [`State`] containers
//! - The closed [`Kind`] catalogue with category and containment routing
//! - [`CodedValue`] / [`Coding`] for code-based descriptor lookup
//! - [`MdibVersionGroup`] identifying one MDIB snapshot
//!
//! ## Example
//!
//! ```rust
//! use mdib_core::{Descriptor, Entity, Kind, State, StateCategory};
//!
//! let mds = Descriptor::mds("mds0");
//! let vmd = Descriptor::child(Kind::Vmd, "vmd0", "mds0");
//!
//! let state = State::new(&vmd);
//! assert_eq!(state.category(), StateCategory::Component);
//! assert!(Kind::Mds.accepts_child(vmd.kind()));
//! # let _ = mds;
//! ```

pub mod coding;
pub mod descriptor;
pub mod entity;
pub mod handle;
pub mod kind;
pub mod state;
pub mod version;

pub use coding::{CodedValue, Coding, Translation, DEFAULT_CODING_SYSTEM};
pub use descriptor::{Descriptor, SafetyClassification};
pub use entity::{Entity, Versioned};
pub use handle::{Handle, ObjectId};
pub use kind::{ChildSlot, Kind, ReportKind, StateCategory};
pub use state::{
    ActivationState, AlertConditionDetail, AlertSignalDetail, AlertSignalPresence,
    ContextAssociation, ContextDetail, InstanceIdentifier, MeasurementValidity, MetricData,
    MetricDetail, MetricValue, OperatingMode, OperationDetail, SampleArrayDetail,
    SampleArrayValue, State, StateDetail,
};
pub use version::MdibVersionGroup;
