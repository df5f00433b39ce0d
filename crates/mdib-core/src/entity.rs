//! Traits shared by every container kept in the lookup tables.

use crate::handle::{Handle, ObjectId};
use crate::kind::Kind;

/// A container with a stable process-local identity.
pub trait Entity: Clone {
    fn object_id(&self) -> ObjectId;

    fn kind(&self) -> Kind;
}

/// A container whose version must never go backwards for its logical key,
/// even across delete and recreate.
pub trait Versioned: Entity {
    /// Logical key the version history is tracked under.
    fn version_key(&self) -> &Handle;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}
