//! MDIB version group.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies one snapshot of the whole MDIB.
///
/// Two groups are only comparable when their sequence ids are equal; a new
/// sequence id means version numbering restarted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MdibVersionGroup {
    pub mdib_version: u64,
    pub sequence_id: String,
    pub instance_id: Option<u64>,
}

impl MdibVersionGroup {
    pub fn new(mdib_version: u64, sequence_id: impl Into<String>, instance_id: Option<u64>) -> Self {
        Self {
            mdib_version,
            sequence_id: sequence_id.into(),
            instance_id,
        }
    }

    /// Fresh `urn:ulid:` sequence id.
    pub fn new_sequence_id() -> String {
        format!("urn:ulid:{}", Ulid::new())
    }

    /// True if `other` belongs to the same sequence and is strictly newer.
    pub fn is_older_than(&self, other: &MdibVersionGroup) -> bool {
        self.sequence_id == other.sequence_id
            && self.instance_id == other.instance_id
            && self.mdib_version < other.mdib_version
    }
}

impl std::fmt::Display for MdibVersionGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.instance_id {
            Some(instance) => write!(
                f,
                "mdib_version={} sequence_id={} instance_id={}",
                self.mdib_version, self.sequence_id, instance
            ),
            None => write!(
                f,
                "mdib_version={} sequence_id={}",
                self.mdib_version, self.sequence_id
            ),
        }
    }
}
