//! Serializable copy of a whole MDIB.

use mdib_core::{Descriptor, Handle, MdibVersionGroup, State};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every descriptor and state of an MDIB at one version.
///
/// Descriptors are listed root-first so that a reload sees each parent
/// before its children. States follow descriptor order.
///
/// The `remembered_*` maps carry the highest version of every deleted
/// descriptor, state and context state, so a handle recreated after a
/// reload still continues its version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdibSnapshot {
    pub version_group: MdibVersionGroup,
    pub mddescription_version: u64,
    pub mdstate_version: u64,
    pub descriptors: Vec<Descriptor>,
    pub states: Vec<State>,
    #[serde(default)]
    pub context_states: Vec<State>,
    #[serde(default)]
    pub remembered_descriptor_versions: BTreeMap<Handle, u64>,
    #[serde(default)]
    pub remembered_state_versions: BTreeMap<Handle, u64>,
    #[serde(default)]
    pub remembered_context_state_versions: BTreeMap<Handle, u64>,
}

impl MdibSnapshot {
    pub fn mdib_version(&self) -> u64 {
        self.version_group.mdib_version
    }

    pub fn descriptor(&self, handle: &str) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.handle().as_str() == handle)
    }

    pub fn state(&self, descriptor_handle: &str) -> Option<&State> {
        self.states
            .iter()
            .find(|s| s.descriptor_handle().as_str() == descriptor_handle)
    }
}
