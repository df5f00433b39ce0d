//! State tables: one for single states, one for multi-states.

use crate::descriptors::{HANDLE, NODE_TYPE};
use crate::error::{LookupError, Result};
use crate::multikey::{IndexDefinition, IndexView};
use crate::versioned::VersionedLookup;
use mdib_core::{Entity, Handle, Kind, State};

pub const DESCRIPTOR_HANDLE: &str = "descriptor_handle";

/// Single states, unique per descriptor handle.
#[derive(Debug)]
pub struct StatesLookup {
    table: VersionedLookup<State>,
}

impl StatesLookup {
    pub fn new() -> Self {
        let table = VersionedLookup::with_indices([
            (
                DESCRIPTOR_HANDLE,
                IndexDefinition::unique(|s: &State| Some(s.descriptor_handle().to_string())),
            ),
            (
                NODE_TYPE,
                IndexDefinition::new(|s: &State| Some(s.node_type().to_string())),
            ),
        ]);
        Self { table }
    }

    /// Insert a single state; multi-states are rejected.
    pub fn add_object(&mut self, state: State) -> Result<()> {
        if state.is_multi_state() {
            return Err(LookupError::Rejected {
                handle: state.descriptor_handle().to_string(),
                reason: "multi-states belong in the multi-state table".to_string(),
            });
        }
        self.table.add_object(state)
    }

    pub fn add_objects(&mut self, states: impl IntoIterator<Item = State>) -> Result<()> {
        for state in states {
            self.add_object(state)?;
        }
        Ok(())
    }

    pub fn remove_object(&mut self, descriptor_handle: &str) -> Result<State> {
        let id = self.get_one(descriptor_handle)?.object_id();
        self.table.remove_object(id)
    }

    /// Swap in a new version of the state for the same descriptor.
    pub fn replace_object(&mut self, state: State) -> Result<State> {
        if state.is_multi_state() {
            return Err(LookupError::Rejected {
                handle: state.descriptor_handle().to_string(),
                reason: "multi-states belong in the multi-state table".to_string(),
            });
        }
        let old_id = self.get_one(state.descriptor_handle().as_str())?.object_id();
        self.table.replace_object(old_id, state)
    }

    pub fn get(&self, descriptor_handle: &str) -> Option<&State> {
        self.table
            .index(DESCRIPTOR_HANDLE)
            .ok()?
            .get_one(descriptor_handle, true)
            .ok()
            .flatten()
    }

    pub fn get_one(&self, descriptor_handle: &str) -> Result<&State> {
        self.get(descriptor_handle).ok_or_else(|| LookupError::NotFound {
            index: DESCRIPTOR_HANDLE.to_string(),
            key: descriptor_handle.to_string(),
        })
    }

    pub fn contains(&self, descriptor_handle: &str) -> bool {
        self.get(descriptor_handle).is_some()
    }

    pub fn by_kind(&self, kind: Kind) -> Vec<&State> {
        self.table
            .index(NODE_TYPE)
            .map(|index| index.get(kind.state_node_type()))
            .unwrap_or_default()
    }

    pub fn set_version(&self, state: &mut State, increment: bool) {
        self.table.set_version(state, increment);
    }

    pub fn remembered_version(&self, descriptor_handle: &str) -> Option<u64> {
        self.table.remembered_version(descriptor_handle)
    }

    pub fn remembered_versions(&self) -> impl Iterator<Item = (&Handle, u64)> {
        self.table.remembered_versions()
    }

    pub fn seed_versions(&mut self, versions: impl IntoIterator<Item = (Handle, u64)>) {
        self.table.seed_versions(versions);
    }

    pub fn index(&self, name: &str) -> Result<IndexView<'_, State, String>> {
        self.table.index(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.table.iter()
    }
}

impl Default for StatesLookup {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-states (contexts), unique per own handle.
#[derive(Debug)]
pub struct MultiStatesLookup {
    table: VersionedLookup<State>,
}

fn check_multi_state(state: &State) -> Result<()> {
    if !state.is_multi_state() || state.handle().is_none() {
        return Err(LookupError::Rejected {
            handle: state.descriptor_handle().to_string(),
            reason: "only multi-states with a handle belong in the multi-state table".to_string(),
        });
    }
    Ok(())
}

impl MultiStatesLookup {
    pub fn new() -> Self {
        let table = VersionedLookup::with_indices([
            (
                HANDLE,
                IndexDefinition::unique(|s: &State| s.handle().map(Handle::to_string)),
            ),
            (
                DESCRIPTOR_HANDLE,
                IndexDefinition::new(|s: &State| Some(s.descriptor_handle().to_string())),
            ),
            (
                NODE_TYPE,
                IndexDefinition::new(|s: &State| Some(s.node_type().to_string())),
            ),
        ]);
        Self { table }
    }

    pub fn add_object(&mut self, state: State) -> Result<()> {
        check_multi_state(&state)?;
        self.table.add_object(state)
    }

    pub fn add_objects(&mut self, states: impl IntoIterator<Item = State>) -> Result<()> {
        for state in states {
            self.add_object(state)?;
        }
        Ok(())
    }

    pub fn remove_object(&mut self, handle: &str) -> Result<State> {
        let id = self.get_one(handle)?.object_id();
        self.table.remove_object(id)
    }

    pub fn replace_object(&mut self, state: State) -> Result<State> {
        check_multi_state(&state)?;
        let handle = state.handle().map(Handle::as_str).unwrap_or_default();
        let old_id = self.get_one(handle)?.object_id();
        self.table.replace_object(old_id, state)
    }

    pub fn get(&self, handle: &str) -> Option<&State> {
        self.table
            .index(HANDLE)
            .ok()?
            .get_one(handle, true)
            .ok()
            .flatten()
    }

    pub fn get_one(&self, handle: &str) -> Result<&State> {
        self.get(handle).ok_or_else(|| LookupError::NotFound {
            index: HANDLE.to_string(),
            key: handle.to_string(),
        })
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.get(handle).is_some()
    }

    /// All multi-states of one descriptor, in insertion order.
    pub fn by_descriptor(&self, descriptor_handle: &str) -> Vec<&State> {
        self.table
            .index(DESCRIPTOR_HANDLE)
            .map(|index| index.get(descriptor_handle))
            .unwrap_or_default()
    }

    pub fn by_kind(&self, kind: Kind) -> Vec<&State> {
        self.table
            .index(NODE_TYPE)
            .map(|index| index.get(kind.state_node_type()))
            .unwrap_or_default()
    }

    pub fn set_version(&self, state: &mut State, increment: bool) {
        self.table.set_version(state, increment);
    }

    pub fn remembered_version(&self, handle: &str) -> Option<u64> {
        self.table.remembered_version(handle)
    }

    pub fn remembered_versions(&self) -> impl Iterator<Item = (&Handle, u64)> {
        self.table.remembered_versions()
    }

    pub fn seed_versions(&mut self, versions: impl IntoIterator<Item = (Handle, u64)>) {
        self.table.seed_versions(versions);
    }

    pub fn index(&self, name: &str) -> Result<IndexView<'_, State, String>> {
        self.table.index(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.table.iter()
    }
}

impl Default for MultiStatesLookup {
    fn default() -> Self {
        Self::new()
    }
}
