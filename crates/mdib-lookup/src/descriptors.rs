//! Descriptor table with parent/child bookkeeping.

use crate::error::{LookupError, Result};
use crate::multikey::{IndexDefinition, IndexView};
use crate::versioned::VersionedLookup;
use mdib_core::{ChildSlot, Coding, Descriptor, Entity, Handle, Kind};
use std::collections::{BTreeMap, HashMap};

pub const HANDLE: &str = "handle";
pub const PARENT_HANDLE: &str = "parent_handle";
pub const NODE_TYPE: &str = "node_type";
pub const CODING: &str = "coding";

/// All descriptors of an MDIB, indexed by handle, parent, node type and
/// `Type` coding.
///
/// Besides the indices, each descriptor's children are kept per
/// [`ChildSlot`] in insertion order; that ordering is what a serializer
/// walks, and in-place replacement of a child does not disturb it.
#[derive(Debug)]
pub struct DescriptorsLookup {
    table: VersionedLookup<Descriptor>,
    children: HashMap<Handle, BTreeMap<ChildSlot, Vec<Handle>>>,
}

fn not_found(handle: &str) -> LookupError {
    LookupError::NotFound {
        index: HANDLE.to_string(),
        key: handle.to_string(),
    }
}

impl DescriptorsLookup {
    pub fn new() -> Self {
        let table = VersionedLookup::with_indices([
            (
                HANDLE,
                IndexDefinition::unique(|d: &Descriptor| Some(d.handle().to_string())),
            ),
            (
                PARENT_HANDLE,
                IndexDefinition::new(|d: &Descriptor| d.parent_handle().map(Handle::to_string))
                    .index_none_values(true),
            ),
            (
                NODE_TYPE,
                IndexDefinition::new(|d: &Descriptor| Some(d.node_type().to_string())),
            ),
            (
                CODING,
                IndexDefinition::new(|d: &Descriptor| d.coding().map(|c| c.index_key())),
            ),
        ]);
        Self {
            table,
            children: HashMap::new(),
        }
    }

    /// Insert a descriptor and link it into the child order of its parent.
    ///
    /// The parent only learns about the child if it is already present; a
    /// parent inserted later adopts its children in their insertion order.
    pub fn add_object(&mut self, descriptor: Descriptor) -> Result<()> {
        let handle = descriptor.handle().clone();
        let link = descriptor
            .parent_handle()
            .cloned()
            .zip(descriptor.child_slot());
        self.table.add_object(descriptor)?;

        if let Some((parent, slot)) = link {
            if self.contains(parent.as_str()) {
                self.attach(&parent, slot, handle.clone());
            }
        }

        let orphans: Vec<(ChildSlot, Handle)> = self
            .table
            .index(PARENT_HANDLE)?
            .get(handle.as_str())
            .iter()
            .filter_map(|child| child.child_slot().map(|slot| (slot, child.handle().clone())))
            .collect();
        for (slot, child) in orphans {
            self.attach(&handle, slot, child);
        }
        Ok(())
    }

    pub fn add_objects(&mut self, descriptors: impl IntoIterator<Item = Descriptor>) -> Result<()> {
        for descriptor in descriptors {
            self.add_object(descriptor)?;
        }
        Ok(())
    }

    fn attach(&mut self, parent: &Handle, slot: ChildSlot, child: Handle) {
        let list = self
            .children
            .entry(parent.clone())
            .or_default()
            .entry(slot)
            .or_default();
        if !list.contains(&child) {
            list.push(child);
        }
    }

    fn detach(&mut self, parent: &Handle, child: &Handle) {
        if let Some(slots) = self.children.get_mut(parent) {
            for list in slots.values_mut() {
                list.retain(|h| h != child);
            }
            slots.retain(|_, list| !list.is_empty());
        }
    }

    /// Remove a descriptor by handle and unlink it from its parent.
    pub fn remove_object(&mut self, handle: &str) -> Result<Descriptor> {
        let id = self.get(handle).ok_or_else(|| not_found(handle))?.object_id();
        let descriptor = self.table.remove_object(id)?;
        if let Some(parent) = descriptor.parent_handle() {
            self.detach(parent, descriptor.handle());
        }
        self.children.remove(descriptor.handle());
        Ok(descriptor)
    }

    /// Swap in a new version of an existing descriptor.
    ///
    /// Kind and parent must not change. The child ordering of both the parent
    /// and the descriptor itself is preserved.
    pub fn replace_object(&mut self, descriptor: Descriptor) -> Result<Descriptor> {
        let handle = descriptor.handle().as_str();
        let old = self.get(handle).ok_or_else(|| not_found(handle))?;
        if old.kind() != descriptor.kind() || old.parent_handle() != descriptor.parent_handle() {
            return Err(LookupError::Rejected {
                handle: handle.to_string(),
                reason: "kind and parent of a descriptor cannot change".to_string(),
            });
        }
        let old_id = old.object_id();
        self.table.replace_object(old_id, descriptor)
    }

    pub fn get(&self, handle: &str) -> Option<&Descriptor> {
        self.table
            .index(HANDLE)
            .ok()?
            .get_one(handle, true)
            .ok()
            .flatten()
    }

    /// Like [`get`](Self::get) but absence is an error.
    pub fn get_one(&self, handle: &str) -> Result<&Descriptor> {
        self.get(handle).ok_or_else(|| not_found(handle))
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.get(handle).is_some()
    }

    /// Children of `handle` in wire order (by slot, then insertion).
    pub fn children_of(&self, handle: &str) -> Vec<&Descriptor> {
        self.children
            .get(handle)
            .map(|slots| {
                slots
                    .values()
                    .flatten()
                    .filter_map(|child| self.get(child.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Children of `handle` straight from the parent index.
    pub fn by_parent(&self, handle: &str) -> Vec<&Descriptor> {
        self.table
            .index(PARENT_HANDLE)
            .map(|index| index.get(handle))
            .unwrap_or_default()
    }

    /// Descriptors without a parent.
    pub fn roots(&self) -> Vec<&Descriptor> {
        self.table
            .index(PARENT_HANDLE)
            .map(|index| index.get_none())
            .unwrap_or_default()
    }

    pub fn by_kind(&self, kind: Kind) -> Vec<&Descriptor> {
        self.table
            .index(NODE_TYPE)
            .map(|index| index.get(kind.descriptor_node_type()))
            .unwrap_or_default()
    }

    /// Descriptors whose primary `Type` coding equals `coding`.
    ///
    /// Translations are not indexed; use a tree walk with
    /// [`Descriptor::matches_coding`] to include them.
    pub fn by_coding(&self, coding: &Coding) -> Vec<&Descriptor> {
        self.table
            .index(CODING)
            .map(|index| index.get(coding.index_key().as_str()))
            .unwrap_or_default()
    }

    pub fn set_version(&self, descriptor: &mut Descriptor, increment: bool) {
        self.table.set_version(descriptor, increment);
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

    pub fn index(&self, name: &str) -> Result<IndexView<'_, Descriptor, String>> {
        self.table.index(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.table.iter()
    }
}

impl Default for DescriptorsLookup {
    fn default() -> Self {
        Self::new()
    }
}
