//! Lookups that remember the highest version ever seen per logical key.
//!
//! A handle that is deleted and later recreated must come back with a
//! version above everything it had before, otherwise a consumer could treat
//! the new object as stale. The side map below is never cleared.

use crate::error::Result;
use crate::multikey::{IndexDefinition, IndexView, MultiKeyLookup};
use mdib_core::{Handle, ObjectId, Versioned};
use std::collections::HashMap;
use tracing::trace;

pub struct VersionedLookup<T> {
    table: MultiKeyLookup<T, String>,
    versions: HashMap<Handle, u64>,
}

impl<T: Versioned> VersionedLookup<T> {
    pub fn new() -> Self {
        Self {
            table: MultiKeyLookup::new(),
            versions: HashMap::new(),
        }
    }

    /// An empty table with the given indices; names must be distinct.
    pub fn with_indices(
        indices: impl IntoIterator<Item = (&'static str, IndexDefinition<T, String>)>,
    ) -> Self {
        Self {
            table: MultiKeyLookup::with_indices(indices),
            versions: HashMap::new(),
        }
    }

    pub fn add_index(&mut self, name: &str, definition: IndexDefinition<T, String>) -> Result<()> {
        self.table.add_index(name, definition)
    }

    pub fn add_object(&mut self, obj: T) -> Result<()> {
        self.table.add_object(obj)
    }

    /// Remove an object, remembering its version under its key.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<T> {
        let obj = self.table.remove_object(id)?;
        self.remember(&obj);
        Ok(obj)
    }

    /// Swap the stored object with the same id for `obj`.
    pub fn update_object(&mut self, obj: T) -> Result<T> {
        let old = self.table.update_object(obj)?;
        self.remember(&old);
        Ok(old)
    }

    /// Replace the object `old` with `obj`, restoring `old` if `obj` is rejected.
    pub fn replace_object(&mut self, old: ObjectId, obj: T) -> Result<T> {
        let previous = self.table.remove_object(old)?;
        if let Err(e) = self.table.add_object(obj) {
            self.table.add_object(previous)?;
            return Err(e);
        }
        self.remember(&previous);
        Ok(previous)
    }

    fn remember(&mut self, obj: &T) {
        let version = obj.version();
        let entry = self.versions.entry(obj.version_key().clone()).or_insert(version);
        *entry = (*entry).max(version);
        trace!(key = %obj.version_key(), version = *entry, "remembered version");
    }

    /// Highest version seen for `key` among removed objects.
    pub fn remembered_version(&self, key: &str) -> Option<u64> {
        self.versions.get(key).copied()
    }

    /// Every remembered key with its highest version.
    pub fn remembered_versions(&self) -> impl Iterator<Item = (&Handle, u64)> {
        self.versions.iter().map(|(key, version)| (key, *version))
    }

    /// Merge versions remembered elsewhere, e.g. by a store being reloaded.
    ///
    /// Existing entries only move up.
    pub fn seed_versions(&mut self, versions: impl IntoIterator<Item = (Handle, u64)>) {
        for (key, version) in versions {
            let entry = self.versions.entry(key).or_insert(version);
            *entry = (*entry).max(version);
        }
    }

    /// Continue the version history of `obj`'s key.
    ///
    /// With a remembered version the object gets that version, plus one if
    /// `increment`. Without one the caller's value is left alone.
    pub fn set_version(&self, obj: &mut T, increment: bool) {
        if let Some(version) = self.remembered_version(obj.version_key().as_str()) {
            obj.set_version(if increment { version + 1 } else { version });
        }
    }

    pub fn index(&self, name: &str) -> Result<IndexView<'_, T, String>> {
        self.table.index(name)
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.table.get(id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.table.iter()
    }

    pub fn lookup(&self) -> &MultiKeyLookup<T, String> {
        &self.table
    }
}

impl<T: Versioned> Default for VersionedLookup<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for VersionedLookup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedLookup")
            .field("table", &self.table)
            .field("remembered", &self.versions.len())
            .finish()
    }
}
