//! Object set with any number of named secondary indices.
//!
//! Every index maps a key computed from the object to the objects carrying
//! it. Unique indices reject a second object with an equal key. Removal goes
//! through a reverse map keyed by [`ObjectId`], so the key functions are never
//! re-evaluated for an object that is leaving the set.

use crate::error::{LookupError, Result};
use mdib_core::{Entity, ObjectId};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// Key extraction function of an index. `None` means "no key".
pub type KeyFn<T, K> = Box<dyn Fn(&T) -> Option<K> + Send + Sync>;

/// How an index derives its keys.
pub struct IndexDefinition<T, K> {
    key_fn: KeyFn<T, K>,
    unique: bool,
    index_none_values: bool,
}

impl<T, K> IndexDefinition<T, K> {
    /// A non-unique index that skips objects without a key.
    pub fn new(key_fn: impl Fn(&T) -> Option<K> + Send + Sync + 'static) -> Self {
        Self {
            key_fn: Box::new(key_fn),
            unique: false,
            index_none_values: false,
        }
    }

    /// A unique index that skips objects without a key.
    pub fn unique(key_fn: impl Fn(&T) -> Option<K> + Send + Sync + 'static) -> Self {
        Self {
            key_fn: Box::new(key_fn),
            unique: true,
            index_none_values: false,
        }
    }

    /// Also index objects whose key is `None` (queried via `get_none`).
    pub fn index_none_values(mut self, enabled: bool) -> Self {
        self.index_none_values = enabled;
        self
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

struct Index<T, K> {
    name: String,
    definition: IndexDefinition<T, K>,
    entries: HashMap<K, Vec<ObjectId>>,
    none_entries: Vec<ObjectId>,
}

impl<T, K: Hash + Eq + Clone + fmt::Debug> Index<T, K> {
    fn new(name: String, definition: IndexDefinition<T, K>) -> Self {
        Self {
            name,
            definition,
            entries: HashMap::new(),
            none_entries: Vec::new(),
        }
    }

    /// Outer `None`: the object is not indexed here.
    fn compute(&self, obj: &T) -> Option<Option<K>> {
        match (self.definition.key_fn)(obj) {
            Some(key) => Some(Some(key)),
            None if self.definition.index_none_values => Some(None),
            None => None,
        }
    }

    fn would_collide(&self, key: &Option<K>) -> bool {
        if !self.definition.unique {
            return false;
        }
        match key {
            Some(k) => self.entries.get(k).is_some_and(|ids| !ids.is_empty()),
            None => !self.none_entries.is_empty(),
        }
    }

    fn insert(&mut self, key: Option<K>, id: ObjectId) {
        match key {
            Some(k) => self.entries.entry(k).or_default().push(id),
            None => self.none_entries.push(id),
        }
    }

    fn remove(&mut self, key: &Option<K>, id: ObjectId) {
        match key {
            Some(k) => {
                if let Some(ids) = self.entries.get_mut(k) {
                    ids.retain(|x| *x != id);
                    if ids.is_empty() {
                        self.entries.remove(k);
                    }
                }
            }
            None => self.none_entries.retain(|x| *x != id),
        }
    }

    fn duplicate_error(&self, key: &Option<K>) -> LookupError {
        LookupError::DuplicateKey {
            index: self.name.clone(),
            key: format_key(key),
        }
    }
}

fn format_key<K: fmt::Debug>(key: &Option<K>) -> String {
    match key {
        Some(k) => format!("{:?}", k),
        None => "None".to_string(),
    }
}

/// A set of entities with named secondary indices.
pub struct MultiKeyLookup<T, K> {
    objects: HashMap<ObjectId, T>,
    indices: Vec<Index<T, K>>,
    /// Which (index, key) pairs each object was filed under.
    reverse: HashMap<ObjectId, Vec<(usize, Option<K>)>>,
}

impl<T: Entity, K: Hash + Eq + Clone + fmt::Debug> MultiKeyLookup<T, K> {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            indices: Vec::new(),
            reverse: HashMap::new(),
        }
    }

    /// An empty lookup with the given indices; names must be distinct.
    pub fn with_indices(
        indices: impl IntoIterator<Item = (&'static str, IndexDefinition<T, K>)>,
    ) -> Self {
        let mut lookup = Self::new();
        for (name, definition) in indices {
            lookup.indices.push(Index::new(name.to_string(), definition));
        }
        lookup
    }

    /// Register an index and file every existing object under it.
    ///
    /// Fails without registering anything if the existing objects violate a
    /// unique definition.
    pub fn add_index(
        &mut self,
        name: impl Into<String>,
        definition: IndexDefinition<T, K>,
    ) -> Result<()> {
        let name = name.into();
        if self.indices.iter().any(|i| i.name == name) {
            return Err(LookupError::IndexExists(name));
        }

        let mut index = Index::new(name, definition);
        let position = self.indices.len();
        let mut backfill = Vec::new();
        for (id, obj) in &self.objects {
            if let Some(key) = index.compute(obj) {
                if index.would_collide(&key) {
                    return Err(index.duplicate_error(&key));
                }
                index.insert(key.clone(), *id);
                backfill.push((*id, key));
            }
        }

        for (id, key) in backfill {
            self.reverse.entry(id).or_default().push((position, key));
        }
        self.indices.push(index);
        Ok(())
    }

    fn compute_keys(&self, obj: &T) -> Result<Vec<(usize, Option<K>)>> {
        let mut keys = Vec::with_capacity(self.indices.len());
        for (position, index) in self.indices.iter().enumerate() {
            if let Some(key) = index.compute(obj) {
                if index.would_collide(&key) {
                    return Err(index.duplicate_error(&key));
                }
                keys.push((position, key));
            }
        }
        Ok(keys)
    }

    /// Insert an object. On a unique-key collision nothing is changed.
    pub fn add_object(&mut self, obj: T) -> Result<()> {
        let id = obj.object_id();
        if self.objects.contains_key(&id) {
            return Err(LookupError::DuplicateObject(id));
        }

        let keys = self.compute_keys(&obj)?;
        for (position, key) in &keys {
            self.indices[*position].insert(key.clone(), id);
        }
        self.reverse.insert(id, keys);
        self.objects.insert(id, obj);
        Ok(())
    }

    /// Insert several objects; either all of them go in or none does.
    pub fn add_objects(&mut self, objs: impl IntoIterator<Item = T>) -> Result<()> {
        let mut added = Vec::new();
        for obj in objs {
            let id = obj.object_id();
            if let Err(e) = self.add_object(obj) {
                for id in added {
                    self.remove_object(id)?;
                }
                return Err(e);
            }
            added.push(id);
        }
        Ok(())
    }

    /// Remove an object and every index entry that refers to it.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<T> {
        let obj = self
            .objects
            .remove(&id)
            .ok_or(LookupError::UnknownObject(id))?;
        if let Some(keys) = self.reverse.remove(&id) {
            for (position, key) in keys {
                self.indices[position].remove(&key, id);
            }
        }
        Ok(obj)
    }

    /// Remove several objects; fails before removing anything if one is unknown.
    pub fn remove_objects(&mut self, ids: &[ObjectId]) -> Result<Vec<T>> {
        if let Some(missing) = ids.iter().find(|id| !self.objects.contains_key(id)) {
            return Err(LookupError::UnknownObject(*missing));
        }
        ids.iter().map(|id| self.remove_object(*id)).collect()
    }

    /// Re-file an object whose indexed attributes changed.
    ///
    /// The stored object with the same id is replaced; if the new keys
    /// collide, the previous object is restored.
    pub fn update_object(&mut self, obj: T) -> Result<T> {
        let old = self.remove_object(obj.object_id())?;
        match self.add_object(obj) {
            Ok(()) => Ok(old),
            Err(e) => {
                self.add_object(old)?;
                Err(e)
            }
        }
    }

    /// Mutate a stored object in place and re-file it.
    pub fn modify(&mut self, id: ObjectId, f: impl FnOnce(&mut T)) -> Result<()> {
        let mut obj = self
            .objects
            .get(&id)
            .cloned()
            .ok_or(LookupError::UnknownObject(id))?;
        f(&mut obj);
        self.update_object(obj).map(|_| ())
    }

    pub fn get(&self, id: ObjectId) -> Option<&T> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.values()
    }

    /// Query surface of a named index.
    pub fn index(&self, name: &str) -> Result<IndexView<'_, T, K>> {
        let index = self
            .indices
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| LookupError::UnknownIndex(name.to_string()))?;
        Ok(IndexView {
            objects: &self.objects,
            index,
        })
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.indices.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.reverse.clear();
        for index in &mut self.indices {
            index.entries.clear();
            index.none_entries.clear();
        }
    }
}

impl<T: Entity, K: Hash + Eq + Clone + fmt::Debug> Default for MultiKeyLookup<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> fmt::Debug for MultiKeyLookup<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiKeyLookup")
            .field("objects", &self.objects.len())
            .field(
                "indices",
                &self.indices.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Read access to one index of a [`MultiKeyLookup`].
pub struct IndexView<'a, T, K> {
    objects: &'a HashMap<ObjectId, T>,
    index: &'a Index<T, K>,
}

impl<'a, T, K: Hash + Eq + Clone + fmt::Debug> IndexView<'a, T, K> {
    pub fn name(&self) -> &str {
        &self.index.name
    }

    fn resolve(&self, ids: &'a [ObjectId]) -> Vec<&'a T> {
        let objects = self.objects;
        ids.iter().filter_map(|id| objects.get(id)).collect()
    }

    /// All objects filed under `key`, in insertion order.
    pub fn get<Q>(&self, key: &Q) -> Vec<&'a T>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index: &'a Index<T, K> = self.index;
        match index.entries.get(key) {
            Some(ids) => self.resolve(ids),
            None => Vec::new(),
        }
    }

    /// Objects whose key was `None` (only for `index_none_values` indices).
    pub fn get_none(&self) -> Vec<&'a T> {
        let index: &'a Index<T, K> = self.index;
        self.resolve(&index.none_entries)
    }

    /// Exactly one object for `key`.
    ///
    /// More than one match is always an error. Zero matches is an error
    /// unless `allow_none`, in which case `Ok(None)` is returned.
    pub fn get_one<Q>(&self, key: &Q, allow_none: bool) -> Result<Option<&'a T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        let found = self.get(key);
        match found.len() {
            0 if allow_none => Ok(None),
            0 => Err(LookupError::NotFound {
                index: self.index.name.clone(),
                key: format!("{:?}", key),
            }),
            1 => Ok(found.into_iter().next()),
            count => Err(LookupError::MultipleMatches {
                index: self.index.name.clone(),
                key: format!("{:?}", key),
                count,
            }),
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a K> + 'a {
        let index: &'a Index<T, K> = self.index;
        index.entries.keys()
    }

    /// Number of distinct non-`None` keys.
    pub fn len(&self) -> usize {
        self.index.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.entries.is_empty() && self.index.none_entries.is_empty()
    }
}
