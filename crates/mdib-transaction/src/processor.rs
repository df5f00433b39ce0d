//! Commit processing: validate a change set, cascade versions, apply it.
//!
//! Processing runs in two phases. Planning reads the store only: it checks
//! every staged object, expands deletes to whole subtrees, bumps parents and
//! synthesizes the state updates that follow from descriptor changes. Only a
//! plan that passed every check is applied, so a rejected commit leaves the
//! store exactly as it was.

use crate::config::MdibConfig;
use crate::error::{Result, TransactionError};
use crate::result::{TransactionItem, TransactionResult};
use crate::transaction::TransactionKind;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use mdib_core::{Descriptor, Entity, Handle, Kind, State};
use mdib_store::MdibStore;
use tracing::debug;

/// Everything a transaction staged.
///
/// Single states are keyed by descriptor handle, context states by their own
/// handle.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub descriptors: IndexMap<Handle, TransactionItem<Descriptor>>,
    pub states: IndexMap<Handle, TransactionItem<State>>,
    pub context_states: IndexMap<Handle, TransactionItem<State>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty() && self.states.is_empty() && self.context_states.is_empty()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len() + self.states.len() + self.context_states.len()
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.states.clear();
        self.context_states.clear();
    }
}

struct Plan {
    created: IndexMap<Handle, Descriptor>,
    updated: IndexMap<Handle, Descriptor>,
    deleted: IndexSet<Handle>,
    states: IndexMap<Handle, TransactionItem<State>>,
    context_states: IndexMap<Handle, TransactionItem<State>>,
}

/// Descriptor lookup as it will be after the commit.
struct PlannedTree<'p> {
    store: &'p MdibStore,
    created: &'p IndexMap<Handle, Descriptor>,
    updated: &'p IndexMap<Handle, Descriptor>,
    deleted: &'p IndexSet<Handle>,
}

impl<'p> PlannedTree<'p> {
    fn get(&self, handle: &str) -> Option<&'p Descriptor> {
        if self.deleted.contains(handle) {
            return None;
        }
        self.created
            .get(handle)
            .or_else(|| self.updated.get(handle))
            .or_else(|| self.store.descriptor(handle))
    }
}

/// Applies one [`ChangeSet`] to the store it was staged against.
pub struct TransactionProcessor<'s> {
    store: &'s mut MdibStore,
    config: &'s MdibConfig,
    kind: TransactionKind,
    now: DateTime<Utc>,
}

impl<'s> TransactionProcessor<'s> {
    pub fn new(store: &'s mut MdibStore, config: &'s MdibConfig, kind: TransactionKind) -> Self {
        Self {
            store,
            config,
            kind,
            now: Utc::now(),
        }
    }

    /// Use `now` for every determination time stamped by this commit.
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn process(mut self, changes: ChangeSet) -> Result<TransactionResult> {
        let plan = self.plan(changes)?;
        self.apply(plan)
    }

    fn plan(&self, changes: ChangeSet) -> Result<Plan> {
        let store = &*self.store;
        let ChangeSet {
            descriptors,
            mut states,
            mut context_states,
        } = changes;

        let mut created: IndexMap<Handle, Descriptor> = IndexMap::new();
        let mut updated: IndexMap<Handle, Descriptor> = IndexMap::new();
        let mut delete_roots: Vec<Handle> = Vec::new();
        for (handle, item) in descriptors {
            match (item.old, item.new) {
                (None, Some(new)) => {
                    created.insert(handle, new);
                }
                (Some(_), Some(new)) => {
                    updated.insert(handle, new);
                }
                (Some(_), None) => delete_roots.push(handle),
                (None, None) => {}
            }
        }

        let deleted = expand_deletes(store, &delete_roots)?;
        validate_created(store, &created, &deleted)?;
        validate_updated(store, &updated, &deleted)?;

        // A child added or removed bumps its parent once per commit.
        let touched_parents: Vec<Handle> = created
            .values()
            .filter_map(|d| d.parent_handle().cloned())
            .chain(deleted.iter().filter_map(|h| {
                store
                    .descriptor(h.as_str())
                    .and_then(|d| d.parent_handle().cloned())
            }))
            .collect();
        let mut bumped: IndexSet<Handle> = IndexSet::new();
        for parent in touched_parents {
            if created.contains_key(&parent)
                || deleted.contains(&parent)
                || updated.contains_key(&parent)
            {
                continue;
            }
            bumped.insert(parent);
        }
        for parent in bumped {
            if let Some(old) = store.descriptor(parent.as_str()) {
                let mut new = old.clone();
                new.increment_version();
                debug!(handle = %parent, version = new.descriptor_version(), "bumped parent descriptor");
                updated.insert(parent, new);
            }
        }

        let tree = PlannedTree {
            store,
            created: &created,
            updated: &updated,
            deleted: &deleted,
        };

        for (key, item) in states.iter().chain(context_states.iter()) {
            validate_staged_state(store, &tree, key, item)?;
        }
        for item in states.values_mut().chain(context_states.values_mut()) {
            if let Some(new) = item.new.as_mut() {
                if let Some(descriptor) = tree.get(new.descriptor_handle().as_str()) {
                    new.set_descriptor_version(descriptor.descriptor_version());
                }
            }
        }

        // Updated descriptors carry their states along.
        for (handle, descriptor) in &updated {
            for state in store.states_of(handle.as_str()) {
                let (staged, key) = if state.is_multi_state() {
                    match state.handle() {
                        Some(h) => (&mut context_states, h.clone()),
                        None => continue,
                    }
                } else {
                    (&mut states, state.descriptor_handle().clone())
                };
                if staged.contains_key(&key) {
                    continue;
                }
                let mut new = state.clone();
                new.increment_state_version();
                new.set_descriptor_version(descriptor.descriptor_version());
                staged.insert(key, TransactionItem::updated(state.clone(), new));
            }
        }

        if self.config.create_missing_states {
            for descriptor in created.values() {
                if descriptor.kind().is_multi_state() || states.contains_key(descriptor.handle()) {
                    continue;
                }
                let mut state = State::new(descriptor);
                store.states().set_version(&mut state, true);
                states.insert(descriptor.handle().clone(), TransactionItem::created(state));
            }
        }

        if self.kind != TransactionKind::RealTimeSample {
            for item in states.values_mut() {
                let TransactionItem { old, new } = item;
                if let Some(new) = new.as_mut() {
                    if self.config.set_determination_time {
                        stamp_metric(old.as_ref(), new, self.now);
                    }
                    stamp_alert_condition(old.as_ref(), new, self.now);
                }
            }
        }

        Ok(Plan {
            created,
            updated,
            deleted,
            states,
            context_states,
        })
    }

    fn apply(&mut self, plan: Plan) -> Result<TransactionResult> {
        let Plan {
            created,
            updated,
            deleted,
            states,
            context_states,
        } = plan;
        let mut result = TransactionResult::new(self.kind, self.store.version_group());

        if !deleted.is_empty() {
            let removed = self.store.rm_descriptors_and_states(deleted.iter())?;
            result.descr_deleted = removed.descriptors;
            result.deleted_states = removed.states;
            result.deleted_states.extend(removed.context_states);
        }
        for descriptor in created.into_values() {
            result.descr_created.push(descriptor.detached());
            self.store.descriptors_mut().add_object(descriptor)?;
        }
        for descriptor in updated.into_values() {
            result.descr_updated.push(descriptor.detached());
            self.store.descriptors_mut().replace_object(descriptor)?;
        }
        for item in states.into_values().chain(context_states.into_values()) {
            self.apply_state(item, &mut result)?;
        }

        let bumped = self
            .store
            .apply_version_bump(result.has_descriptor_updates(), result.has_category_updates());
        result.version_group = self.store.version_group();
        debug!(
            bumped,
            mdib_version = result.mdib_version(),
            created = result.descr_created.len(),
            updated = result.descr_updated.len(),
            deleted = result.descr_deleted.len(),
            states = result.all_updated_states().count(),
            "applied change set"
        );
        Ok(result)
    }

    fn apply_state(&mut self, item: TransactionItem<State>, result: &mut TransactionResult) -> Result<()> {
        match (item.old, item.new) {
            (old, Some(new)) => {
                result.updates_mut(new.category()).push(new.detached());
                match (old.is_some(), new.is_multi_state()) {
                    (true, false) => {
                        self.store.states_mut().replace_object(new)?;
                    }
                    (false, false) => self.store.states_mut().add_object(new)?,
                    (true, true) => {
                        self.store.context_states_mut().replace_object(new)?;
                    }
                    (false, true) => self.store.context_states_mut().add_object(new)?,
                }
            }
            (Some(old), None) => {
                let removed = match old.handle() {
                    Some(handle) if old.is_multi_state() => {
                        self.store.context_states_mut().remove_object(handle.as_str())?
                    }
                    _ => self
                        .store
                        .states_mut()
                        .remove_object(old.descriptor_handle().as_str())?,
                };
                result.deleted_states.push(removed);
            }
            (None, None) => {}
        }
        Ok(())
    }
}

/// Full subtrees of the delete roots, every descendant before its ancestor.
fn expand_deletes(store: &MdibStore, roots: &[Handle]) -> Result<IndexSet<Handle>> {
    let mut deleted: IndexSet<Handle> = IndexSet::new();
    for root in roots {
        if deleted.contains(root) {
            continue;
        }
        let subtree = store.get_all_descriptors_in_subtree(root.as_str(), true, true);
        if subtree.is_empty() {
            return Err(TransactionError::DescriptorNotFound(root.to_string()));
        }
        deleted.extend(subtree.into_iter().map(|d| d.handle().clone()));
    }
    Ok(deleted)
}

fn validate_created(
    store: &MdibStore,
    created: &IndexMap<Handle, Descriptor>,
    deleted: &IndexSet<Handle>,
) -> Result<()> {
    for (handle, descriptor) in created {
        if store.descriptor(handle.as_str()).is_some() {
            return Err(TransactionError::DuplicateHandle(handle.to_string()));
        }
        let invalid_parent = || TransactionError::InvalidParent {
            handle: handle.to_string(),
            parent: descriptor.parent_handle().map(Handle::to_string),
        };
        let parent = match (descriptor.kind(), descriptor.parent_handle()) {
            (Kind::Mds, None) => continue,
            (Kind::Mds, Some(_)) | (_, None) => return Err(invalid_parent()),
            (_, Some(parent)) => parent,
        };
        let parent_kind = match created.get(parent) {
            Some(p) => p.kind(),
            None if deleted.contains(parent) => return Err(invalid_parent()),
            None => store
                .descriptor(parent.as_str())
                .map(Entity::kind)
                .ok_or_else(invalid_parent)?,
        };
        if !parent_kind.accepts_child(descriptor.kind()) {
            return Err(TransactionError::InvalidContainment {
                handle: handle.to_string(),
                parent: parent_kind,
                child: descriptor.kind(),
            });
        }
    }
    Ok(())
}

fn validate_updated(
    store: &MdibStore,
    updated: &IndexMap<Handle, Descriptor>,
    deleted: &IndexSet<Handle>,
) -> Result<()> {
    for (handle, new) in updated {
        if deleted.contains(handle) {
            return Err(TransactionError::Inconsistent(format!(
                "descriptor {} is updated and deleted in one transaction",
                handle
            )));
        }
        let old = store
            .descriptor(handle.as_str())
            .ok_or_else(|| TransactionError::DescriptorNotFound(handle.to_string()))?;
        if old.kind() != new.kind() {
            return Err(TransactionError::ImmutableField {
                handle: handle.to_string(),
                field: "kind",
            });
        }
        if old.parent_handle() != new.parent_handle() {
            return Err(TransactionError::ImmutableField {
                handle: handle.to_string(),
                field: "parent_handle",
            });
        }
    }
    Ok(())
}

fn validate_staged_state(
    store: &MdibStore,
    tree: &PlannedTree<'_>,
    key: &Handle,
    item: &TransactionItem<State>,
) -> Result<()> {
    let Some(new) = item.new.as_ref() else {
        return Ok(());
    };
    let descriptor_handle = new.descriptor_handle();
    let descriptor = tree.get(descriptor_handle.as_str()).ok_or_else(|| {
        TransactionError::Inconsistent(format!(
            "state {} refers to descriptor {} which is missing or being deleted",
            key, descriptor_handle
        ))
    })?;
    if descriptor.kind() != new.kind() {
        return Err(TransactionError::KindMismatch {
            handle: descriptor_handle.to_string(),
            expected: descriptor.kind(),
            found: new.kind(),
        });
    }
    let stored = if new.is_multi_state() {
        store.context_state(key.as_str())
    } else {
        store.state(key.as_str())
    };
    match (&item.old, stored) {
        (Some(_), None) => Err(TransactionError::StateNotFound(key.to_string())),
        (None, Some(_)) => Err(TransactionError::DuplicateHandle(key.to_string())),
        _ => Ok(()),
    }
}

/// Stamp the metric value's determination time unless the caller set one.
fn stamp_metric(old: Option<&State>, new: &mut State, now: DateTime<Utc>) {
    let previous = old
        .and_then(State::as_metric)
        .and_then(|m| m.metric_value.as_ref())
        .and_then(|v| v.determination_time);
    if let Some(value) = new.as_metric_mut().and_then(|m| m.metric_value.as_mut()) {
        if value.determination_time == previous {
            value.determination_time = Some(now);
        }
    }
}

/// Stamp an alert condition that just became present.
fn stamp_alert_condition(old: Option<&State>, new: &mut State, now: DateTime<Utc>) {
    let was_present = old.is_some_and(State::alert_presence);
    let previous = old
        .and_then(State::as_alert_condition)
        .and_then(|a| a.determination_time);
    if let Some(condition) = new.as_alert_condition_mut() {
        if !was_present && condition.presence == Some(true) && condition.determination_time == previous
        {
            condition.determination_time = Some(now);
        }
    }
}
