//! Transactions: staged, single-purpose change sets.
//!
//! A transaction is opened on an [`Mdib`](crate::Mdib) and holds the
//! transaction lock until it is committed, aborted or dropped. Every `get_*`
//! call stages a working copy with its version already incremented; the
//! store is untouched until [`Transaction::commit`].

use crate::error::{Result, TransactionError};
use crate::mdib::Mdib;
use crate::processor::{ChangeSet, TransactionProcessor};
use crate::result::{TransactionItem, TransactionResult};
use chrono::{DateTime, Utc};
use mdib_core::{ContextAssociation, Descriptor, Entity, Handle, State, StateCategory};
use mdib_store::MdibStore;
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What a transaction may stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    /// Descriptor creation, update and deletion, plus states of any category.
    Descriptor,
    /// States of one category only.
    State(StateCategory),
    /// States of one category, bound by the first staged state.
    Unbound,
    /// Real-time sample array states only.
    RealTimeSample,
}

impl TransactionKind {
    pub fn metric() -> Self {
        TransactionKind::State(StateCategory::Metric)
    }

    pub fn alert() -> Self {
        TransactionKind::State(StateCategory::Alert)
    }

    pub fn component() -> Self {
        TransactionKind::State(StateCategory::Component)
    }

    pub fn context() -> Self {
        TransactionKind::State(StateCategory::Context)
    }

    pub fn operational() -> Self {
        TransactionKind::State(StateCategory::Operational)
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionKind::Descriptor => write!(f, "descriptor"),
            TransactionKind::State(category) => write!(f, "{} state", category),
            TransactionKind::Unbound => write!(f, "unbound state"),
            TransactionKind::RealTimeSample => write!(f, "real-time sample"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    /// A call failed; only abort or drop remain.
    Poisoned,
    Committed,
    Aborted,
}

impl TransactionStatus {
    pub fn is_closed(self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::Aborted)
    }
}

pub struct Transaction<'a> {
    mdib: &'a Mdib,
    lock: Option<MutexGuard<'a, ()>>,
    kind: TransactionKind,
    bound: Option<StateCategory>,
    status: TransactionStatus,
    changes: ChangeSet,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(mdib: &'a Mdib, lock: MutexGuard<'a, ()>, kind: TransactionKind) -> Self {
        let bound = match kind {
            TransactionKind::State(category) => Some(category),
            TransactionKind::RealTimeSample => Some(StateCategory::RealTimeSample),
            TransactionKind::Descriptor | TransactionKind::Unbound => None,
        };
        debug!(%kind, "opened transaction");
        Self {
            mdib,
            lock: Some(lock),
            kind,
            bound,
            status: TransactionStatus::Open,
            changes: ChangeSet::new(),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// The state category this transaction is bound to, if any yet.
    pub fn bound_category(&self) -> Option<StateCategory> {
        self.bound
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    // === Staging ===

    /// Stage a new descriptor, optionally with its state.
    ///
    /// With `adjust_version` a handle that existed before continues its
    /// version history instead of starting again at the caller's value.
    pub fn add_descriptor(
        &mut self,
        descriptor: Descriptor,
        adjust_version: bool,
        state: Option<State>,
    ) -> Result<()> {
        self.run("add_descriptor", |tx| {
            tx.require_descriptor_transaction("add_descriptor")?;
            let mut descriptor = descriptor;
            let handle = descriptor.handle().clone();
            if tx.changes.descriptors.contains_key(&handle) {
                return Err(TransactionError::AlreadyStaged(handle.to_string()));
            }
            {
                let mdib = tx.mdib;
                let store = mdib.store.read();
                if store.descriptor(handle.as_str()).is_some() {
                    return Err(TransactionError::DuplicateHandle(handle.to_string()));
                }
                if adjust_version {
                    store.descriptors().set_version(&mut descriptor, true);
                }
            }
            tx.changes
                .descriptors
                .insert(handle, TransactionItem::created(descriptor));
            if let Some(state) = state {
                tx.stage_new_state(state, adjust_version)?;
            }
            Ok(())
        })
    }

    /// Stage removal of a descriptor; its subtree goes with it at commit.
    pub fn remove_descriptor(&mut self, handle: &str) -> Result<()> {
        self.run("remove_descriptor", |tx| {
            tx.require_descriptor_transaction("remove_descriptor")?;
            if tx.changes.descriptors.contains_key(handle) {
                return Err(TransactionError::AlreadyStaged(handle.to_string()));
            }
            let old = tx
                .mdib
                .store
                .read()
                .descriptor(handle)
                .cloned()
                .ok_or_else(|| TransactionError::DescriptorNotFound(handle.to_string()))?;
            tx.changes
                .descriptors
                .insert(old.handle().clone(), TransactionItem::deleted(old));
            Ok(())
        })
    }

    /// Working copy of a descriptor with its version incremented.
    pub fn get_descriptor(&mut self, handle: &str) -> Result<&mut Descriptor> {
        let key = self.run("get_descriptor", |tx| {
            tx.require_descriptor_transaction("get_descriptor")?;
            if tx.changes.descriptors.contains_key(handle) {
                return Err(TransactionError::AlreadyStaged(handle.to_string()));
            }
            let old = tx
                .mdib
                .store
                .read()
                .descriptor(handle)
                .cloned()
                .ok_or_else(|| TransactionError::DescriptorNotFound(handle.to_string()))?;
            let mut new = old.clone();
            new.increment_version();
            let key = old.handle().clone();
            tx.changes
                .descriptors
                .insert(key.clone(), TransactionItem::updated(old, new));
            Ok(key)
        })?;
        self.changes
            .descriptors
            .get_mut(&key)
            .and_then(|item| item.new.as_mut())
            .ok_or_else(|| TransactionError::NotStaged(key.to_string()))
    }

    /// Working copy of a single state with its version incremented.
    pub fn get_state(&mut self, descriptor_handle: &str) -> Result<&mut State> {
        let key = self.run("get_state", |tx| {
            let old = tx
                .mdib
                .store
                .read()
                .state(descriptor_handle)
                .cloned()
                .ok_or_else(|| TransactionError::StateNotFound(descriptor_handle.to_string()))?;
            tx.bind(old.category())?;
            if tx.changes.states.contains_key(descriptor_handle) {
                return Err(TransactionError::AlreadyStaged(descriptor_handle.to_string()));
            }
            let mut new = old.clone();
            new.increment_state_version();
            let key = old.descriptor_handle().clone();
            tx.changes
                .states
                .insert(key.clone(), TransactionItem::updated(old, new));
            Ok(key)
        })?;
        self.staged_state_mut(&key)
    }

    /// Working copy of a context state with its version incremented.
    pub fn get_context_state(&mut self, handle: &str) -> Result<&mut State> {
        let key = self.run("get_context_state", |tx| {
            let old = tx
                .mdib
                .store
                .read()
                .context_state(handle)
                .cloned()
                .ok_or_else(|| TransactionError::StateNotFound(handle.to_string()))?;
            tx.bind(old.category())?;
            if tx.changes.context_states.contains_key(handle) {
                return Err(TransactionError::AlreadyStaged(handle.to_string()));
            }
            let mut new = old.clone();
            new.increment_state_version();
            let key = Handle::new(handle);
            tx.changes
                .context_states
                .insert(key.clone(), TransactionItem::updated(old, new));
            Ok(key)
        })?;
        self.staged_state_mut(&key)
    }

    /// Stage a state that does not exist yet.
    ///
    /// Its descriptor must exist or be staged for creation.
    pub fn add_state(&mut self, state: State, adjust_version: bool) -> Result<()> {
        self.run("add_state", |tx| tx.stage_new_state(state, adjust_version).map(|_| ()))
    }

    /// Stage a new context state for `descriptor_handle`.
    ///
    /// Without a `handle` one is generated. With `set_associated` the state
    /// is associated, bound at the mdib version this commit will produce and
    /// given a binding start time; the three always change together.
    pub fn mk_context_state(
        &mut self,
        descriptor_handle: &str,
        handle: Option<Handle>,
        adjust_version: bool,
        set_associated: bool,
    ) -> Result<&mut State> {
        let key = self.run("mk_context_state", |tx| {
            let mdib = tx.mdib;
            let state = {
                let store = mdib.store.read();
                let descriptor = tx.current_descriptor(&store, descriptor_handle)?;
                if !descriptor.is_context_descriptor() {
                    return Err(TransactionError::Inconsistent(format!(
                        "{} is not a context descriptor",
                        descriptor_handle
                    )));
                }
                let handle = handle.unwrap_or_else(|| Handle::generate(descriptor_handle));
                let mut state = State::new_context(&descriptor, handle);
                if set_associated {
                    if let Some(context) = state.as_context_mut() {
                        context.association = Some(ContextAssociation::Associated);
                        context.binding_mdib_version = Some(store.next_mdib_version());
                        context.binding_start_time = Some(Utc::now());
                    }
                }
                state
            };
            tx.stage_new_state(state, adjust_version)
        })?;
        self.staged_state_mut(&key)
    }

    /// Disassociate every associated context state of `descriptor_handle`
    /// except `keep`, staging each as an update.
    ///
    /// Returns the handles of the states that changed.
    pub fn disassociate_all(
        &mut self,
        descriptor_handle: &str,
        keep: Option<&str>,
    ) -> Result<Vec<Handle>> {
        self.run("disassociate_all", |tx| {
            tx.bind(StateCategory::Context)?;
            let mdib = tx.mdib;
            let store = mdib.store.read();
            let unbinding_version = store.next_mdib_version();
            let now = Utc::now();
            let mut touched = Vec::new();

            for (handle, item) in tx.changes.context_states.iter_mut() {
                if keep == Some(handle.as_str()) {
                    continue;
                }
                if let Some(state) = item.new.as_mut() {
                    if state.descriptor_handle().as_str() == descriptor_handle
                        && state.context_association() == Some(ContextAssociation::Associated)
                    {
                        disassociate(state, unbinding_version, now);
                        touched.push(handle.clone());
                    }
                }
            }

            for state in store.context_states_of(descriptor_handle) {
                let Some(handle) = state.handle() else {
                    continue;
                };
                if keep == Some(handle.as_str())
                    || tx.changes.context_states.contains_key(handle)
                    || state.context_association() != Some(ContextAssociation::Associated)
                {
                    continue;
                }
                let mut new = state.clone();
                new.increment_state_version();
                disassociate(&mut new, unbinding_version, now);
                tx.changes
                    .context_states
                    .insert(handle.clone(), TransactionItem::updated(state.clone(), new));
                touched.push(handle.clone());
            }
            Ok(touched)
        })
    }

    /// Drop a staged state again.
    ///
    /// `key` is the descriptor handle of a single state or the handle of a
    /// context state. An unbound transaction left without staged states
    /// accepts any category again.
    pub fn unget_state(&mut self, key: &str) -> Result<()> {
        self.run("unget_state", |tx| {
            let removed = tx
                .changes
                .states
                .shift_remove(key)
                .or_else(|| tx.changes.context_states.shift_remove(key));
            if removed.is_none() {
                return Err(TransactionError::NotStaged(key.to_string()));
            }
            if tx.kind == TransactionKind::Unbound
                && tx.changes.states.is_empty()
                && tx.changes.context_states.is_empty()
            {
                tx.bound = None;
            }
            Ok(())
        })
    }

    pub fn has_state(&self, key: &str) -> bool {
        self.changes.states.contains_key(key) || self.changes.context_states.contains_key(key)
    }

    pub fn staged_state(&self, key: &str) -> Option<&State> {
        self.changes
            .states
            .get(key)
            .or_else(|| self.changes.context_states.get(key))
            .and_then(|item| item.new.as_ref())
    }

    /// The staged version of a descriptor, if it is staged and not deleted.
    pub fn staged_descriptor(&self, handle: &str) -> Option<&Descriptor> {
        self.changes
            .descriptors
            .get(handle)
            .and_then(|item| item.new.as_ref())
    }

    // === Completion ===

    /// Apply all staged changes and publish the result.
    ///
    /// On failure nothing is applied and the transaction is poisoned.
    #[instrument(level = "debug", skip(self), fields(kind = %self.kind))]
    pub fn commit(&mut self) -> Result<Arc<TransactionResult>> {
        self.ensure_open()?;
        let changes = std::mem::take(&mut self.changes);
        let mdib = self.mdib;
        let outcome = {
            let mut store = mdib.store.write();
            TransactionProcessor::new(&mut store, mdib.config(), self.kind).process(changes)
        };

        match outcome {
            Ok(result) => {
                self.status = TransactionStatus::Committed;
                let result = Arc::new(result);
                if !result.is_empty() {
                    info!(
                        mdib_version = result.mdib_version(),
                        reports = ?result.report_kinds(),
                        "committed transaction"
                    );
                    mdib.notifier().publish(result.clone());
                }
                self.lock.take();
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "commit rejected");
                self.status = TransactionStatus::Poisoned;
                Err(err)
            }
        }
    }

    /// Discard all staged changes and release the transaction lock.
    pub fn abort(&mut self) {
        if self.status.is_closed() {
            return;
        }
        debug!(kind = %self.kind, staged = self.changes.len(), "aborted transaction");
        self.changes.clear();
        self.status = TransactionStatus::Aborted;
        self.lock.take();
    }

    // === Internals ===

    fn run<T>(&mut self, operation: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.ensure_open()?;
        let result = f(self);
        if let Err(err) = &result {
            debug!(operation, error = %err, "transaction poisoned");
            self.status = TransactionStatus::Poisoned;
        }
        result
    }

    fn ensure_open(&self) -> Result<()> {
        match self.status {
            TransactionStatus::Open => Ok(()),
            TransactionStatus::Poisoned => Err(TransactionError::Poisoned),
            TransactionStatus::Committed | TransactionStatus::Aborted => Err(TransactionError::Closed),
        }
    }

    fn require_descriptor_transaction(&self, operation: &'static str) -> Result<()> {
        if self.kind == TransactionKind::Descriptor {
            Ok(())
        } else {
            Err(TransactionError::WrongKind {
                operation,
                kind: self.kind,
            })
        }
    }

    fn bind(&mut self, category: StateCategory) -> Result<()> {
        if self.kind == TransactionKind::Descriptor {
            return Ok(());
        }
        match self.bound {
            Some(bound) if bound != category => Err(TransactionError::CategoryMismatch {
                bound,
                found: category,
            }),
            Some(_) => Ok(()),
            None => {
                self.bound = Some(category);
                Ok(())
            }
        }
    }

    /// The descriptor as this transaction sees it.
    fn current_descriptor(&self, store: &MdibStore, handle: &str) -> Result<Descriptor> {
        match self.changes.descriptors.get(handle) {
            Some(TransactionItem { new: Some(d), .. }) => Ok(d.clone()),
            Some(TransactionItem { new: None, .. }) => Err(TransactionError::Inconsistent(format!(
                "descriptor {} is staged for deletion",
                handle
            ))),
            None => store
                .descriptor(handle)
                .cloned()
                .ok_or_else(|| TransactionError::DescriptorNotFound(handle.to_string())),
        }
    }

    fn stage_new_state(&mut self, mut state: State, adjust_version: bool) -> Result<Handle> {
        self.bind(state.category())?;
        let mdib = self.mdib;
        let store = mdib.store.read();
        let descriptor_handle = state.descriptor_handle().clone();
        let descriptor = self.current_descriptor(&store, descriptor_handle.as_str())?;
        if descriptor.kind() != state.kind() {
            return Err(TransactionError::KindMismatch {
                handle: descriptor_handle.to_string(),
                expected: descriptor.kind(),
                found: state.kind(),
            });
        }
        state.set_descriptor_version(descriptor.descriptor_version());

        if state.is_multi_state() {
            let handle = state
                .handle()
                .cloned()
                .ok_or_else(|| TransactionError::MissingStateHandle(descriptor_handle.to_string()))?;
            if self.changes.context_states.contains_key(&handle) {
                return Err(TransactionError::AlreadyStaged(handle.to_string()));
            }
            if store.context_state(handle.as_str()).is_some()
                || store.descriptor(handle.as_str()).is_some()
                || self.changes.descriptors.contains_key(&handle)
            {
                return Err(TransactionError::DuplicateHandle(handle.to_string()));
            }
            if adjust_version {
                store.context_states().set_version(&mut state, true);
            }
            self.changes
                .context_states
                .insert(handle.clone(), TransactionItem::created(state));
            Ok(handle)
        } else {
            if self.changes.states.contains_key(&descriptor_handle) {
                return Err(TransactionError::AlreadyStaged(descriptor_handle.to_string()));
            }
            if store.state(descriptor_handle.as_str()).is_some() {
                return Err(TransactionError::DuplicateHandle(descriptor_handle.to_string()));
            }
            if adjust_version {
                store.states().set_version(&mut state, true);
            }
            self.changes
                .states
                .insert(descriptor_handle.clone(), TransactionItem::created(state));
            Ok(descriptor_handle)
        }
    }

    fn staged_state_mut(&mut self, key: &Handle) -> Result<&mut State> {
        let item = match self.changes.states.get_mut(key) {
            Some(item) => item,
            None => self
                .changes
                .context_states
                .get_mut(key)
                .ok_or_else(|| TransactionError::NotStaged(key.to_string()))?,
        };
        item.new
            .as_mut()
            .ok_or_else(|| TransactionError::NotStaged(key.to_string()))
    }
}

fn disassociate(state: &mut State, unbinding_version: u64, now: DateTime<Utc>) {
    if let Some(context) = state.as_context_mut() {
        context.association = Some(ContextAssociation::Disassociated);
        context.unbinding_mdib_version = Some(unbinding_version);
        context.binding_end_time = Some(now);
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        match self.status {
            TransactionStatus::Open => {
                warn!(
                    kind = %self.kind,
                    staged = self.changes.len(),
                    "open transaction dropped, aborting"
                );
                self.abort();
            }
            TransactionStatus::Poisoned => self.abort(),
            TransactionStatus::Committed | TransactionStatus::Aborted => {}
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("bound", &self.bound)
            .field("staged", &self.changes.len())
            .finish()
    }
}
