//! The lock-owning MDIB facade.

use crate::config::MdibConfig;
use crate::error::{Result, TransactionError};
use crate::notifier::{Notifier, ObserverId, TransactionObserver};
use crate::result::TransactionResult;
use crate::transaction::{Transaction, TransactionKind};
use mdib_core::{Descriptor, MdibVersionGroup, State};
use mdib_store::{MdibSnapshot, MdibStore};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// A medical device information base shared between threads.
///
/// Writers go through [`Transaction`]s, one at a time. Readers borrow the
/// store through [`Mdib::read`] and never see a half-applied commit.
pub struct Mdib {
    config: MdibConfig,
    transaction_lock: Mutex<()>,
    pub(crate) store: RwLock<MdibStore>,
    notifier: Notifier,
}

impl Mdib {
    pub fn new(config: MdibConfig) -> Self {
        let sequence_id = config
            .sequence_id
            .clone()
            .unwrap_or_else(MdibVersionGroup::new_sequence_id);
        let store = MdibStore::new(sequence_id, config.instance_id);
        Self::from_store(store, config)
    }

    /// Wrap an already populated store.
    pub fn from_store(store: MdibStore, config: MdibConfig) -> Self {
        info!(
            sequence_id = store.sequence_id(),
            descriptors = store.descriptors().len(),
            "created mdib"
        );
        Self {
            notifier: Notifier::new(config.notification_capacity),
            transaction_lock: Mutex::new(()),
            store: RwLock::new(store),
            config,
        }
    }

    pub fn config(&self) -> &MdibConfig {
        &self.config
    }

    pub(crate) fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Bulk-load descriptors and states without bumping versions or
    /// notifying anyone.
    ///
    /// Blocks until no transaction is open.
    pub fn load(
        &self,
        descriptors: impl IntoIterator<Item = Descriptor>,
        states: impl IntoIterator<Item = State>,
    ) -> Result<()> {
        let _guard = self.transaction_lock.lock();
        let mut store = self.store.write();
        store.add_description_containers(descriptors)?;
        store.add_state_containers(states)?;
        let created = if self.config.create_missing_states {
            store.mk_state_containers_for_all_descriptors()?
        } else {
            0
        };
        info!(
            descriptors = store.descriptors().len(),
            states = store.states().len(),
            context_states = store.context_states().len(),
            created,
            "loaded mdib"
        );
        Ok(())
    }

    // === Transactions ===

    /// Open a transaction, waiting for the current one to finish.
    pub fn transaction(&self, kind: TransactionKind) -> Transaction<'_> {
        Transaction::new(self, self.transaction_lock.lock(), kind)
    }

    /// Open a transaction unless one is already open.
    pub fn try_transaction(&self, kind: TransactionKind) -> Result<Transaction<'_>> {
        self.transaction_lock
            .try_lock()
            .map(|guard| Transaction::new(self, guard, kind))
            .ok_or(TransactionError::TransactionInProgress)
    }

    /// Run `f` inside a transaction and commit it.
    ///
    /// If `f` fails the transaction is aborted and its error returned.
    pub fn with_transaction<T>(
        &self,
        kind: TransactionKind,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T>,
    ) -> Result<(T, Arc<TransactionResult>)> {
        let mut tx = self.transaction(kind);
        match f(&mut tx) {
            Ok(value) => {
                let result = tx.commit()?;
                Ok((value, result))
            }
            Err(err) => {
                tx.abort();
                Err(err)
            }
        }
    }

    // === Reads ===

    /// Borrow the store for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&MdibStore) -> R) -> R {
        f(&self.store.read())
    }

    pub fn snapshot(&self) -> MdibSnapshot {
        self.store.read().snapshot()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(self.store.read().to_json()?)
    }

    pub fn version_group(&self) -> MdibVersionGroup {
        self.store.read().version_group()
    }

    pub fn mdib_version(&self) -> u64 {
        self.store.read().mdib_version()
    }

    /// Start a new sequence once no transaction is open.
    pub fn new_sequence(&self) -> MdibVersionGroup {
        let _guard = self.transaction_lock.lock();
        let mut store = self.store.write();
        store.new_sequence();
        store.version_group()
    }

    // === Notification ===

    /// Receive every non-empty committed result, in mdib version order.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TransactionResult>> {
        self.notifier.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.notifier.receiver_count()
    }

    pub fn register_observer(&self, observer: Arc<dyn TransactionObserver>) -> ObserverId {
        self.notifier.register(observer)
    }

    pub fn unregister_observer(&self, id: ObserverId) -> bool {
        self.notifier.unregister(id)
    }
}

impl Default for Mdib {
    fn default() -> Self {
        Self::new(MdibConfig::default())
    }
}

impl std::fmt::Debug for Mdib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mdib")
            .field("version_group", &self.version_group())
            .field("notifier", &self.notifier)
            .finish()
    }
}
