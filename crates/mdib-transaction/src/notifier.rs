//! Fan-out of committed transaction results.

use crate::result::TransactionResult;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Synchronous consumer of committed transactions.
///
/// Observers run on the committing thread, after the store is updated and
/// before the next transaction can start. They must not open a transaction
/// on the same MDIB.
pub trait TransactionObserver: Send + Sync {
    fn on_transaction(&self, result: &TransactionResult);
}

impl<F> TransactionObserver for F
where
    F: Fn(&TransactionResult) + Send + Sync,
{
    fn on_transaction(&self, result: &TransactionResult) {
        self(result)
    }
}

/// Handle returned by [`Mdib::register_observer`](crate::Mdib::register_observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub(crate) struct Notifier {
    sender: broadcast::Sender<Arc<TransactionResult>>,
    observers: RwLock<Vec<(ObserverId, Arc<dyn TransactionObserver>)>>,
    next_id: RwLock<u64>,
}

impl Notifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            observers: RwLock::new(Vec::new()),
            next_id: RwLock::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<TransactionResult>> {
        self.sender.subscribe()
    }

    pub(crate) fn register(&self, observer: Arc<dyn TransactionObserver>) -> ObserverId {
        let id = {
            let mut next = self.next_id.write();
            *next += 1;
            ObserverId(*next)
        };
        self.observers.write().push((id, observer));
        id
    }

    pub(crate) fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    pub(crate) fn publish(&self, result: Arc<TransactionResult>) {
        let observers: Vec<Arc<dyn TransactionObserver>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_transaction(&result);
        }
        // No receivers is fine; results are only buffered for live subscribers.
        let receivers = self.sender.send(result).unwrap_or(0);
        trace!(receivers, "published transaction result");
    }

    pub(crate) fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("receivers", &self.sender.receiver_count())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}
