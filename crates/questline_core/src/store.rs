//! The store boundary and the in-memory reference store.
//!
//! The engine mutates records exclusively through [`RecordStore::apply`];
//! reads return owned snapshots so no lock is held by consumers. The
//! in-memory store distributes applied commands to subscribers in commit
//! order, which is what drives re-rendering in a UI integration.

use crate::command::Command;
use crate::record::ResourceRecord;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

/// The store boundary consumed by the engine.
///
/// Reads are snapshot-style: a record is immutable once returned. Writes
/// go through `apply`, executed synchronously, so a commit is fully
/// visible to the next read.
pub trait RecordStore<T: Clone>: Send + Sync {
    /// Applies a command, mutating the targeted record.
    fn apply(&self, command: Command<T>);

    /// Returns the record for a key, or the canonical default if the key
    /// has never been written.
    fn record(&self, key: &str) -> ResourceRecord<T>;

    /// Returns the current data for a key, if any.
    fn data(&self, key: &str) -> Option<T> {
        self.record(key).data
    }
}

/// A change notification emitted after a command is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent<T> {
    /// The key whose record changed.
    pub key: String,
    /// The record as of this commit.
    pub record: ResourceRecord<T>,
}

/// An in-memory record store with subscriber notification.
///
/// Records are created lazily on first write and persist until
/// [`MemoryStore::reset`]; there is no per-key removal.
pub struct MemoryStore<T> {
    records: RwLock<HashMap<String, ResourceRecord<T>>>,
    subscribers: RwLock<Vec<Sender<StoreEvent<T>>>>,
}

impl<T> MemoryStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to applied commands.
    ///
    /// Returns a receiver that sees every subsequent commit, in commit
    /// order. Dropped receivers are pruned on the next notification.
    pub fn subscribe(&self) -> Receiver<StoreEvent<T>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns all keys with a record.
    pub fn keys(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no record exists.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Drops every record. The only way records are ever destroyed.
    pub fn reset(&self) {
        self.records.write().clear();
    }
}

impl<T: Clone> MemoryStore<T> {
    fn notify(&self, event: StoreEvent<T>) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> RecordStore<T> for MemoryStore<T> {
    fn apply(&self, command: Command<T>) {
        let event = {
            let mut records = self.records.write();
            let key = command.key().to_string();
            let record = records.entry(key.clone()).or_default();
            match command {
                Command::Start { .. } => record.begin(),
                Command::Resolve { settlement, .. } => record.settle(settlement),
            }
            StoreEvent {
                key,
                record: record.clone(),
            }
        };
        self.notify(event);
    }

    fn record(&self, key: &str) -> ResourceRecord<T> {
        self.records.read().get(key).cloned().unwrap_or_default()
    }
}
