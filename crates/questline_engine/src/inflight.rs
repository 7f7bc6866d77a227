//! In-flight quest registry.
//!
//! Guarantees at most one outstanding fetch per key and exposes the
//! pending settlement to synchronous consumers. A server-render pass
//! uses [`InflightRegistry::peek`] to decide whether it must await a
//! key before producing final output.
//!
//! Each engine instance owns its registry; there is no process-global
//! state, so independent engines (one per test, say) cannot observe
//! each other's quests.

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;

/// A shared handle to one quest's eventual settlement.
///
/// Cloning is cheap; every clone resolves when the underlying quest
/// settles, successfully or not. The settlement outcome itself is read
/// from the store, not from the handle.
pub type QuestHandle = Shared<BoxFuture<'static, ()>>;

/// Registry of unsettled quests, keyed by resource key.
///
/// The entry for a key lives exactly as long as one fetch: the driver
/// removes it unconditionally on settlement, so a future attempt is
/// never blocked by a stale entry.
#[derive(Default)]
pub struct InflightRegistry {
    entries: Mutex<HashMap<String, QuestHandle>>,
}

impl InflightRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the handle for a key.
    ///
    /// The caller must have checked [`peek`](Self::peek) first; an
    /// existing unsettled entry means "already in flight — skip".
    pub fn register(&self, key: &str, handle: QuestHandle) {
        self.entries.lock().insert(key.to_string(), handle);
    }

    /// Non-blocking lookup of the pending handle for a key.
    pub fn peek(&self, key: &str) -> Option<QuestHandle> {
        self.entries.lock().get(key).cloned()
    }

    /// Removes the entry for a key. Called on settlement regardless of
    /// outcome.
    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Returns the number of unsettled quests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no quest is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
