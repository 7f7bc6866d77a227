//! Store write protocol: commands issued by the engine.

use crate::record::QuestFailure;

/// How a quest settled for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement<T> {
    /// The fetch resolved; the value becomes the record's data.
    Success(T),
    /// The fetch rejected; data and the completed flag are untouched.
    Failure(QuestFailure),
    /// An optimistic sequence rejected; data is restored to the
    /// pre-sequence snapshot.
    Rollback {
        /// Snapshot taken before the first step was applied.
        data: Option<T>,
        /// The rejection that triggered the rollback.
        failure: QuestFailure,
    },
}

/// A write command executed synchronously by the store.
///
/// Commands are the only way records change; the store applies one under
/// its lock and notifies subscribers afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<T> {
    /// A fetch began for the key.
    Start {
        /// Resource key.
        key: String,
    },
    /// A quest settled for the key.
    Resolve {
        /// Resource key.
        key: String,
        /// The settlement to apply.
        settlement: Settlement<T>,
    },
}

impl<T> Command<T> {
    /// Returns the key this command targets.
    pub fn key(&self) -> &str {
        match self {
            Command::Start { key } | Command::Resolve { key, .. } => key,
        }
    }
}
