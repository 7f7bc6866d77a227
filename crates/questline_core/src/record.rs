//! Resource records and the per-key transition function.

use crate::command::Settlement;
use thiserror::Error;

/// A data-plane failure captured in a resource record.
///
/// Failures are stored, never returned to the caller; consumers observe
/// them by reading the record's `error` field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestFailure {
    /// The resolver's fetch future rejected.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A step of an optimistic update sequence rejected.
    #[error("optimistic update step {step} failed: {reason}")]
    Sequence {
        /// Zero-based position of the rejected step in the sequence.
        step: usize,
        /// Rejection reason reported by the step.
        reason: String,
    },
}

impl QuestFailure {
    /// Creates a fetch failure.
    pub fn fetch(reason: impl Into<String>) -> Self {
        Self::Fetch(reason.into())
    }

    /// Creates a sequence-step failure.
    pub fn sequence(step: usize, reason: impl Into<String>) -> Self {
        Self::Sequence {
            step,
            reason: reason.into(),
        }
    }

    /// Returns the underlying rejection reason.
    pub fn reason(&self) -> &str {
        match self {
            QuestFailure::Fetch(reason) => reason,
            QuestFailure::Sequence { reason, .. } => reason,
        }
    }
}

/// The persisted per-key state of one resource.
///
/// One record exists per key; a key that has never been written reads as
/// [`ResourceRecord::default`]. Records are mutated only through commands
/// applied by the store, never directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord<T> {
    /// A fetch is currently in flight.
    pub loading: bool,
    /// At least one fetch has ever settled successfully.
    pub completed: bool,
    /// Last data-plane failure, cleared on the next successful settlement.
    /// May coexist with `loading` while a newer attempt is in flight.
    pub error: Option<QuestFailure>,
    /// Last successfully resolved payload. `None` means no data yet.
    pub data: Option<T>,
}

impl<T> Default for ResourceRecord<T> {
    fn default() -> Self {
        Self {
            loading: false,
            completed: false,
            error: None,
            data: None,
        }
    }
}

impl<T> ResourceRecord<T> {
    /// Returns true if a payload is present.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Marks a fetch as started. The stale error from a previous attempt
    /// is left in place until the new attempt settles.
    pub fn begin(&mut self) {
        self.loading = true;
    }

    /// Applies a settlement to the record.
    pub fn settle(&mut self, settlement: Settlement<T>) {
        match settlement {
            Settlement::Success(value) => {
                self.data = Some(value);
                self.completed = true;
                self.loading = false;
                self.error = None;
            }
            Settlement::Failure(failure) => {
                self.error = Some(failure);
                self.loading = false;
            }
            Settlement::Rollback { data, failure } => {
                self.data = data;
                self.error = Some(failure);
                self.loading = false;
            }
        }
    }
}
