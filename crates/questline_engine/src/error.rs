//! Error types for the quest engine.
//!
//! These are configuration-time and call-time contract errors returned
//! to the caller. Data-plane failures (a rejecting fetch) never surface
//! here; they are captured into the resource record as
//! [`QuestFailure`](questline_core::QuestFailure).

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Contract errors surfaced by the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A resolver was built without a key.
    #[error("resolver key must not be empty")]
    MissingKey,

    /// A resolver was built without the mandatory get capability.
    #[error("resolver {key:?} has no get capability")]
    MissingGet {
        /// Resolver key.
        key: String,
    },

    /// A capability name was declared twice, or shadows `get`.
    #[error("resolver {key:?} declares capability {name:?} more than once")]
    DuplicateCapability {
        /// Resolver key.
        key: String,
        /// Offending capability name.
        name: String,
    },

    /// A capability was requested that the resolver does not declare.
    #[error("resolver {key:?} has no capability named {name:?}")]
    UnknownCapability {
        /// Resolver key.
        key: String,
        /// Requested capability name.
        name: String,
    },
}

impl EngineError {
    /// Returns true for configuration-time violations that must abort
    /// setup before any quest starts.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            EngineError::MissingKey
                | EngineError::MissingGet { .. }
                | EngineError::DuplicateCapability { .. }
        )
    }
}
