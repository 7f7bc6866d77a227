//! # Questline Engine
//!
//! Quest state machine and engine for Questline.
//!
//! This crate provides:
//! - Quest state machine (idle → loading → settled, cycling)
//! - In-flight registry for fetch deduplication and server-render waits
//! - Optimistic update sequencer with rollback
//! - Resolver capability tables built at configuration time
//! - Lifecycle binder for mount/update-driven fetch decisions
//!
//! ## Architecture
//!
//! A **quest** is one managed fetch/mutate lifecycle bound to a string
//! key. The engine issues `Start`/`Resolve` commands to a
//! [`RecordStore`](questline_core::RecordStore); the store applies them
//! synchronously and notifies subscribers, which is what drives UI
//! updates. Fetch work itself is opaque: resolver capabilities return
//! futures, the engine only manages their lifecycle.
//!
//! ## Key Invariants
//!
//! - At most one fetch is in flight per key; concurrent starts share
//!   one settlement
//! - Records are mutated only through store commands, never directly
//! - Optimistic sequences apply strictly in declared order and roll
//!   back atomically on the first rejection
//! - A settlement whose generation is no longer current is dropped
//! - Data-plane failures are captured into records, never re-thrown

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod binder;
mod config;
mod error;
mod inflight;
mod resolver;
mod sequence;
mod state;

pub use binder::{merge_queries, Binding, BoundProps};
pub use config::{
    BindConfig, EngineConfig, FetchOnce, FetchPredicate, MapData, RefetchPredicate,
};
pub use error::{EngineError, EngineResult};
pub use inflight::{InflightRegistry, QuestHandle};
pub use resolver::{
    Capability, DataFuture, Fetch, Resolver, ResolverBuilder, Step, ThunkContext, ThunkFn,
};
pub use state::{EngineStats, QuestEngine, QuestState};
