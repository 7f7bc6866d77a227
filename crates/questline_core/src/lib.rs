//! # Questline Core
//!
//! Resource records and the store protocol for Questline.
//!
//! This crate provides:
//! - `ResourceRecord` and the per-key transition function
//! - `Command`/`Settlement` for the store write protocol
//! - `QuestFailure` for failures captured in records
//! - The `RecordStore` boundary trait
//! - `MemoryStore`, an in-memory reference store with subscriber
//!   notification
//!
//! This is a pure data crate with no I/O and no async machinery.
//!
//! ## Key Invariants
//!
//! - A record is mutated only by applying commands; no partial writes
//!   are observable
//! - `completed` is a historical flag (has data ever arrived); presence
//!   of data is tested via `data.is_some()`
//! - A never-written key reads as the canonical default record
//! - Store subscribers observe commands in commit order

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod record;
mod store;

pub use command::{Command, Settlement};
pub use record::{QuestFailure, ResourceRecord};
pub use store::{MemoryStore, RecordStore, StoreEvent};
