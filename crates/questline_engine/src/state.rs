//! Quest engine state machine.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::inflight::{InflightRegistry, QuestHandle};
use crate::resolver::{DataFuture, Fetch, Resolver, Step, ThunkContext};
use crate::sequence;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use questline_core::{Command, QuestFailure, RecordStore, ResourceRecord, Settlement};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// The observable lifecycle state of a key, derived from its record.
///
/// The cycle is `Idle → Loading → Settled-*`, with settled states
/// feeding back into `Loading` on the next fetch request; there is no
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestState {
    /// No fetch has ever run for the key.
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The last settlement was a success.
    SettledSuccess,
    /// The last settlement was a failure.
    SettledError,
}

impl QuestState {
    /// Derives the state from a record.
    pub fn of<T>(record: &ResourceRecord<T>) -> Self {
        if record.loading {
            QuestState::Loading
        } else if record.error.is_some() {
            QuestState::SettledError
        } else if record.completed {
            QuestState::SettledSuccess
        } else {
            QuestState::Idle
        }
    }

    /// Returns true if a fetch is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, QuestState::Loading)
    }

    /// Returns true if at least one settlement has happened.
    pub fn is_settled(&self) -> bool {
        matches!(self, QuestState::SettledSuccess | QuestState::SettledError)
    }
}

/// Monotonic counters describing engine activity.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Quests started (fetcher actually invoked).
    pub quests_started: u64,
    /// Start requests that reused an in-flight quest.
    pub dedup_hits: u64,
    /// Successful settlements committed.
    pub successes: u64,
    /// Failure settlements committed.
    pub failures: u64,
    /// Optimistic sequences rolled back.
    pub rollbacks: u64,
    /// Settlements dropped because their generation was no longer
    /// current.
    pub stale_dropped: u64,
}

/// Cloneable bundle of the engine internals a driver task needs.
pub(crate) struct DriverCtx<T, S> {
    pub(crate) store: Arc<S>,
    pub(crate) inflight: Arc<InflightRegistry>,
    generations: Arc<RwLock<HashMap<String, u64>>>,
    stats: Arc<RwLock<EngineStats>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> Clone for DriverCtx<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            inflight: Arc::clone(&self.inflight),
            generations: Arc::clone(&self.generations),
            stats: Arc::clone(&self.stats),
            _marker: PhantomData,
        }
    }
}

impl<T, S> DriverCtx<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T> + 'static,
{
    /// Commits a settlement iff `generation` is still current for the
    /// key. The generation check and the store write happen under the
    /// generation lock, so a concurrent bump-and-commit cannot
    /// interleave between them.
    pub(crate) fn commit(&self, key: &str, generation: u64, settlement: Settlement<T>) -> bool {
        let generations = self.generations.read();
        let current = generations.get(key).copied().unwrap_or(0);
        if current != generation {
            drop(generations);
            self.stats.write().stale_dropped += 1;
            debug!(key = %key, generation, current, "dropping stale settlement");
            return false;
        }

        {
            let mut stats = self.stats.write();
            match &settlement {
                Settlement::Success(_) => stats.successes += 1,
                Settlement::Failure(_) => stats.failures += 1,
                Settlement::Rollback { .. } => stats.rollbacks += 1,
            }
        }

        self.store.apply(Command::Resolve {
            key: key.to_string(),
            settlement,
        });
        true
    }

    /// Drives a single-future fetch to settlement.
    pub(crate) async fn drive_single(self, key: String, generation: u64, fut: DataFuture<T>) {
        let settlement = match fut.await {
            Ok(value) => Settlement::Success(value),
            Err(reason) => Settlement::Failure(QuestFailure::fetch(reason)),
        };
        self.commit(&key, generation, settlement);
        self.inflight.remove(&key);
    }
}

/// The quest engine manages fetch lifecycles for keyed resources.
///
/// All shared state (records, in-flight registry, generations) is owned
/// by the instance; independent engines never observe each other.
pub struct QuestEngine<T, S> {
    config: EngineConfig,
    store: Arc<S>,
    inflight: Arc<InflightRegistry>,
    generations: Arc<RwLock<HashMap<String, u64>>>,
    stats: Arc<RwLock<EngineStats>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> QuestEngine<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T> + 'static,
{
    /// Creates an engine owning the given store.
    pub fn new(config: EngineConfig, store: S) -> Self {
        Self::with_store(config, Arc::new(store))
    }

    /// Creates an engine over a shared store.
    pub fn with_store(config: EngineConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            inflight: Arc::new(InflightRegistry::new()),
            generations: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(EngineStats::default())),
            _marker: PhantomData,
        }
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the record for a key (the canonical default if the key
    /// has never been fetched).
    pub fn record(&self, key: &str) -> ResourceRecord<T> {
        self.store.record(key)
    }

    /// Returns the derived lifecycle state for a key.
    pub fn quest_state(&self, key: &str) -> QuestState {
        QuestState::of(&self.record(key))
    }

    /// Non-blocking lookup of the pending settlement for a key.
    ///
    /// A server-render pass awaits the returned handle before producing
    /// final output.
    pub fn pending(&self, key: &str) -> Option<QuestHandle> {
        self.inflight.peek(key)
    }

    /// Current engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Starts a quest for a key.
    ///
    /// If a quest for the key is already in flight, `fetcher` is NOT
    /// invoked and the existing handle is returned; every caller
    /// observes the same settlement. Otherwise `loading` is set, the
    /// fetcher runs, and a driver task is spawned to settle the result.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_quest<F>(&self, key: &str, fetcher: F) -> QuestHandle
    where
        F: FnOnce() -> Fetch<T>,
    {
        if let Some(handle) = self.inflight.peek(key) {
            self.stats.write().dedup_hits += 1;
            trace!(engine = %self.config.name, key = %key, "quest already in flight, reusing handle");
            return handle;
        }

        let generation = self.bump_generation(key);
        self.stats.write().quests_started += 1;
        self.store.apply(Command::Start {
            key: key.to_string(),
        });
        debug!(engine = %self.config.name, key = %key, generation, "quest started");

        let ctx = self.driver_ctx();
        let driver: BoxFuture<'static, ()> = match fetcher() {
            Fetch::Single(fut) => ctx.drive_single(key.to_string(), generation, fut).boxed(),
            Fetch::Sequence(steps) => {
                sequence::drive(ctx, key.to_string(), generation, steps).boxed()
            }
            Fetch::Thunk(thunk) => {
                // The thunk runs here, in the caller's synchronous turn:
                // its data read and any commit it makes cannot interleave
                // with another committal for the key.
                match thunk(self.thunk_context(key, generation)) {
                    Step::Single(fut) => {
                        ctx.drive_single(key.to_string(), generation, fut).boxed()
                    }
                    Step::Sequence(steps) => {
                        sequence::drive(ctx, key.to_string(), generation, steps).boxed()
                    }
                }
            }
        };

        let handle: QuestHandle = driver.shared();
        self.inflight.register(key, handle.clone());
        tokio::spawn(handle.clone());
        handle
    }

    /// Starts a quest through a resolver's get capability.
    pub fn start(&self, resolver: &Resolver<T>, query: Value) -> QuestHandle {
        let get = Arc::clone(resolver.get_capability());
        self.start_quest(resolver.key(), move || get(query))
    }

    /// Starts a quest through a named resolver capability.
    pub fn call(&self, resolver: &Resolver<T>, name: &str, query: Value) -> EngineResult<QuestHandle> {
        let capability = Arc::clone(resolver.capability(name)?);
        Ok(self.start_quest(resolver.key(), move || capability(query)))
    }

    /// Commits `value` directly as the resolved data, with no fetcher.
    ///
    /// Bumps the key's generation, so a settlement from a still
    /// in-flight fetch is dropped as stale rather than overwriting this
    /// value.
    pub fn resolve_quest(&self, key: &str, value: T) {
        let generation = {
            let mut generations = self.generations.write();
            let entry = generations.entry(key.to_string()).or_insert(0);
            *entry += 1;
            self.stats.write().successes += 1;
            self.store.apply(Command::Resolve {
                key: key.to_string(),
                settlement: Settlement::Success(value),
            });
            *entry
        };
        debug!(engine = %self.config.name, key = %key, generation, "quest resolved directly");
    }

    /// Invalidates all outstanding settlements for a key by bumping its
    /// generation. The record itself is untouched; cheap cancellation
    /// without task cancellation.
    pub fn invalidate(&self, key: &str) {
        let generation = self.bump_generation(key);
        debug!(engine = %self.config.name, key = %key, generation, "key invalidated");
    }

    fn bump_generation(&self, key: &str) -> u64 {
        let mut generations = self.generations.write();
        let entry = generations.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    fn driver_ctx(&self) -> DriverCtx<T, S> {
        DriverCtx {
            store: Arc::clone(&self.store),
            inflight: Arc::clone(&self.inflight),
            generations: Arc::clone(&self.generations),
            stats: Arc::clone(&self.stats),
            _marker: PhantomData,
        }
    }

    fn thunk_context(&self, key: &str, generation: u64) -> ThunkContext<T> {
        let read = {
            let store = Arc::clone(&self.store);
            let key = key.to_string();
            Arc::new(move || store.data(&key)) as Arc<dyn Fn() -> Option<T> + Send + Sync>
        };
        let commit = {
            let ctx = self.driver_ctx();
            let key = key.to_string();
            Arc::new(move |value: T| {
                ctx.commit(&key, generation, Settlement::Success(value));
            }) as Arc<dyn Fn(T) + Send + Sync>
        };
        ThunkContext::new(key.to_string(), read, commit)
    }
}
