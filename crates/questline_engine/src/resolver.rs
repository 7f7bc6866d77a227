//! Resolvers: declarative fetch/mutate capability tables.
//!
//! A resolver names one resource (its key) and supplies the mandatory
//! `get` capability plus zero or more named mutations. The table is
//! fixed at build time; missing pieces are contract violations that
//! abort setup, not runtime errors.

use crate::error::{EngineError, EngineResult};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A future producing resource data or a rejection reason.
pub type DataFuture<T> = BoxFuture<'static, Result<T, String>>;

/// A capability maps a query to a fetch description.
///
/// Capabilities are opaque to the engine: whatever transport they use,
/// the engine only sees the returned futures.
pub type Capability<T> = Arc<dyn Fn(Value) -> Fetch<T> + Send + Sync>;

/// A thunk body: given the quest context, produce the step to run.
pub type ThunkFn<T> = Box<dyn FnOnce(ThunkContext<T>) -> Step<T> + Send>;

/// What a capability asks the engine to run.
pub enum Fetch<T> {
    /// One future; its settlement settles the quest.
    Single(DataFuture<T>),
    /// An ordered optimistic sequence, applied in declared order and
    /// rolled back as a unit on the first rejection.
    Sequence(Vec<DataFuture<T>>),
    /// Read-modify-write: the thunk runs synchronously with access to
    /// the latest committed data and returns the step to drive.
    Thunk(ThunkFn<T>),
}

/// The step a thunk resolves to. Thunks do not nest.
pub enum Step<T> {
    /// One future.
    Single(DataFuture<T>),
    /// An ordered optimistic sequence.
    Sequence(Vec<DataFuture<T>>),
}

/// Capabilities handed to a thunk for atomic read-modify-write logic.
///
/// `current` and `commit` must both be called within the thunk's own
/// synchronous turn: the engine guarantees no other commit for this key
/// interleaves inside a single synchronous call stack, and that
/// guarantee does not survive an await point.
pub struct ThunkContext<T> {
    key: String,
    read: Arc<dyn Fn() -> Option<T> + Send + Sync>,
    commit: Arc<dyn Fn(T) + Send + Sync>,
}

impl<T> ThunkContext<T> {
    pub(crate) fn new(
        key: String,
        read: Arc<dyn Fn() -> Option<T> + Send + Sync>,
        commit: Arc<dyn Fn(T) + Send + Sync>,
    ) -> Self {
        Self { key, read, commit }
    }

    /// The key this quest is bound to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the latest committed data for the key.
    pub fn current(&self) -> Option<T> {
        (self.read)()
    }

    /// Commits `value` immediately as a successful settlement.
    pub fn commit(&self, value: T) {
        (self.commit)(value);
    }
}

/// A declarative description of how to fetch and mutate one resource.
pub struct Resolver<T> {
    key: String,
    get: Capability<T>,
    mutations: HashMap<String, Capability<T>>,
}

impl<T> Resolver<T> {
    /// Starts building a resolver for `key`.
    pub fn builder(key: impl Into<String>) -> ResolverBuilder<T> {
        ResolverBuilder {
            key: key.into(),
            get: None,
            mutations: Vec::new(),
        }
    }

    /// The resource key this resolver serves.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The mandatory fetch capability.
    pub fn get_capability(&self) -> &Capability<T> {
        &self.get
    }

    /// Looks up a capability by name. `"get"` resolves to the fetch
    /// capability; anything else must be a declared mutation.
    pub fn capability(&self, name: &str) -> EngineResult<&Capability<T>> {
        if name == "get" {
            return Ok(&self.get);
        }
        self.mutations
            .get(name)
            .ok_or_else(|| EngineError::UnknownCapability {
                key: self.key.clone(),
                name: name.to_string(),
            })
    }

    /// Every capability name this resolver declares, `get` first.
    pub fn capability_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.mutations.len() + 1);
        names.push("get".to_string());
        let mut mutations: Vec<&String> = self.mutations.keys().collect();
        mutations.sort();
        names.extend(mutations.into_iter().cloned());
        names
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            get: Arc::clone(&self.get),
            mutations: self.mutations.clone(),
        }
    }
}

/// Builder for [`Resolver`]; validation happens at [`build`](Self::build).
pub struct ResolverBuilder<T> {
    key: String,
    get: Option<Capability<T>>,
    mutations: Vec<(String, Capability<T>)>,
}

impl<T> ResolverBuilder<T> {
    /// Sets the mandatory fetch capability.
    pub fn get(mut self, capability: impl Fn(Value) -> Fetch<T> + Send + Sync + 'static) -> Self {
        self.get = Some(Arc::new(capability));
        self
    }

    /// Declares a named mutation capability.
    pub fn mutation(
        mut self,
        name: impl Into<String>,
        capability: impl Fn(Value) -> Fetch<T> + Send + Sync + 'static,
    ) -> Self {
        self.mutations.push((name.into(), Arc::new(capability)));
        self
    }

    /// Validates the declaration and builds the resolver.
    ///
    /// Fails fast with a contract violation if the key is empty, the
    /// get capability is missing, or a mutation name is duplicated or
    /// shadows `get`.
    pub fn build(self) -> EngineResult<Resolver<T>> {
        if self.key.is_empty() {
            return Err(EngineError::MissingKey);
        }
        let get = self.get.ok_or_else(|| EngineError::MissingGet {
            key: self.key.clone(),
        })?;

        let mut mutations = HashMap::with_capacity(self.mutations.len());
        for (name, capability) in self.mutations {
            if name == "get" || mutations.insert(name.clone(), capability).is_some() {
                return Err(EngineError::DuplicateCapability {
                    key: self.key,
                    name,
                });
            }
        }

        Ok(Resolver {
            key: self.key,
            get,
            mutations,
        })
    }
}
