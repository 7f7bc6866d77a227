//! Lifecycle binder: wires mount/update events to quest decisions.
//!
//! The binder is the consumer-facing edge of the engine. It never adds
//! semantics of its own: every option only decides when and whether the
//! engine's `start`/`call` operations run, and how the record is dressed
//! up before being handed to a consumer.

use crate::config::BindConfig;
use crate::error::EngineResult;
use crate::inflight::QuestHandle;
use crate::resolver::Resolver;
use crate::state::QuestEngine;
use questline_core::{RecordStore, ResourceRecord};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Merges the caller query over a base object, key by key at the top
/// level. When either side is not an object the overlay wins wholesale.
pub fn merge_queries(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => overlay.clone(),
    }
}

/// What a mounted consumer sees.
#[derive(Debug, Clone)]
pub struct BoundProps<T> {
    /// The record for the binding's key, with `default_data` and
    /// `map_data` applied.
    pub record: ResourceRecord<T>,
    /// Every capability name callable through the binding, `get` first.
    pub capabilities: Vec<String>,
    /// False while `wait_for_data` is set and no data is present.
    pub ready: bool,
}

/// Binds one resolver to an engine and drives fetch decisions from
/// lifecycle events.
pub struct Binding<T, S> {
    engine: Arc<QuestEngine<T, S>>,
    resolver: Resolver<T>,
    config: BindConfig<T>,
}

impl<T, S> Binding<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: RecordStore<T> + 'static,
{
    /// Creates a binding of `resolver` to `engine`.
    pub fn new(
        engine: Arc<QuestEngine<T, S>>,
        resolver: Resolver<T>,
        config: BindConfig<T>,
    ) -> Self {
        Self {
            engine,
            resolver,
            config,
        }
    }

    /// The key this binding serves.
    pub fn key(&self) -> &str {
        self.resolver.key()
    }

    /// Initial-mount decision: fetch eagerly unless deferred.
    ///
    /// Returns `None` when the fetch was skipped (server pass with
    /// `fetch_on_server` disabled, or `fetch_once` considers the data
    /// fresh).
    pub fn mount(&self, query: Value) -> Option<QuestHandle>
    where
        T: Serialize,
    {
        if self.engine.config().server && !self.config.fetch_on_server {
            trace!(key = %self.key(), "mount fetch skipped in server pass");
            return None;
        }
        let record = self.engine.record(self.key());
        if self.config.fetch_once.skips(&record) {
            trace!(key = %self.key(), "mount fetch skipped, data considered fresh");
            return None;
        }
        Some(self.update(query))
    }

    /// Prop-change decision: refetch iff the `refetch_when` predicate
    /// accepts the query transition.
    pub fn on_update(&self, prev: &Value, next: &Value) -> Option<QuestHandle>
    where
        T: Serialize,
    {
        match self.config.refetch_when.as_ref() {
            Some(predicate) if predicate(prev, next) => Some(self.update(next.clone())),
            _ => None,
        }
    }

    /// Starts a quest through the resolver's get capability.
    pub fn update(&self, query: Value) -> QuestHandle
    where
        T: Serialize,
    {
        let merged = self.merged_query(query);
        self.engine.start(&self.resolver, merged)
    }

    /// Starts a quest through a named mutation capability.
    pub fn call(&self, name: &str, query: Value) -> EngineResult<QuestHandle>
    where
        T: Serialize,
    {
        let merged = self.merged_query(query);
        self.engine.call(&self.resolver, name, merged)
    }

    /// Current props for the consumer.
    ///
    /// `ready` keys off the real record: substituted `default_data`
    /// does not satisfy `wait_for_data`.
    pub fn props(&self) -> BoundProps<T> {
        let mut record = self.engine.record(self.key());
        let ready = !self.config.wait_for_data || record.has_data();
        if record.data.is_none() {
            record.data = self.config.default_data.clone();
        }
        if let Some(map) = &self.config.map_data {
            record.data = record.data.take().map(|data| map(data));
        }
        BoundProps {
            capabilities: self.resolver.capability_names(),
            ready,
            record,
        }
    }

    /// The caller query merged over the record's current data.
    fn merged_query(&self, query: Value) -> Value
    where
        T: Serialize,
    {
        let base = self
            .engine
            .record(self.key())
            .data
            .and_then(|data| serde_json::to_value(data).ok())
            .unwrap_or(Value::Null);
        merge_queries(&base, &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, FetchOnce};
    use crate::resolver::Fetch;
    use futures::FutureExt;
    use parking_lot::Mutex;
    use questline_core::MemoryStore;
    use serde_json::json;

    fn engine(config: EngineConfig) -> Arc<QuestEngine<u32, MemoryStore<u32>>> {
        Arc::new(QuestEngine::new(config, MemoryStore::new()))
    }

    fn fixed_resolver() -> Resolver<u32> {
        Resolver::builder("posts")
            .get(|_| Fetch::Single(async { Ok(7) }.boxed()))
            .build()
            .unwrap()
    }

    #[test]
    fn merge_queries_overlays_objects() {
        let base = json!({ "page": 1, "filter": "old" });
        let overlay = json!({ "filter": "new" });
        assert_eq!(
            merge_queries(&base, &overlay),
            json!({ "page": 1, "filter": "new" })
        );

        // Non-object operands: the overlay wins wholesale.
        assert_eq!(merge_queries(&Value::Null, &overlay), overlay);
        assert_eq!(merge_queries(&base, &json!(3)), json!(3));
    }

    #[tokio::test]
    async fn mount_fetches_eagerly_by_default() {
        let binding = Binding::new(
            engine(EngineConfig::default()),
            fixed_resolver(),
            BindConfig::new(),
        );

        let handle = binding.mount(json!({})).expect("eager fetch");
        handle.await;
        assert_eq!(binding.props().record.data, Some(7));
    }

    #[tokio::test]
    async fn mount_respects_fetch_once() {
        let engine = engine(EngineConfig::default());
        engine.resolve_quest("posts", 1);

        let binding = Binding::new(
            Arc::clone(&engine),
            fixed_resolver(),
            BindConfig::new().with_fetch_once(FetchOnce::Once),
        );

        assert!(binding.mount(json!({})).is_none());
        assert_eq!(engine.stats().quests_started, 0);
    }

    #[tokio::test]
    async fn mount_respects_server_pass() {
        let binding = Binding::new(
            engine(EngineConfig::default().with_server(true)),
            fixed_resolver(),
            BindConfig::new().with_fetch_on_server(false),
        );

        assert!(binding.mount(json!({})).is_none());
    }

    #[tokio::test]
    async fn on_update_refetches_when_predicate_accepts() {
        let binding = Binding::new(
            engine(EngineConfig::default()),
            fixed_resolver(),
            BindConfig::new().with_refetch_when(|prev, next| prev["page"] != next["page"]),
        );

        assert!(binding
            .on_update(&json!({ "page": 1 }), &json!({ "page": 1 }))
            .is_none());

        let handle = binding
            .on_update(&json!({ "page": 1 }), &json!({ "page": 2 }))
            .expect("page changed");
        handle.await;
        assert_eq!(binding.props().record.data, Some(7));
    }

    #[tokio::test]
    async fn props_apply_default_and_mapping() {
        let binding = Binding::new(
            engine(EngineConfig::default()),
            fixed_resolver(),
            BindConfig::new()
                .with_default_data(100)
                .with_map_data(|n| n * 2)
                .with_wait_for_data(true),
        );

        // No real data yet: the default shows through the mapping, but
        // the binding is not ready. `wait_for_data` keys off the real
        // record, not the substituted default.
        let props = binding.props();
        assert_eq!(props.record.data, Some(200));
        assert!(!props.ready);
        assert_eq!(props.capabilities, vec!["get"]);

        binding.update(json!({})).await;
        let props = binding.props();
        assert_eq!(props.record.data, Some(14));
        assert!(props.ready);
    }

    #[tokio::test]
    async fn queries_merge_over_current_data() {
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let seen_by_get = Arc::clone(&seen);
        let resolver = Resolver::<serde_json::Map<String, Value>>::builder("posts")
            .get(move |query| {
                seen_by_get.lock().push(query);
                Fetch::Single(
                    async {
                        let mut data = serde_json::Map::new();
                        data.insert("page".into(), json!(1));
                        Ok(data)
                    }
                    .boxed(),
                )
            })
            .build()
            .unwrap();

        let engine = Arc::new(QuestEngine::new(
            EngineConfig::default(),
            MemoryStore::<serde_json::Map<String, Value>>::new(),
        ));
        let binding = Binding::new(engine, resolver, BindConfig::new());

        binding.update(json!({ "filter": "a" })).await;
        binding.update(json!({ "filter": "b" })).await;

        let queries = seen.lock().clone();
        // First call had no data to merge over; the second merged the
        // caller query over the committed record data.
        assert_eq!(queries[0], json!({ "filter": "a" }));
        assert_eq!(queries[1], json!({ "page": 1, "filter": "b" }));
    }
}
