//! Configuration for the engine and for individual bindings.

use questline_core::ResourceRecord;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Configuration for a quest engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Instance name, used in log events.
    pub name: String,
    /// Whether this engine runs inside a server-render pass. Bindings
    /// with `fetch_on_server` disabled skip their mount fetch here.
    pub server: bool,
}

impl EngineConfig {
    /// Creates a new engine configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: false,
        }
    }

    /// Marks the engine as running in a server-render pass.
    pub fn with_server(mut self, server: bool) -> Self {
        self.server = server;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("questline")
    }
}

/// Predicate over a record deciding whether the mount fetch is skipped.
pub type FetchPredicate<T> = Arc<dyn Fn(&ResourceRecord<T>) -> bool + Send + Sync>;

/// Predicate over (previous, next) queries deciding whether a prop
/// change triggers a refetch.
pub type RefetchPredicate = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Transformation applied to record data before it is exposed as props.
pub type MapData<T> = Arc<dyn Fn(T) -> T + Send + Sync>;

/// When a binding's mount fetch should be skipped.
#[derive(Clone)]
pub enum FetchOnce<T> {
    /// Fetch on every mount.
    Always,
    /// Skip the mount fetch once a fetch has ever completed.
    Once,
    /// Skip the mount fetch when the predicate holds for the record.
    When(FetchPredicate<T>),
}

impl<T> FetchOnce<T> {
    /// Returns true if the mount fetch should be skipped for `record`.
    pub fn skips(&self, record: &ResourceRecord<T>) -> bool {
        match self {
            FetchOnce::Always => false,
            FetchOnce::Once => record.completed,
            FetchOnce::When(predicate) => predicate(record),
        }
    }
}

impl<T> Default for FetchOnce<T> {
    fn default() -> Self {
        FetchOnce::Always
    }
}

impl<T> fmt::Debug for FetchOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOnce::Always => f.write_str("Always"),
            FetchOnce::Once => f.write_str("Once"),
            FetchOnce::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Configuration for one lifecycle binding.
///
/// Every option here governs only when and whether the binding calls
/// into the engine; none of them change engine semantics.
#[derive(Clone)]
pub struct BindConfig<T> {
    /// Whether the mount fetch runs during a server-render pass.
    pub fetch_on_server: bool,
    /// When the mount fetch is skipped entirely.
    pub fetch_once: FetchOnce<T>,
    /// Refetch decision on prop changes; `None` means never refetch.
    pub refetch_when: Option<RefetchPredicate>,
    /// Transformation applied to data before it is exposed as props.
    pub map_data: Option<MapData<T>>,
    /// Substitute data exposed while no real data has arrived.
    pub default_data: Option<T>,
    /// Whether props report not-ready until data is present.
    pub wait_for_data: bool,
}

impl<T> BindConfig<T> {
    /// Creates a binding configuration with defaults: fetch on server,
    /// fetch on every mount, never refetch, no mapping, no default data.
    pub fn new() -> Self {
        Self {
            fetch_on_server: true,
            fetch_once: FetchOnce::Always,
            refetch_when: None,
            map_data: None,
            default_data: None,
            wait_for_data: false,
        }
    }

    /// Sets whether the mount fetch runs during a server-render pass.
    pub fn with_fetch_on_server(mut self, fetch_on_server: bool) -> Self {
        self.fetch_on_server = fetch_on_server;
        self
    }

    /// Sets when the mount fetch is skipped.
    pub fn with_fetch_once(mut self, fetch_once: FetchOnce<T>) -> Self {
        self.fetch_once = fetch_once;
        self
    }

    /// Sets the refetch predicate for prop changes.
    pub fn with_refetch_when(
        mut self,
        predicate: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.refetch_when = Some(Arc::new(predicate));
        self
    }

    /// Sets the data transformation applied before exposing props.
    pub fn with_map_data(mut self, map: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.map_data = Some(Arc::new(map));
        self
    }

    /// Sets substitute data exposed while no real data has arrived.
    pub fn with_default_data(mut self, default: T) -> Self {
        self.default_data = Some(default);
        self
    }

    /// Sets whether props report not-ready until data is present.
    pub fn with_wait_for_data(mut self, wait: bool) -> Self {
        self.wait_for_data = wait;
        self
    }
}

impl<T> Default for BindConfig<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BindConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindConfig")
            .field("fetch_on_server", &self.fetch_on_server)
            .field("fetch_once", &self.fetch_once)
            .field("refetch_when", &self.refetch_when.is_some())
            .field("map_data", &self.map_data.is_some())
            .field("default_data", &self.default_data.is_some())
            .field("wait_for_data", &self.wait_for_data)
            .finish()
    }
}
