//! Prometheus registry shared by every stats stage in a process

use parking_lot::RwLock;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::sync::{Arc, OnceLock};

use super::{MetricsError, Result};

/// Prefix of every metric name
pub const METRIC_PREFIX: &str = "streamstats";

/// Process-wide registry, created on first use
pub static METRICS_REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();

/// Prometheus registry handle
///
/// Clones share the same metric families.
#[derive(Clone)]
pub struct MetricsRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_prefix(METRIC_PREFIX)
    }

    /// Registry whose metric names start with `prefix_`
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry::with_prefix(prefix))),
        }
    }

    pub fn global() -> &'static MetricsRegistry {
        METRICS_REGISTRY.get_or_init(MetricsRegistry::new)
    }

    /// Run `f` with exclusive access to the underlying registry
    pub fn register_with<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = self.inner.write();
        f(&mut *registry)
    }

    /// Render every registered family in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let mut text = String::new();
        encode(&mut text, &self.inner.read())
            .map_err(|e| MetricsError::EncodingError(e.to_string()))?;
        Ok(text)
    }

    pub fn shares_registry_with(&self, other: &MetricsRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRegistry").finish_non_exhaustive()
    }
}
