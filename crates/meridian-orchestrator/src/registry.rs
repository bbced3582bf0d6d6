//! Provider registry for tracking adapters and their connection statistics.
//!
//! The registry is injected into the orchestrator at construction, so tests
//! and independent orchestrator instances each own their own state.

use crate::rate_gate::RateGate;
use crate::stats::{ConnectionStats, ProviderStats};
use meridian_domain::{ProviderAdapter, ProviderDescriptor};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// One registered provider: descriptor, adapter, stats and rate gate
pub struct RegisteredProvider {
    descriptor: ProviderDescriptor,
    adapter: Arc<dyn ProviderAdapter>,
    stats: Mutex<ConnectionStats>,
    gate: RateGate,
}

impl RegisteredProvider {
    fn new(descriptor: ProviderDescriptor, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let gate = RateGate::new(descriptor.min_interval());
        Self {
            descriptor,
            adapter,
            stats: Mutex::new(ConnectionStats::default()),
            gate,
        }
    }

    fn stats_guard(&self) -> MutexGuard<'_, ConnectionStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Provider identifier
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Static configuration
    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    /// Adapter serving this provider
    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    /// Rate gate of this provider
    pub fn gate(&self) -> &RateGate {
        &self.gate
    }

    /// Enabled only when both the configured and the runtime flag are set
    pub fn is_enabled(&self) -> bool {
        self.descriptor.enabled && self.adapter.is_enabled()
    }

    /// Copy of the current statistics
    pub fn stats(&self) -> ConnectionStats {
        self.stats_guard().clone()
    }

    /// Record a successful dispatch
    pub fn record_success(&self, latency_ms: u64, now_ms: u64) {
        self.stats_guard().record_success(latency_ms, now_ms);
    }

    /// Record a failed dispatch
    pub fn record_failure(&self, message: impl Into<String>) {
        self.stats_guard().record_failure(message);
    }

    /// Update the connectivity flag without touching counters
    pub fn set_connected(&self, connected: bool) {
        self.stats_guard().connected = connected;
    }
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<String, Arc<RegisteredProvider>>,
    order: Vec<String>,
}

/// Registry of known providers
#[derive(Default)]
pub struct ProviderRegistry {
    inner: RwLock<RegistryInner>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any existing one with the same id
    pub fn register(&self, descriptor: ProviderDescriptor, adapter: Arc<dyn ProviderAdapter>) {
        let id = descriptor.id.clone();
        let provider = Arc::new(RegisteredProvider::new(descriptor, adapter));

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.by_id.insert(id.clone(), provider).is_none() {
            inner.order.push(id.clone());
        }
        tracing::debug!("Registered provider {}", id);
    }

    /// Look up a provider
    pub fn get(&self, id: &str) -> Option<Arc<RegisteredProvider>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(id)
            .cloned()
    }

    /// All providers in registration order
    pub fn all(&self) -> Vec<Arc<RegisteredProvider>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Provider ids in registration order
    pub fn ids(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    /// Whether `id` is registered and enabled
    pub fn is_enabled(&self, id: &str) -> bool {
        self.get(id).map(|p| p.is_enabled()).unwrap_or(false)
    }

    /// Statistics of every provider, keyed by id
    pub fn stats(&self) -> BTreeMap<String, ProviderStats> {
        self.all()
            .into_iter()
            .map(|p| (p.id().to_string(), p.stats().snapshot(p.is_enabled())))
            .collect()
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    /// Whether no provider is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
