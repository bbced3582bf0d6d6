//! Provider Orchestrator
//!
//! Routes one operation to the best available provider:
//!
//! 1. Cache short-circuit (no dispatch, no stats)
//! 2. Candidate selection from the operation table or the preferred provider
//! 3. Ranking by error rate, latency and reputation
//! 4. Deduplicated, rate-gated, deadline-bound dispatch
//! 5. At most one fallback to the best-ranked alternative

use crate::config::{InvokeDefaults, OrchestratorConfig};
use crate::inflight::{DispatchResult, DispatchSuccess, InFlight, Slot};
use crate::operations::OperationTable;
use crate::registry::{ProviderRegistry, RegisteredProvider};
use crate::stats::ProviderStats;
use crate::{ConfigError, OrchestratorError};
use meridian_domain::{
    current_timestamp_ms, Cache, CacheMetadata, DataDomain, Operation, Payload, ProviderAdapter,
};
use meridian_quality::{DispatchOutcome, QualityScorer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Maximum dispatch attempts per invoke: the primary plus one fallback
pub const MAX_ATTEMPTS: usize = 2;

const ERROR_RATE_WEIGHT: f64 = 0.4;
const LATENCY_WEIGHT: f64 = 0.3;
const REPUTATION_WEIGHT: f64 = 0.3;

/// Advisory request priority, only logged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work
    Low,
    /// Regular requests
    #[default]
    Normal,
    /// User-facing requests
    High,
}

/// Per-call options of [`ProviderOrchestrator::invoke`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeOptions {
    /// Dispatch to this provider instead of the ranked choice
    #[serde(default)]
    pub preferred_provider: Option<String>,

    /// Cache TTL in seconds; 0 disables caching, unset uses the default
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-call deadline; unset uses the provider's timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Advisory priority
    #[serde(default)]
    pub priority: Priority,

    /// Whether a failed dispatch may fall back to an alternative
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
}

fn default_allow_fallback() -> bool {
    true
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            preferred_provider: None,
            cache_ttl_secs: None,
            timeout_ms: None,
            priority: Priority::Normal,
            allow_fallback: true,
        }
    }
}

impl InvokeOptions {
    /// Prefer `provider`
    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    /// Set the cache TTL (0 disables caching)
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = Some(ttl_secs);
        self
    }

    /// Set the per-call deadline
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the advisory priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Disable the fallback attempt
    pub fn without_fallback(mut self) -> Self {
        self.allow_fallback = false;
        self
    }
}

/// Successful result of [`ProviderOrchestrator::invoke`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeOutcome {
    /// Response data
    pub payload: Payload,

    /// Provider that produced the data
    pub provider: String,

    /// Whether the data came from the cache
    pub cached: bool,

    /// Latency of the successful dispatch (0 for cache hits)
    pub latency_ms: u64,

    /// When the data was produced (ms since epoch)
    pub response_timestamp: u64,

    /// Dispatch attempts made (0 for cache hits)
    pub attempts: usize,
}

/// The Provider Orchestrator
///
/// Owns the provider registry and reads reputation through the shared
/// [`QualityScorer`].
pub struct ProviderOrchestrator {
    registry: Arc<ProviderRegistry>,
    operations: OperationTable,
    scorer: QualityScorer,
    cache: Option<Arc<dyn Cache>>,
    inflight: InFlight,
    defaults: InvokeDefaults,
}

impl ProviderOrchestrator {
    /// Create an orchestrator over an existing registry
    pub fn new(registry: Arc<ProviderRegistry>, operations: OperationTable, scorer: QualityScorer) -> Self {
        Self {
            registry,
            operations,
            scorer,
            cache: None,
            inflight: InFlight::new(),
            defaults: InvokeDefaults::default(),
        }
    }

    /// Build an orchestrator from configuration and one adapter per provider
    pub fn from_config(
        config: &OrchestratorConfig,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        scorer: QualityScorer,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut by_id: HashMap<String, Arc<dyn ProviderAdapter>> = adapters
            .into_iter()
            .map(|adapter| (adapter.provider_id().to_string(), adapter))
            .collect();

        let registry = Arc::new(ProviderRegistry::new());
        for descriptor in &config.providers {
            let adapter = by_id
                .remove(&descriptor.id)
                .ok_or_else(|| ConfigError::MissingAdapter(descriptor.id.clone()))?;
            registry.register(descriptor.clone(), adapter);
        }

        for id in by_id.keys() {
            tracing::warn!("Ignoring adapter for unconfigured provider {}", id);
        }

        tracing::info!(
            "Orchestrator configured with {} providers and {} operations",
            registry.len(),
            config.operations.len()
        );

        Ok(Self::new(registry, config.operations.clone(), scorer).with_defaults(config.defaults.clone()))
    }

    /// Attach a cache
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override invoke defaults
    pub fn with_defaults(mut self, defaults: InvokeDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Provider registry
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Operation table
    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// Quality scorer (and through it, reputation)
    pub fn scorer(&self) -> &QualityScorer {
        &self.scorer
    }

    /// Attached cache, if any
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Invoke defaults
    pub fn defaults(&self) -> &InvokeDefaults {
        &self.defaults
    }

    /// Number of dispatches currently in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Data domain of an operation: the declared one, else the domain of its
    /// first provider
    pub fn domain_for(&self, operation: &str) -> DataDomain {
        self.operations
            .domain_for(operation)
            .or_else(|| {
                self.operations
                    .providers_for(operation)
                    .iter()
                    .find_map(|id| self.registry.get(id))
                    .map(|provider| provider.descriptor().domain)
            })
            .unwrap_or_default()
    }

    /// Routing score of a provider
    ///
    /// `(1 - error_rate) * 0.4 + latency_score * 0.3 + reputation * 0.3`
    pub fn rank_score(&self, provider: &RegisteredProvider) -> f64 {
        let stats = provider.stats();
        (1.0 - stats.error_rate()) * ERROR_RATE_WEIGHT
            + stats.latency_score() * LATENCY_WEIGHT
            + self.scorer.reputation_of(provider.id()) * REPUTATION_WEIGHT
    }

    /// Enabled providers among `ids`, best first
    ///
    /// Ties keep the order of `ids`.
    pub fn rank_candidates(&self, ids: &[String]) -> Vec<Arc<RegisteredProvider>> {
        let mut ranked: Vec<(f64, Arc<RegisteredProvider>)> = ids
            .iter()
            .filter_map(|id| self.registry.get(id))
            .filter(|provider| provider.is_enabled())
            .map(|provider| (self.rank_score(&provider), provider))
            .collect();

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().map(|(_, provider)| provider).collect()
    }

    /// Enabled providers registered for `operation`, best first
    pub fn candidates_for(&self, operation: &str) -> Vec<String> {
        self.rank_candidates(self.operations.providers_for(operation))
            .iter()
            .map(|provider| provider.id().to_string())
            .collect()
    }

    /// Dispatch `operation` to the best available provider
    pub async fn invoke(
        &self,
        operation: &Operation,
        options: &InvokeOptions,
    ) -> Result<InvokeOutcome, OrchestratorError> {
        let cache_ttl = options.cache_ttl_secs.unwrap_or(self.defaults.cache_ttl_secs);
        let cache_key = operation.key();

        if cache_ttl > 0 {
            if let Some(cache) = &self.cache {
                if let Some(hit) = cache.get(&cache_key).await {
                    tracing::debug!("Cache hit for {}", operation);
                    return Ok(InvokeOutcome {
                        payload: hit.value,
                        provider: hit.metadata.provider.unwrap_or_default(),
                        cached: true,
                        latency_ms: 0,
                        response_timestamp: hit.metadata.stored_at,
                        attempts: 0,
                    });
                }
            }
        }

        tracing::debug!("Invoking {} (priority: {:?})", operation, options.priority);

        let (plan, max_attempts) = self.plan(operation, options);
        if plan.is_empty() || max_attempts == 0 {
            tracing::error!("No provider available for {}", operation.name);
            return Err(OrchestratorError::NoProviderAvailable {
                operation: operation.name.clone(),
            });
        }

        let mut last_error = None;
        for (index, provider) in plan.iter().take(max_attempts).enumerate() {
            if let Some(previous) = &last_error {
                tracing::warn!(
                    "Falling back to {} for {} after: {}",
                    provider.id(),
                    operation.name,
                    previous
                );
            }

            let timeout_ms = options.timeout_ms.unwrap_or(provider.descriptor().timeout_ms);
            match self.dispatch(provider, operation, timeout_ms).await {
                Ok(success) => {
                    if cache_ttl > 0 {
                        if let Some(cache) = &self.cache {
                            let metadata = CacheMetadata {
                                operation: operation.name.clone(),
                                provider: Some(success.provider.clone()),
                                stored_at: success.response_timestamp,
                            };
                            cache
                                .set(&cache_key, success.payload.clone(), cache_ttl, metadata)
                                .await;
                        }
                    }

                    return Ok(InvokeOutcome {
                        payload: success.payload,
                        provider: success.provider,
                        cached: false,
                        latency_ms: success.latency_ms,
                        response_timestamp: success.response_timestamp,
                        attempts: index + 1,
                    });
                }
                Err(err) => {
                    tracing::warn!("Attempt {} for {} failed: {}", index + 1, operation.name, err);
                    last_error = Some(err);
                }
            }
        }

        let err = last_error.unwrap_or_else(|| OrchestratorError::NoProviderAvailable {
            operation: operation.name.clone(),
        });
        tracing::error!("Invoke of {} failed: {}", operation.name, err);
        Err(err)
    }

    /// Ordered dispatch plan and the number of attempts it may use
    ///
    /// A disabled or unknown preferred provider consumes the primary attempt
    /// without being dispatched, leaving only the fallback.
    fn plan(
        &self,
        operation: &Operation,
        options: &InvokeOptions,
    ) -> (Vec<Arc<RegisteredProvider>>, usize) {
        let max_attempts = if options.allow_fallback { MAX_ATTEMPTS } else { 1 };
        let registered = self.operations.providers_for(&operation.name);

        let Some(preferred) = options.preferred_provider.as_deref() else {
            return (self.rank_candidates(registered), max_attempts);
        };

        let alternatives: Vec<String> = registered
            .iter()
            .filter(|id| id.as_str() != preferred)
            .cloned()
            .collect();

        match self.registry.get(preferred) {
            Some(provider) if provider.is_enabled() => {
                let mut plan = vec![provider];
                if options.allow_fallback {
                    plan.extend(self.rank_candidates(&alternatives));
                }
                (plan, max_attempts)
            }
            _ => {
                tracing::warn!(
                    "Preferred provider {} is unavailable for {}",
                    preferred,
                    operation.name
                );
                if options.allow_fallback {
                    (self.rank_candidates(&alternatives), max_attempts - 1)
                } else {
                    (Vec::new(), 0)
                }
            }
        }
    }

    /// Dispatch to one provider, joining an identical in-flight dispatch
    async fn dispatch(
        &self,
        provider: &Arc<RegisteredProvider>,
        operation: &Operation,
        timeout_ms: u64,
    ) -> DispatchResult {
        let key = operation.provider_key(provider.id());
        match self.inflight.join(&key) {
            Slot::Follower(completion) => {
                tracing::debug!("Joining in-flight dispatch {}", key);
                InFlight::wait(completion, &operation.name, provider.id()).await
            }
            Slot::Leader(guard) => {
                let result = self.execute(provider, operation, timeout_ms).await;
                guard.complete(&result);
                result
            }
        }
    }

    /// Rate-gated, deadline-bound adapter call with stats and reputation
    /// bookkeeping
    async fn execute(
        &self,
        provider: &RegisteredProvider,
        operation: &Operation,
        timeout_ms: u64,
    ) -> DispatchResult {
        provider.gate().acquire().await;

        let started = Instant::now();
        let call = provider
            .adapter()
            .execute(&operation.name, &operation.params, timeout_ms);
        let response = tokio::time::timeout(Duration::from_millis(timeout_ms), call).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let result = match response {
            Err(_) => Err(OrchestratorError::ProviderTimeout {
                operation: operation.name.clone(),
                provider: provider.id().to_string(),
                timeout_ms,
            }),
            Ok(_) if !provider.is_enabled() => Err(OrchestratorError::ProviderError {
                operation: operation.name.clone(),
                provider: provider.id().to_string(),
                message: "provider disabled during dispatch".to_string(),
            }),
            Ok(response) if response.success => match response.data {
                Some(payload) => Ok(DispatchSuccess {
                    provider: provider.id().to_string(),
                    payload,
                    latency_ms,
                    response_timestamp: current_timestamp_ms(),
                }),
                None => Err(OrchestratorError::ProviderError {
                    operation: operation.name.clone(),
                    provider: provider.id().to_string(),
                    message: "provider returned no data".to_string(),
                }),
            },
            Ok(response) => Err(OrchestratorError::ProviderError {
                operation: operation.name.clone(),
                provider: provider.id().to_string(),
                message: response
                    .error
                    .unwrap_or_else(|| "unknown provider error".to_string()),
            }),
        };

        match &result {
            Ok(success) => {
                provider.record_success(latency_ms, success.response_timestamp);
                self.scorer
                    .update_reputation(provider.id(), DispatchOutcome::success(latency_ms));
                tracing::debug!(
                    "Provider {} answered {} in {}ms",
                    provider.id(),
                    operation.name,
                    latency_ms
                );
            }
            Err(err) => {
                provider.record_failure(err.to_string());
                self.scorer
                    .update_reputation(provider.id(), DispatchOutcome::failure(latency_ms));
            }
        }

        result
    }

    /// Statistics of every provider, keyed by id
    pub fn get_stats(&self) -> BTreeMap<String, ProviderStats> {
        self.registry.stats()
    }

    /// Probe every provider and update its connectivity flag
    ///
    /// Request and error counters and reputation are left untouched. Returns
    /// the health of each provider.
    pub async fn refresh_health(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for provider in self.registry.all() {
            let healthy = provider.descriptor().enabled && provider.adapter().health_check().await;
            provider.set_connected(healthy);
            health.insert(provider.id().to_string(), healthy);
        }

        let healthy = health.values().filter(|h| **h).count();
        tracing::debug!("Health refresh: {}/{} providers healthy", healthy, health.len());
        health
    }

    /// Drop cached entries matching `pattern`
    pub async fn invalidate_cache(&self, pattern: &str) -> usize {
        match &self.cache {
            Some(cache) => cache.invalidate_pattern(pattern).await,
            None => 0,
        }
    }

    /// Drop expired cache entries, returning how many were removed
    pub async fn purge_cache(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.purge_expired().await,
            None => 0,
        }
    }
}
