//! The Fusion Service
//!
//! Glues the orchestrator, scorer, engine and lineage tracker together:
//! fetch from one or many sources, score every response, fuse, record the
//! chain and cache the fused result.

use crate::{
    FetchMode, FetchOptions, FusionEngine, FusionError, FusionMetrics, FusionOptions,
    ToleranceConfig,
};
use meridian_domain::{
    current_timestamp_ms, CacheMetadata, DataDomain, FusedResult, FusionInput, Operation, Payload,
    QualityMetrics, QualityScore,
};
use meridian_lineage::{ExportFormat, FinalizeOutcome, LineageStats, LineageTracker, TrackingId};
use meridian_orchestrator::{
    InvokeOptions, InvokeOutcome, OrchestratorError, ProviderOrchestrator, ProviderStats,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Quality checks at or above this `overall` pass
pub const QUALITY_PASS_THRESHOLD: f64 = 0.5;

/// Lineage source id of multi-source sessions
pub const FUSION_SOURCE_ID: &str = "fusion";

/// Lineage source id of single-source sessions
pub const ORCHESTRATOR_SOURCE_ID: &str = "orchestrator";

/// Result of [`FusionService::fetch`] and [`FusionService::fetch_fused`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionOutcome {
    /// Fused record
    pub result: FusedResult,

    /// Whether the record came from the cache
    pub cached: bool,

    /// Lineage session of the fetch (`None` for cache hits)
    pub tracking_id: Option<TrackingId>,
}

/// Snapshot returned by [`FusionService::get_fusion_stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionStats {
    /// Per-provider connection statistics
    pub providers: BTreeMap<String, ProviderStats>,

    /// Current reputation of every known provider
    pub reputations: BTreeMap<String, f64>,

    /// Fusion counters
    pub fusion: FusionMetrics,

    /// Mean number of sources per fusion
    pub mean_sources_per_fusion: f64,

    /// Mean `overall` of fused results
    pub mean_fused_quality: f64,

    /// Lineage aggregates
    pub lineage: LineageStats,

    /// Dispatches currently in flight
    pub in_flight: usize,
}

type SourceResult = (String, Result<InvokeOutcome, OrchestratorError>);

/// Multi-source fetch, fusion and lineage
pub struct FusionService {
    orchestrator: Arc<ProviderOrchestrator>,
    engine: FusionEngine,
    lineage: Arc<LineageTracker>,
    metrics: Mutex<FusionMetrics>,
}

impl FusionService {
    /// Create a service; the engine uses the orchestrator's scoring weights
    pub fn new(orchestrator: Arc<ProviderOrchestrator>, lineage: Arc<LineageTracker>) -> Self {
        let engine = FusionEngine::new(*orchestrator.scorer().weights());
        Self {
            orchestrator,
            engine,
            lineage,
            metrics: Mutex::new(FusionMetrics::new()),
        }
    }

    /// The orchestrator
    pub fn orchestrator(&self) -> &Arc<ProviderOrchestrator> {
        &self.orchestrator
    }

    /// The lineage tracker
    pub fn lineage(&self) -> &Arc<LineageTracker> {
        &self.lineage
    }

    /// The fusion engine
    pub fn engine(&self) -> &FusionEngine {
        &self.engine
    }

    fn lock_metrics(&self) -> MutexGuard<'_, FusionMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the fusion counters
    pub fn metrics(&self) -> FusionMetrics {
        self.lock_metrics().clone()
    }

    /// Reset the fusion counters
    pub fn reset_metrics(&self) {
        self.lock_metrics().reset();
    }

    /// Single-source fetch: invoke with fallback, score, pass through the engine
    pub async fn fetch(
        &self,
        operation: &Operation,
        options: &InvokeOptions,
    ) -> Result<FusionOutcome, FusionError> {
        let started = Instant::now();
        let domain = self.orchestrator.domain_for(&operation.name);

        let mut context = operation_context(operation);
        if let Some(preferred) = &options.preferred_provider {
            context.insert("preferred_provider".to_string(), preferred.clone());
        }
        let id = self
            .lineage
            .start_tracking(ORCHESTRATOR_SOURCE_ID, &operation.name, context);

        let mut session = SessionGuard::new(&self.lineage, id, started);
        let result = self.fetch_tracked(id, operation, options, domain).await;
        session.disarm();
        self.finish(id, started, result.as_ref().map(|(fused, _)| fused))?;

        let (result, cached) = result?;
        Ok(FusionOutcome {
            result,
            cached,
            tracking_id: Some(id),
        })
    }

    async fn fetch_tracked(
        &self,
        id: TrackingId,
        operation: &Operation,
        options: &InvokeOptions,
        domain: DataDomain,
    ) -> Result<(FusedResult, bool), FusionError> {
        let outcome = match self.orchestrator.invoke(operation, options).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.lineage
                    .add_validation(id, "dispatch", false, Some(err.to_string()))?;
                return Err(err.into());
            }
        };

        let detail = if outcome.cached {
            "cache hit".to_string()
        } else {
            format!("attempts={}, latency={}ms", outcome.attempts, outcome.latency_ms)
        };
        self.lineage
            .add_transformation(id, &format!("fetch:{}", outcome.provider), detail)?;

        let cached = outcome.cached;
        let input = self.score_input(id, domain, outcome)?;
        let fused = self
            .engine
            .fuse(&[input], &FusionOptions::default())
            .map_err(|err| err.for_operation(&operation.name))?;
        self.lineage.add_transformation(id, "fuse", fuse_detail(&fused))?;
        Ok((fused, cached))
    }

    /// Fetch from several sources and fuse their answers
    ///
    /// Per-source dispatches bypass the per-source cache and never fall back;
    /// a failing source is listed in the metadata instead. Only when every
    /// source fails is the call an error.
    pub async fn fetch_fused(
        &self,
        operation: &Operation,
        options: &FetchOptions,
    ) -> Result<FusionOutcome, FusionError> {
        let cache_ttl = options
            .cache_ttl_secs
            .unwrap_or(self.orchestrator.defaults().cache_ttl_secs);
        let cache_key = fused_key(operation, options);

        if cache_ttl > 0 {
            if let Some(hit) = self.cached_result(&cache_key).await {
                tracing::debug!("Fused cache hit for {}", operation);
                self.lock_metrics().record_cache_hit();
                return Ok(FusionOutcome {
                    result: hit,
                    cached: true,
                    tracking_id: None,
                });
            }
        }

        let mut candidates = match &options.providers {
            Some(providers) => providers.clone(),
            None => self.orchestrator.candidates_for(&operation.name),
        };
        let mut seen = HashSet::new();
        candidates.retain(|provider| seen.insert(provider.clone()));

        if candidates.is_empty() {
            tracing::error!("No provider available to fuse {}", operation.name);
            return Err(OrchestratorError::NoProviderAvailable {
                operation: operation.name.clone(),
            }
            .into());
        }

        let started = Instant::now();
        let domain = self.orchestrator.domain_for(&operation.name);
        let mut context = operation_context(operation);
        context.insert("mode".to_string(), options.mode.as_str().to_string());
        context.insert("strategy".to_string(), options.strategy.as_str().to_string());
        context.insert("sources".to_string(), candidates.join(","));
        let id = self
            .lineage
            .start_tracking(FUSION_SOURCE_ID, &operation.name, context);

        tracing::info!(
            "Fusing {} from {} sources ({} mode)",
            operation.name,
            candidates.len(),
            options.mode.as_str()
        );

        let mut session = SessionGuard::new(&self.lineage, id, started);
        let result = self
            .fuse_tracked(id, operation, options, &candidates, domain)
            .await;
        session.disarm();
        self.finish(id, started, result.as_ref())?;
        let result = result?;

        if cache_ttl > 0 {
            self.store_result(&cache_key, operation, &result, cache_ttl).await;
        }

        Ok(FusionOutcome {
            result,
            cached: false,
            tracking_id: Some(id),
        })
    }

    async fn fuse_tracked(
        &self,
        id: TrackingId,
        operation: &Operation,
        options: &FetchOptions,
        candidates: &[String],
        domain: DataDomain,
    ) -> Result<FusedResult, FusionError> {
        let dispatched = match options.mode {
            FetchMode::Parallel => {
                self.dispatch_parallel(operation, candidates, options.timeout_ms)
                    .await
            }
            FetchMode::Sequential => {
                self.dispatch_sequential(operation, candidates, options.timeout_ms)
                    .await
            }
        };

        let mut inputs = Vec::with_capacity(dispatched.len());
        for (provider, result) in dispatched {
            match result {
                Ok(outcome) => {
                    self.lineage.add_transformation(
                        id,
                        &format!("fetch:{}", provider),
                        format!("latency={}ms", outcome.latency_ms),
                    )?;
                    inputs.push(self.score_input(id, domain, outcome)?);
                }
                Err(err) => {
                    tracing::warn!("Source {} failed for {}: {}", provider, operation.name, err);
                    self.lineage.add_validation(
                        id,
                        &format!("fetch:{}", provider),
                        false,
                        Some(err.to_string()),
                    )?;
                    inputs.push(self.failed_input(&provider));
                }
            }
        }

        let fusion_options = FusionOptions {
            strategy: options.strategy,
            tolerance: options
                .tolerance
                .clone()
                .unwrap_or_else(|| ToleranceConfig::for_domain(domain)),
        };
        let fused = self
            .engine
            .fuse(&inputs, &fusion_options)
            .map_err(|err| err.for_operation(&operation.name))?;

        self.lineage.add_transformation(id, "fuse", fuse_detail(&fused))?;
        let overall = fused.metadata.quality_score.overall;
        self.lineage.add_quality_check(
            id,
            "quality:fused",
            overall,
            overall >= QUALITY_PASS_THRESHOLD,
        )?;
        Ok(fused)
    }

    async fn dispatch_parallel(
        &self,
        operation: &Operation,
        candidates: &[String],
        timeout_ms: Option<u64>,
    ) -> Vec<SourceResult> {
        let mut tasks = JoinSet::new();
        for (index, provider) in candidates.iter().enumerate() {
            let orchestrator = Arc::clone(&self.orchestrator);
            let operation = operation.clone();
            let options = source_options(provider, timeout_ms);
            tasks.spawn(async move { (index, orchestrator.invoke(&operation, &options).await) });
        }

        let mut slots: Vec<Option<Result<InvokeOutcome, OrchestratorError>>> =
            candidates.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => tracing::error!("Fusion dispatch task failed: {}", err),
            }
        }

        candidates
            .iter()
            .zip(slots)
            .map(|(provider, slot)| {
                let result = slot.unwrap_or_else(|| {
                    Err(OrchestratorError::ProviderError {
                        operation: operation.name.clone(),
                        provider: provider.clone(),
                        message: "dispatch task failed".to_string(),
                    })
                });
                (provider.clone(), result)
            })
            .collect()
    }

    async fn dispatch_sequential(
        &self,
        operation: &Operation,
        candidates: &[String],
        timeout_ms: Option<u64>,
    ) -> Vec<SourceResult> {
        let mut results = Vec::with_capacity(candidates.len());
        for provider in candidates {
            let options = source_options(provider, timeout_ms);
            let result = self.orchestrator.invoke(operation, &options).await;
            results.push((provider.clone(), result));
        }
        results
    }

    /// Score one response and record its schema and quality steps
    fn score_input(
        &self,
        id: TrackingId,
        domain: DataDomain,
        outcome: InvokeOutcome,
    ) -> Result<FusionInput, FusionError> {
        let provider = outcome.provider;
        let (passed, message) = schema_check(domain, &outcome.payload);
        self.lineage
            .add_validation(id, &format!("schema:{}", provider), passed, message)?;

        let score = self.orchestrator.scorer().score(
            &provider,
            domain,
            &outcome.payload,
            outcome.response_timestamp,
            outcome.latency_ms,
        );
        self.lineage.add_quality_check(
            id,
            &format!("quality:{}", provider),
            score.overall,
            score.overall >= QUALITY_PASS_THRESHOLD,
        )?;

        Ok(FusionInput::new(
            provider,
            outcome.payload,
            score,
            outcome.response_timestamp,
            outcome.latency_ms,
        ))
    }

    fn failed_input(&self, provider: &str) -> FusionInput {
        let scorer = self.orchestrator.scorer();
        let metrics = QualityMetrics {
            freshness: 0.0,
            completeness: 0.0,
            accuracy: 0.0,
            source_reputation: scorer.reputation_of(provider),
            latency: 0.0,
        };
        let score =
            QualityScore::from_metrics(provider, metrics, scorer.weights(), current_timestamp_ms());
        FusionInput::failed(provider, score, 0)
    }

    /// Finalize the session and update the counters
    fn finish(
        &self,
        id: TrackingId,
        started: Instant,
        result: Result<&FusedResult, &FusionError>,
    ) -> Result<(), FusionError> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let outcome = match result {
            Ok(_) => FinalizeOutcome::success(elapsed_ms),
            Err(_) => FinalizeOutcome::failure(elapsed_ms),
        };
        self.lineage.finalize_tracking(id, outcome)?;

        let mut metrics = self.lock_metrics();
        match result {
            Ok(fused) => metrics.record_fusion(fused),
            Err(FusionError::AllSourcesFailed { .. }) => metrics.record_all_failed(),
            Err(_) => {}
        }
        Ok(())
    }

    async fn cached_result(&self, key: &str) -> Option<FusedResult> {
        let hit = self.orchestrator.cache()?.get(key).await?;
        match serde_json::from_value(hit.value) {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!("Discarding unreadable fused cache entry {}: {}", key, err);
                None
            }
        }
    }

    async fn store_result(&self, key: &str, operation: &Operation, result: &FusedResult, ttl_secs: u64) {
        let Some(cache) = self.orchestrator.cache() else {
            return;
        };
        match serde_json::to_value(result) {
            Ok(value) => {
                let metadata = CacheMetadata {
                    operation: operation.name.clone(),
                    provider: Some(crate::FUSED_SOURCE.to_string()),
                    stored_at: result.metadata.fused_at,
                };
                cache.set(key, value, ttl_secs, metadata).await;
            }
            Err(err) => tracing::warn!("Failed to cache fused result {}: {}", key, err),
        }
    }

    /// Provider, reputation, fusion and lineage aggregates
    pub fn get_fusion_stats(&self) -> FusionStats {
        let fusion = self.metrics();
        FusionStats {
            providers: self.orchestrator.get_stats(),
            reputations: self.orchestrator.scorer().reputation().all(),
            mean_sources_per_fusion: fusion.mean_sources_per_fusion(),
            mean_fused_quality: fusion.mean_quality(),
            fusion,
            lineage: self.lineage.stats(),
            in_flight: self.orchestrator.in_flight(),
        }
    }

    /// Export recent lineage records
    pub fn export_lineage_data(
        &self,
        format: ExportFormat,
        limit: Option<usize>,
    ) -> Result<String, FusionError> {
        Ok(self.lineage.export(format, limit)?)
    }
}

/// Finalizes a lineage session as failed when the fetch future is dropped
/// before reaching [`FusionService::finish`]
struct SessionGuard<'a> {
    lineage: &'a LineageTracker,
    id: TrackingId,
    started: Instant,
    armed: bool,
}

impl<'a> SessionGuard<'a> {
    fn new(lineage: &'a LineageTracker, id: TrackingId, started: Instant) -> Self {
        Self {
            lineage,
            id,
            started,
            armed: true,
        }
    }

    /// The caller finalizes the session itself
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        match self
            .lineage
            .finalize_tracking(self.id, FinalizeOutcome::failure(elapsed_ms))
        {
            Ok(_) => tracing::debug!("Lineage session {} cancelled after {}ms", self.id, elapsed_ms),
            Err(err) => tracing::debug!("Cancelled lineage session {} not finalized: {}", self.id, err),
        }
    }
}

fn source_options(provider: &str, timeout_ms: Option<u64>) -> InvokeOptions {
    let options = InvokeOptions::default()
        .with_preferred_provider(provider)
        .with_cache_ttl(0)
        .without_fallback();
    match timeout_ms {
        Some(timeout_ms) => options.with_timeout_ms(timeout_ms),
        None => options,
    }
}

fn operation_context(operation: &Operation) -> BTreeMap<String, String> {
    let mut context = BTreeMap::new();
    context.insert("params".to_string(), operation.canonical_params());
    context
}

/// Cache key of a fused result
///
/// Explicit source lists and tolerance overrides get their own entry.
fn fused_key(operation: &Operation, options: &FetchOptions) -> String {
    let mut key = format!(
        "fused:{}:{}:{}",
        options.strategy.as_str(),
        options.mode.as_str(),
        operation.key()
    );
    if let Some(providers) = &options.providers {
        key.push('@');
        key.push_str(&providers.join(","));
    }
    if let Some(tolerance) = &options.tolerance {
        key.push_str(&format!("~{}", tolerance.default_relative));
        for (field, value) in &tolerance.fields {
            key.push_str(&format!(",{}={}", field, value));
        }
    }
    key
}

fn fuse_detail(result: &FusedResult) -> String {
    let metadata = &result.metadata;
    format!(
        "strategy={}, sources={}, conflicts={}, failed={}",
        metadata.strategy.as_str(),
        metadata.sources.len(),
        metadata.conflicts,
        metadata.failed_sources.len()
    )
}

/// Expected fields present and plausibility checks passed
fn schema_check(domain: DataDomain, payload: &Payload) -> (bool, Option<String>) {
    let mut problems = Vec::new();

    if let Some(object) = payload.as_object() {
        let missing: Vec<&str> = domain
            .expected_fields()
            .iter()
            .copied()
            .filter(|field| object.get(*field).map_or(true, |v| v.is_null()))
            .collect();
        if !missing.is_empty() {
            problems.push(format!("missing fields: {}", missing.join(", ")));
        }
    }

    if let Some(report) = meridian_quality::assess(domain, payload) {
        problems.extend(report.failures);
    }

    if problems.is_empty() {
        (true, None)
    } else {
        (false, Some(problems.join("; ")))
    }
}
