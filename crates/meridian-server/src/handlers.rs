//! HTTP request handlers for the Meridian server.
//!
//! Exposes single-source and fused fetches, statistics, lineage queries and
//! runtime provider switches using axum.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use meridian_domain::{Operation, Payload};
use meridian_fusion::{FetchOptions, FusionError, FusionOutcome, FusionService, FusionStats};
use meridian_lineage::{ExportFormat, LineageError, LineageGraph, LineageQuery, LineageRecord, TrackingId};
use meridian_orchestrator::{InvokeOptions, OrchestratorError, ProviderStats, MAX_CACHE_TTL_SECS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Runtime enabled flags by provider id
pub type ProviderSwitches = HashMap<String, Arc<AtomicBool>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Fetch, fusion and lineage
    pub service: Arc<FusionService>,
    /// Adapter enabled flags that `/providers/:id/enabled` may flip
    pub switches: Arc<ProviderSwitches>,
}

impl AppState {
    /// State without any switchable providers
    pub fn new(service: Arc<FusionService>) -> Self {
        Self {
            service,
            switches: Arc::new(HashMap::new()),
        }
    }

    /// Replace the provider switches
    pub fn with_switches(mut self, switches: ProviderSwitches) -> Self {
        self.switches = Arc::new(switches);
        self
    }
}

/// Single-source fetch request
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    /// Operation name
    pub operation: String,
    /// Operation parameters
    #[serde(default)]
    pub params: Payload,
    /// Invoke options
    #[serde(flatten)]
    pub options: InvokeOptions,
}

/// Multi-source fetch request
#[derive(Debug, Deserialize)]
pub struct FuseRequest {
    /// Operation name
    pub operation: String,
    /// Operation parameters
    #[serde(default)]
    pub params: Payload,
    /// Fetch options
    #[serde(flatten)]
    pub options: FetchOptions,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Registered providers
    pub provider_count: usize,
    /// Providers both enabled and connected
    pub available_providers: usize,
    /// Dispatches currently in flight
    pub in_flight: usize,
}

/// Query of `/lineage/graph` and `/lineage/export`
#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    /// Export format (`json` or `csv`)
    #[serde(default)]
    pub format: Option<String>,
    /// Number of recent records
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Body of `/providers/:id/enabled`
#[derive(Debug, Serialize, Deserialize)]
pub struct EnabledRequest {
    /// New runtime flag
    pub enabled: bool,
}

/// Effective state of a provider after a switch
#[derive(Debug, Serialize, Deserialize)]
pub struct EnabledResponse {
    /// Provider id
    pub provider: String,
    /// Whether the orchestrator will dispatch to it
    pub enabled: bool,
}

/// Body of `/cache/invalidate`
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateRequest {
    /// Key pattern (`*` wildcards)
    pub pattern: String,
}

/// Result of a cache invalidation
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Entries removed
    pub removed: usize,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Machine-readable error kind
    pub kind: String,
    /// Operation the error belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Provider involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Fetch or fusion failed
    Fusion(FusionError),
    /// Lineage lookup or export failed
    Lineage(LineageError),
    /// No switch for this provider
    UnknownProvider(String),
    /// Malformed request
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Fusion(FusionError::Orchestrator(err)) => orchestrator_status(err),
            AppError::Fusion(FusionError::AllSourcesFailed { .. }) => StatusCode::BAD_GATEWAY,
            AppError::Fusion(FusionError::Lineage(err)) | AppError::Lineage(err) => lineage_status(err),
            AppError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (kind, operation, provider) = match self {
            AppError::Fusion(FusionError::Orchestrator(err)) => (
                err.kind(),
                Some(err.operation().to_string()),
                err.provider().map(str::to_string),
            ),
            AppError::Fusion(FusionError::AllSourcesFailed { operation, .. }) => {
                ("all_sources_failed", Some(operation.clone()), None)
            }
            AppError::Fusion(err) => (err.kind(), None, None),
            AppError::Lineage(err) => (lineage_kind(err), None, None),
            AppError::UnknownProvider(id) => ("unknown_provider", None, Some(id.clone())),
            AppError::BadRequest(_) => ("bad_request", None, None),
        };

        ErrorResponse {
            error: self.to_string(),
            kind: kind.to_string(),
            operation,
            provider,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Fusion(e) => write!(f, "{}", e),
            AppError::Lineage(e) => write!(f, "{}", e),
            AppError::UnknownProvider(id) => write!(f, "Unknown provider: {}", id),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

fn orchestrator_status(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::NoProviderAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        OrchestratorError::ProviderError { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn lineage_status(err: &LineageError) -> StatusCode {
    match err {
        LineageError::UnknownTrackingId(_) => StatusCode::NOT_FOUND,
        LineageError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
        LineageError::Serialization(_) | LineageError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn lineage_kind(err: &LineageError) -> &'static str {
    match err {
        LineageError::UnknownTrackingId(_) => "unknown_tracking_id",
        LineageError::UnsupportedFormat(_) => "unsupported_format",
        LineageError::Serialization(_) | LineageError::Csv(_) => "serialization_error",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("Request failed: {}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<FusionError> for AppError {
    fn from(e: FusionError) -> Self {
        AppError::Fusion(e)
    }
}

impl From<LineageError> for AppError {
    fn from(e: LineageError) -> Self {
        AppError::Lineage(e)
    }
}

/// GET /health - Aggregated provider health
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let orchestrator = state.service.orchestrator();
    let stats = orchestrator.get_stats();
    let available = stats.values().filter(|s| s.enabled && s.connected).count();

    let status = if available == 0 {
        "unhealthy"
    } else if available < stats.len() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        provider_count: stats.len(),
        available_providers: available,
        in_flight: orchestrator.in_flight(),
    })
}

/// GET /stats - Per-provider connection statistics
async fn provider_stats(State(state): State<AppState>) -> Json<BTreeMap<String, ProviderStats>> {
    Json(state.service.orchestrator().get_stats())
}

/// GET /stats/fusion - Provider, reputation, fusion and lineage aggregates
async fn fusion_stats(State(state): State<AppState>) -> Json<FusionStats> {
    Json(state.service.get_fusion_stats())
}

/// POST /invoke - Single-source fetch
async fn invoke(
    State(state): State<AppState>,
    Json(request): Json<InvokeRequest>,
) -> Result<Json<FusionOutcome>, AppError> {
    let operation = parse_operation(request.operation, request.params)?;
    check_cache_ttl(request.options.cache_ttl_secs)?;
    let outcome = state.service.fetch(&operation, &request.options).await?;
    Ok(Json(outcome))
}

/// POST /fuse - Multi-source fetch and fusion
async fn fuse(
    State(state): State<AppState>,
    Json(request): Json<FuseRequest>,
) -> Result<Json<FusionOutcome>, AppError> {
    let operation = parse_operation(request.operation, request.params)?;
    check_cache_ttl(request.options.cache_ttl_secs)?;
    let outcome = state.service.fetch_fused(&operation, &request.options).await?;
    Ok(Json(outcome))
}

fn parse_operation(name: String, params: Payload) -> Result<Operation, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("operation must not be empty".to_string()));
    }
    let params = if params.is_null() {
        Payload::Object(Default::default())
    } else {
        params
    };
    Ok(Operation::new(name, params))
}

fn check_cache_ttl(ttl_secs: Option<u64>) -> Result<(), AppError> {
    match ttl_secs {
        Some(ttl) if ttl > MAX_CACHE_TTL_SECS => Err(AppError::BadRequest(format!(
            "cache_ttl_secs {} exceeds the maximum of {}",
            ttl, MAX_CACHE_TTL_SECS
        ))),
        _ => Ok(()),
    }
}

/// GET /lineage - Query finalized records, most recent first
async fn query_lineage(
    State(state): State<AppState>,
    Query(mut query): Query<LineageQuery>,
) -> Json<Vec<LineageRecord>> {
    let lineage = state.service.lineage();
    if query.limit.is_none() {
        query.limit = Some(lineage.config().default_recent_limit);
    }
    Json(lineage.query(&query))
}

/// GET /lineage/graph - Graph of recent records
async fn lineage_graph(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Json<LineageGraph> {
    Json(state.service.lineage().graph(params.limit))
}

/// GET /lineage/export - Recent records as JSON or CSV
async fn export_lineage(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Response, AppError> {
    let format = match params.format.as_deref() {
        Some(format) => format.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };
    let body = state.service.export_lineage_data(format, params.limit)?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], body).into_response())
}

/// GET /lineage/:id - One record, active or finalized
async fn get_lineage(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LineageRecord>, AppError> {
    let id = TrackingId::from_string(&id).map_err(AppError::BadRequest)?;
    let lineage = state.service.lineage();
    lineage
        .get(id)
        .or_else(|| lineage.active(id))
        .map(Json)
        .ok_or(AppError::Lineage(LineageError::UnknownTrackingId(id)))
}

/// POST /providers/:id/enabled - Flip a provider's runtime flag
async fn set_provider_enabled(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<EnabledRequest>,
) -> Result<Json<EnabledResponse>, AppError> {
    let flag = state
        .switches
        .get(&id)
        .ok_or_else(|| AppError::UnknownProvider(id.clone()))?;
    flag.store(request.enabled, Ordering::SeqCst);
    tracing::info!("Provider {} runtime flag set to {}", id, request.enabled);

    let enabled = state.service.orchestrator().registry().is_enabled(&id);
    Ok(Json(EnabledResponse { provider: id, enabled }))
}

/// POST /cache/invalidate - Drop cached entries matching a pattern
async fn invalidate_cache(
    State(state): State<AppState>,
    Json(request): Json<InvalidateRequest>,
) -> Json<InvalidateResponse> {
    let removed = state.service.orchestrator().invalidate_cache(&request.pattern).await;
    Json(InvalidateResponse { removed })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/stats", get(provider_stats))
        .route("/stats/fusion", get(fusion_stats))
        .route("/invoke", post(invoke))
        .route("/fuse", post(fuse))
        .route("/lineage", get(query_lineage))
        .route("/lineage/graph", get(lineage_graph))
        .route("/lineage/export", get(export_lineage))
        .route("/lineage/:id", get(get_lineage))
        .route("/providers/:id/enabled", post(set_provider_enabled))
        .route("/cache/invalidate", post(invalidate_cache))
        .with_state(state)
}
