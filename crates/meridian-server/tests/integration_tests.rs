//! Integration tests for the Meridian HTTP API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use meridian_domain::{DataDomain, ProviderAdapter, ProviderDescriptor};
use meridian_fusion::{FusionOutcome, FusionService, FusionStats};
use meridian_lineage::{LineageGraph, LineageRecord, LineageTracker, TrackingId};
use meridian_orchestrator::{
    MemoryCache, MockAdapter, OperationRoute, OperationTable, ProviderOrchestrator,
    ProviderRegistry, ProviderStats,
};
use meridian_quality::QualityScorer;
use meridian_server::handlers::{
    create_router, AppState, EnabledResponse, ErrorResponse, HealthCheckResponse,
    InvalidateResponse, ProviderSwitches,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

fn quote(price: f64) -> Value {
    json!({
        "symbol": "AAPL",
        "price": price,
        "change": 1.25,
        "change_percent": 0.84,
        "volume": 1_000_000,
        "timestamp": 1_700_000_000_000u64
    })
}

/// Helper to create test application state over `adapters`
fn create_test_state(adapters: &[MockAdapter]) -> AppState {
    let registry = Arc::new(ProviderRegistry::new());
    let mut switches = ProviderSwitches::new();
    let mut ids = Vec::new();
    for adapter in adapters {
        let id = adapter.provider_id().to_string();
        let descriptor = ProviderDescriptor::new(id.clone(), DataDomain::MarketData)
            .with_rate_limit(0.0)
            .with_timeout_ms(1_000);
        registry.register(descriptor, Arc::new(adapter.clone()));
        switches.insert(id.clone(), adapter.enabled_flag());
        ids.push(id);
    }

    let operations = OperationTable::new().with_route(
        "get_quote",
        OperationRoute::new(ids).with_domain(DataDomain::MarketData),
    );
    let orchestrator = ProviderOrchestrator::new(registry, operations, QualityScorer::default())
        .with_cache(Arc::new(MemoryCache::new()));
    let service = FusionService::new(Arc::new(orchestrator), Arc::new(LineageTracker::default()));

    AppState::new(Arc::new(service)).with_switches(switches)
}

fn two_sources(p1_price: f64, p2_price: f64) -> AppState {
    create_test_state(&[
        MockAdapter::new("p1", quote(p1_price)),
        MockAdapter::new("p2", json!({"symbol": "AAPL", "price": p2_price})),
    ])
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json<T: DeserializeOwned>(app: &Router, uri: &str) -> (StatusCode, T) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json<T: DeserializeOwned>(app: &Router, uri: &str, body: Value) -> (StatusCode, T) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let p1 = MockAdapter::new("p1", quote(150.0));
    let p2 = MockAdapter::new("p2", quote(150.0));
    let app = create_router(create_test_state(&[p1.clone(), p2.clone()]));

    let (status, health): (_, HealthCheckResponse) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.provider_count, 2);
    assert_eq!(health.available_providers, 2);

    p1.set_enabled(false);
    let (_, health): (_, HealthCheckResponse) = get_json(&app, "/health").await;
    assert_eq!(health.status, "degraded");

    p2.set_enabled(false);
    let (_, health): (_, HealthCheckResponse) = get_json(&app, "/health").await;
    assert_eq!(health.status, "unhealthy");
    assert_eq!(health.available_providers, 0);
}

#[tokio::test]
async fn test_invoke_single_source() {
    let app = create_router(two_sources(150.0, 150.0));

    let (status, outcome): (_, FusionOutcome) = post_json(
        &app,
        "/invoke",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 0}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!outcome.cached);
    assert!(outcome.tracking_id.is_some());
    assert_eq!(outcome.result.metadata.sources.len(), 1);
    assert_eq!(outcome.result.payload["price"], json!(150.0));
}

#[tokio::test]
async fn test_invoke_unknown_operation() {
    let app = create_router(two_sources(150.0, 150.0));

    let (status, error): (_, ErrorResponse) = post_json(
        &app,
        "/invoke",
        json!({"operation": "get_filing", "params": {"cik": "0000320193"}}),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error.kind, "no_provider_available");
    assert_eq!(error.operation.as_deref(), Some("get_filing"));
}

#[tokio::test]
async fn test_invoke_provider_error() {
    let app = create_router(create_test_state(&[MockAdapter::failing("p1", "upstream down")]));

    let (status, error): (_, ErrorResponse) = post_json(
        &app,
        "/invoke",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error.kind, "provider_error");
    assert_eq!(error.provider.as_deref(), Some("p1"));
    assert!(error.error.contains("upstream down"));
}

#[tokio::test]
async fn test_oversized_cache_ttl_rejected() {
    let app = create_router(two_sources(150.0, 150.0));

    for uri in ["/invoke", "/fuse"] {
        let (status, error): (_, ErrorResponse) = post_json(
            &app,
            uri,
            json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": u64::MAX}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(error.kind, "bad_request");
    }
}

#[tokio::test]
async fn test_fuse_agreeing_sources() {
    let app = create_router(two_sources(150.00, 150.02));

    let (status, outcome): (_, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 0}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let metadata = &outcome.result.metadata;
    assert_eq!(metadata.sources.len(), 2);
    assert_eq!(metadata.conflicts, 0);
    assert_eq!(metadata.primary_source, "p1");
}

#[tokio::test]
async fn test_fuse_conflicting_sources() {
    let app = create_router(two_sources(150.00, 155.00));

    let (status, outcome): (_, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({
            "operation": "get_quote",
            "params": {"symbol": "AAPL"},
            "strategy": "highest_quality",
            "mode": "sequential"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let metadata = &outcome.result.metadata;
    assert_eq!(metadata.conflicts, 1);
    assert!(metadata.conflicting_fields.iter().any(|f| f == "price"));
    assert_eq!(outcome.result.payload["price"], json!(150.00));
}

#[tokio::test]
async fn test_fuse_all_sources_failed() {
    let app = create_router(create_test_state(&[
        MockAdapter::failing("p1", "rate limited"),
        MockAdapter::failing("p2", "upstream down"),
    ]));

    let (status, error): (_, ErrorResponse) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error.kind, "all_sources_failed");
    assert_eq!(error.operation.as_deref(), Some("get_quote"));
}

#[tokio::test]
async fn test_fused_result_cached_and_invalidated() {
    let p1 = MockAdapter::new("p1", quote(150.0));
    let p2 = MockAdapter::new("p2", quote(150.0));
    let app = create_router(create_test_state(&[p1.clone(), p2.clone()]));
    let request = json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 60});

    let (_, first): (_, FusionOutcome) = post_json(&app, "/fuse", request.clone()).await;
    let (_, second): (_, FusionOutcome) = post_json(&app, "/fuse", request.clone()).await;
    assert!(!first.cached);
    assert!(second.cached);
    assert!(second.tracking_id.is_none());
    assert_eq!(p1.call_count(), 1);

    let (status, invalidated): (_, InvalidateResponse) =
        post_json(&app, "/cache/invalidate", json!({"pattern": "fused:*"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invalidated.removed, 1);

    let (_, third): (_, FusionOutcome) = post_json(&app, "/fuse", request).await;
    assert!(!third.cached);
    assert_eq!(p1.call_count(), 2);
}

#[tokio::test]
async fn test_lineage_endpoints() {
    let app = create_router(two_sources(150.0, 150.0));

    let (_, outcome): (_, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 0}),
    )
    .await;
    let tracking_id = outcome.tracking_id.unwrap();

    let (status, records): (_, Vec<LineageRecord>) =
        get_json(&app, "/lineage?source_id=fusion&success=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, tracking_id);
    assert_eq!(records[0].data_type, "get_quote");

    let (status, record): (_, LineageRecord) =
        get_json(&app, &format!("/lineage/{}", tracking_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(record.steps.iter().any(|s| s.name == "fetch:p1"));

    let (status, error): (_, ErrorResponse) =
        get_json(&app, &format!("/lineage/{}", TrackingId::new())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error.kind, "unknown_tracking_id");

    let (status, _): (_, ErrorResponse) = get_json(&app, "/lineage/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, graph): (_, LineageGraph) = get_json(&app, "/lineage/graph?limit=10").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!graph.nodes.is_empty());
    assert_eq!(graph.edges.len(), graph.nodes.len() - 1);
}

#[tokio::test]
async fn test_lineage_export_formats() {
    let app = create_router(two_sources(150.0, 150.0));
    let _: (StatusCode, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}}),
    )
    .await;

    let request = Request::builder()
        .uri("/lineage/export?format=csv")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csv = String::from_utf8(body.to_vec()).unwrap();
    assert!(csv.starts_with("tracking_id,"));
    assert_eq!(csv.lines().count(), 2);

    let (status, records): (_, Vec<LineageRecord>) = get_json(&app, "/lineage/export").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records.len(), 1);

    let (status, error): (_, ErrorResponse) = get_json(&app, "/lineage/export?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.kind, "unsupported_format");
}

#[tokio::test]
async fn test_provider_switch() {
    let p1 = MockAdapter::new("p1", quote(150.0));
    let p2 = MockAdapter::new("p2", quote(150.0));
    let app = create_router(create_test_state(&[p1.clone(), p2.clone()]));

    let (status, switched): (_, EnabledResponse) =
        post_json(&app, "/providers/p1/enabled", json!({"enabled": false})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(switched.provider, "p1");
    assert!(!switched.enabled);

    let (_, outcome): (_, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 0}),
    )
    .await;
    assert_eq!(outcome.result.metadata.sources, vec!["p2".to_string()]);
    assert_eq!(p1.call_count(), 0);

    let (_, stats): (_, BTreeMap<String, ProviderStats>) = get_json(&app, "/stats").await;
    assert!(!stats["p1"].enabled);
    assert!(stats["p2"].enabled);

    let (status, error): (_, ErrorResponse) =
        post_json(&app, "/providers/ghost/enabled", json!({"enabled": true})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error.kind, "unknown_provider");
    assert_eq!(error.provider.as_deref(), Some("ghost"));
}

#[tokio::test]
async fn test_fusion_stats_endpoint() {
    let app = create_router(two_sources(150.0, 155.0));
    let _: (StatusCode, FusionOutcome) = post_json(
        &app,
        "/fuse",
        json!({"operation": "get_quote", "params": {"symbol": "AAPL"}, "cache_ttl_secs": 0}),
    )
    .await;

    let (status, stats): (_, FusionStats) = get_json(&app, "/stats/fusion").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats.fusion.fusions, 1);
    assert_eq!(stats.fusion.conflicts, 1);
    assert_eq!(stats.mean_sources_per_fusion, 2.0);
    assert_eq!(stats.providers.len(), 2);
    assert_eq!(stats.providers["p1"].request_count, 1);
    assert!(stats.reputations.contains_key("p1"));
    assert_eq!(stats.lineage.total_finalized, 1);
}
