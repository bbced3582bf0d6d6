//! Integration tests for the Fusion Service

use meridian_domain::{ConflictStrategy, DataDomain, Operation, ProviderAdapter, ProviderDescriptor};
use meridian_fusion::{
    FetchMode, FetchOptions, FusionError, FusionService, FUSION_SOURCE_ID, ORCHESTRATOR_SOURCE_ID,
};
use meridian_lineage::{ExportFormat, LineageQuery, LineageTracker};
use meridian_orchestrator::{
    InvokeOptions, MemoryCache, MockAdapter, OperationRoute, OperationTable, ProviderOrchestrator,
    ProviderRegistry,
};
use meridian_quality::QualityScorer;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn quote_op() -> Operation {
    Operation::new("get_quote", json!({"symbol": "AAPL"}))
}

/// Quote carrying every expected market-data field
fn full_quote(price: f64) -> Value {
    json!({
        "symbol": "AAPL",
        "price": price,
        "change": 1.25,
        "change_percent": 0.84,
        "volume": 1_000_000,
        "timestamp": 1_700_000_000_000u64
    })
}

/// Quote with only symbol and price
fn partial_quote(price: f64) -> Value {
    json!({"symbol": "AAPL", "price": price})
}

/// Service over `adapters`, all serving `get_quote` in the given order
fn build(adapters: &[MockAdapter]) -> FusionService {
    build_with(adapters, |d| d)
}

fn build_with(
    adapters: &[MockAdapter],
    customize: impl Fn(ProviderDescriptor) -> ProviderDescriptor,
) -> FusionService {
    let registry = Arc::new(ProviderRegistry::new());
    let mut ids = Vec::new();
    for adapter in adapters {
        let id = adapter.provider_id().to_string();
        let descriptor = ProviderDescriptor::new(id.clone(), DataDomain::MarketData)
            .with_rate_limit(0.0)
            .with_timeout_ms(1_000);
        registry.register(customize(descriptor), Arc::new(adapter.clone()));
        ids.push(id);
    }

    let operations = OperationTable::new().with_route(
        "get_quote",
        OperationRoute::new(ids).with_domain(DataDomain::MarketData),
    );
    let orchestrator = ProviderOrchestrator::new(registry, operations, QualityScorer::default())
        .with_cache(Arc::new(MemoryCache::new()));
    FusionService::new(Arc::new(orchestrator), Arc::new(LineageTracker::default()))
}

fn uncached() -> FetchOptions {
    FetchOptions::default().with_cache_ttl(0)
}

#[tokio::test]
async fn test_agreeing_sources_have_no_conflicts() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.00)),
        MockAdapter::new("p2", partial_quote(150.02)),
    ]);

    let outcome = service.fetch_fused(&quote_op(), &uncached()).await.unwrap();
    let metadata = &outcome.result.metadata;

    assert!(!outcome.cached);
    assert_eq!(metadata.conflicts, 0);
    assert_eq!(metadata.primary_source, "p1");
    assert_eq!(metadata.sources.len(), 2);
    assert_eq!(outcome.result.payload["price"], json!(150.00));
    assert!(metadata.failed_sources.is_empty());
}

#[tokio::test]
async fn test_conflicting_sources_use_highest_quality() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.00)),
        MockAdapter::new("p2", partial_quote(155.00)),
    ]);

    let outcome = service
        .fetch_fused(
            &quote_op(),
            &uncached().with_strategy(ConflictStrategy::HighestQuality),
        )
        .await
        .unwrap();

    assert_eq!(outcome.result.metadata.conflicts, 1);
    assert_eq!(outcome.result.metadata.conflicting_fields, vec!["price"]);
    assert_eq!(outcome.result.payload["price"], json!(150.00));
    assert_eq!(outcome.result.metadata.field_sources["price"], "p1");
}

#[tokio::test]
async fn test_consensus_across_three_sources() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(160.00)),
        MockAdapter::new("p2", json!({"symbol": "AAPL", "price": 150.00, "volume": 1_000_000})),
        MockAdapter::new("p3", partial_quote(150.01)),
    ]);

    let outcome = service
        .fetch_fused(&quote_op(), &uncached().with_strategy(ConflictStrategy::Consensus))
        .await
        .unwrap();

    assert_eq!(outcome.result.metadata.primary_source, "p1");
    assert_eq!(outcome.result.metadata.conflicts, 1);
    assert_eq!(outcome.result.payload["price"], json!(150.00));
    assert_eq!(outcome.result.metadata.field_sources["price"], "p2");
}

#[tokio::test]
async fn test_partial_failure_is_not_an_error() {
    let p2 = MockAdapter::failing("p2", "upstream 503");
    let service = build(&[MockAdapter::new("p1", full_quote(150.0)), p2.clone()]);

    let outcome = service.fetch_fused(&quote_op(), &uncached()).await.unwrap();
    let metadata = &outcome.result.metadata;

    assert_eq!(metadata.sources, vec!["p1"]);
    assert_eq!(metadata.failed_sources, vec!["p2"]);
    assert_eq!(outcome.result.payload, full_quote(150.0));
    // No fallback on per-source dispatches
    assert_eq!(p2.call_count(), 1);
    assert_eq!(service.orchestrator().get_stats()["p2"].error_count, 1);
}

#[tokio::test]
async fn test_all_sources_failed() {
    let service = build(&[
        MockAdapter::failing("p1", "down"),
        MockAdapter::failing("p2", "down"),
    ]);

    let err = service
        .fetch_fused(&quote_op(), &uncached())
        .await
        .unwrap_err();
    match &err {
        FusionError::AllSourcesFailed {
            operation,
            failed_sources,
        } => {
            assert_eq!(operation, "get_quote");
            assert_eq!(failed_sources, &vec!["p1".to_string(), "p2".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.kind(), "all_sources_failed");

    let stats = service.get_fusion_stats();
    assert_eq!(stats.fusion.all_sources_failed, 1);
    assert_eq!(stats.fusion.fusions, 0);

    let failed = service
        .lineage()
        .query(&LineageQuery::all().with_success(false));
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].source_id, FUSION_SOURCE_ID);
}

#[tokio::test(start_paused = true)]
async fn test_parallel_mode_dispatches_concurrently() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.0)).with_delay(Duration::from_millis(300)),
        MockAdapter::new("p2", full_quote(150.0)).with_delay(Duration::from_millis(300)),
    ]);

    let started = Instant::now();
    let outcome = service
        .fetch_fused(&quote_op(), &uncached().with_mode(FetchMode::Parallel))
        .await
        .unwrap();

    assert_eq!(outcome.result.metadata.sources.len(), 2);
    assert!(started.elapsed() < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn test_sequential_mode_dispatches_in_order() {
    let p1 = MockAdapter::new("p1", full_quote(150.0)).with_delay(Duration::from_millis(300));
    let p2 = MockAdapter::new("p2", full_quote(150.0)).with_delay(Duration::from_millis(300));
    let service = build(&[p1.clone(), p2.clone()]);

    let started = Instant::now();
    service
        .fetch_fused(
            &quote_op(),
            &uncached()
                .with_mode(FetchMode::Sequential)
                .with_providers(["p2", "p1"]),
        )
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(600));
    assert!(p2.call_times()[0] < p1.call_times()[0]);
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_does_not_block_others() {
    let service = build(&[
        MockAdapter::new("fast", full_quote(150.0)),
        MockAdapter::new("slow", full_quote(150.0)).with_delay(Duration::from_secs(5)),
    ]);

    let started = Instant::now();
    let outcome = service
        .fetch_fused(&quote_op(), &uncached().with_timeout_ms(500))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.result.metadata.sources, vec!["fast"]);
    assert_eq!(outcome.result.metadata.failed_sources, vec!["slow"]);
}

#[tokio::test]
async fn test_disabled_provider_is_not_a_candidate() {
    let p3 = MockAdapter::new("p3", full_quote(150.0));
    let service = build_with(
        &[
            MockAdapter::new("p1", full_quote(150.0)),
            MockAdapter::new("p2", full_quote(150.0)),
            p3.clone(),
        ],
        |d| {
            let disabled = d.id == "p3";
            d.with_enabled(!disabled)
        },
    );

    let outcome = service.fetch_fused(&quote_op(), &uncached()).await.unwrap();
    assert_eq!(outcome.result.metadata.sources.len(), 2);
    assert_eq!(p3.call_count(), 0);
}

#[tokio::test]
async fn test_explicit_disabled_provider_fails_without_dispatch() {
    let p2 = MockAdapter::new("p2", full_quote(150.0));
    p2.set_enabled(false);
    let service = build(&[MockAdapter::new("p1", full_quote(150.0)), p2.clone()]);

    let outcome = service
        .fetch_fused(&quote_op(), &uncached().with_providers(["p1", "p2"]))
        .await
        .unwrap();

    assert_eq!(outcome.result.metadata.failed_sources, vec!["p2"]);
    assert_eq!(p2.call_count(), 0);
}

#[tokio::test]
async fn test_fused_result_is_cached() {
    let p1 = MockAdapter::new("p1", full_quote(150.0));
    let p2 = MockAdapter::new("p2", full_quote(150.0));
    let service = build(&[p1.clone(), p2.clone()]);
    let options = FetchOptions::default().with_cache_ttl(60);

    let first = service.fetch_fused(&quote_op(), &options).await.unwrap();
    let second = service.fetch_fused(&quote_op(), &options).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert!(second.tracking_id.is_none());
    assert_eq!(first.result.payload, second.result.payload);
    assert_eq!(first.result.metadata.sources, second.result.metadata.sources);
    assert_eq!(p1.call_count(), 1);
    assert_eq!(p2.call_count(), 1);
    assert_eq!(service.metrics().cache_hits, 1);

    // A different strategy is a different fused result
    service
        .fetch_fused(&quote_op(), &options.clone().with_strategy(ConflictStrategy::MostRecent))
        .await
        .unwrap();
    assert_eq!(p1.call_count(), 2);
}

#[tokio::test]
async fn test_lineage_steps_follow_candidate_order() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.0)),
        MockAdapter::failing("p2", "down"),
    ]);

    let outcome = service
        .fetch_fused(&quote_op(), &uncached().with_providers(["p1", "p2"]))
        .await
        .unwrap();
    let id = outcome.tracking_id.unwrap();

    let record = service.lineage().get(id).unwrap();
    assert_eq!(record.source_id, FUSION_SOURCE_ID);
    assert_eq!(record.success, Some(true));
    assert_eq!(
        record.context.get("sources").map(String::as_str),
        Some("p1,p2")
    );
    assert_eq!(
        record.step_summary(),
        "transformation:fetch:p1|validation:schema:p1|quality_check:quality:p1|\
         validation:fetch:p2|transformation:fuse|quality_check:quality:fused"
    );
}

#[tokio::test]
async fn test_single_source_fetch_with_fallback() {
    let service = build(&[
        MockAdapter::failing("p1", "down"),
        MockAdapter::new("p2", full_quote(150.0)),
    ]);

    let outcome = service
        .fetch(
            &quote_op(),
            &InvokeOptions::default()
                .with_preferred_provider("p1")
                .with_cache_ttl(0),
        )
        .await
        .unwrap();

    assert_eq!(outcome.result.metadata.primary_source, "p2");
    assert_eq!(outcome.result.payload, full_quote(150.0));
    assert_eq!(outcome.result.metadata.conflicts, 0);

    let record = service.lineage().get(outcome.tracking_id.unwrap()).unwrap();
    assert_eq!(record.source_id, ORCHESTRATOR_SOURCE_ID);
    assert_eq!(record.steps[0].name, "fetch:p2");
    assert_eq!(record.steps.last().map(|s| s.name.as_str()), Some("fuse"));
}

#[tokio::test]
async fn test_single_source_fetch_failure() {
    let service = build(&[MockAdapter::failing("p1", "down")]);

    let err = service
        .fetch(&quote_op(), &InvokeOptions::default().with_cache_ttl(0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "provider_error");
    assert_eq!(service.lineage().stats().success_rate, 0.0);
    assert_eq!(service.metrics().all_sources_failed, 0);
}

#[tokio::test]
async fn test_fusion_stats_and_export() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.0)),
        MockAdapter::new("p2", partial_quote(155.0)),
    ]);

    service.fetch_fused(&quote_op(), &uncached()).await.unwrap();
    service
        .fetch(&quote_op(), &InvokeOptions::default().with_cache_ttl(0))
        .await
        .unwrap();

    let stats = service.get_fusion_stats();
    assert_eq!(stats.fusion.fusions, 2);
    assert_eq!(stats.fusion.single_source, 1);
    assert_eq!(stats.fusion.conflicts, 1);
    assert_eq!(stats.mean_sources_per_fusion, 1.5);
    assert!(stats.mean_fused_quality > 0.0);
    assert_eq!(stats.providers.len(), 2);
    assert!(stats.reputations.contains_key("p1"));
    assert_eq!(stats.lineage.total_finalized, 2);
    assert_eq!(stats.in_flight, 0);

    let csv = service.export_lineage_data(ExportFormat::Csv, None).unwrap();
    assert_eq!(csv.lines().count(), 3);

    let json = service.export_lineage_data(ExportFormat::Json, Some(1)).unwrap();
    let records: Vec<Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_no_candidates() {
    let service = build(&[]);
    let err = service
        .fetch_fused(&quote_op(), &uncached())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "no_provider_available");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_fetch_finalizes_session() {
    let service = build(&[
        MockAdapter::new("p1", full_quote(150.0)).with_delay(Duration::from_millis(500)),
        MockAdapter::new("p2", full_quote(150.0)).with_delay(Duration::from_millis(500)),
    ]);
    let single = InvokeOptions::default().with_cache_ttl(0);

    for _ in 0..2 {
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), service.fetch(&quote_op(), &single)).await;
        assert!(cancelled.is_err());
    }
    let cancelled = tokio::time::timeout(
        Duration::from_millis(20),
        service.fetch_fused(&quote_op(), &uncached()),
    )
    .await;
    assert!(cancelled.is_err());

    tokio::time::sleep(Duration::from_millis(700)).await;

    let stats = service.lineage().stats();
    assert_eq!(stats.active_sessions, 0);
    assert_eq!(stats.total_started, 3);
    assert_eq!(stats.total_finalized, 3);
    assert_eq!(stats.success_rate, 0.0);

    // A completed fetch is still finalized exactly once
    let outcome = service.fetch(&quote_op(), &single).await.unwrap();
    let record = service.lineage().get(outcome.tracking_id.unwrap()).unwrap();
    assert_eq!(record.success, Some(true));
    assert_eq!(service.lineage().stats().total_finalized, 4);
}
