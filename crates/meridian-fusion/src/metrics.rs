//! Metrics collection for fusion operations

use meridian_domain::{ConflictStrategy, FusedResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics collected by the Fusion Service
///
/// Tracks fusions, conflicts, strategy usage and total failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionMetrics {
    /// Fusions completed (cache hits excluded)
    pub fusions: u64,

    /// Fusions that used a single source
    pub single_source: u64,

    /// Conflicting fields across all fusions
    pub conflicts: u64,

    /// Fusions per conflict strategy
    pub strategy_usage: BTreeMap<String, u64>,

    /// Fetches where every source failed
    pub all_sources_failed: u64,

    /// Fused results served from the cache
    pub cache_hits: u64,

    /// Sources used across all fusions
    pub total_sources: u64,

    /// Sum of fused `overall` scores
    pub total_quality: f64,
}

impl FusionMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed fusion
    pub fn record_fusion(&mut self, result: &FusedResult) {
        let metadata = &result.metadata;
        self.fusions += 1;
        if metadata.sources.len() == 1 {
            self.single_source += 1;
        }
        self.conflicts += metadata.conflicts as u64;
        self.total_sources += metadata.sources.len() as u64;
        self.total_quality += metadata.quality_score.overall;
        self.record_strategy(metadata.strategy);
    }

    fn record_strategy(&mut self, strategy: ConflictStrategy) {
        *self
            .strategy_usage
            .entry(strategy.as_str().to_string())
            .or_insert(0) += 1;
    }

    /// Record a fetch where every source failed
    pub fn record_all_failed(&mut self) {
        self.all_sources_failed += 1;
    }

    /// Record a fused result served from the cache
    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    /// Mean number of sources per fusion
    pub fn mean_sources_per_fusion(&self) -> f64 {
        if self.fusions == 0 {
            0.0
        } else {
            self.total_sources as f64 / self.fusions as f64
        }
    }

    /// Mean `overall` of fused results
    pub fn mean_quality(&self) -> f64 {
        if self.fusions == 0 {
            0.0
        } else {
            self.total_quality / self.fusions as f64
        }
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Fusion Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Fusions: {}", self.fusions),
            format!("Single-source fusions: {}", self.single_source),
            format!("Conflicts: {}", self.conflicts),
            format!("All sources failed: {}", self.all_sources_failed),
            format!("Cache hits: {}", self.cache_hits),
            format!("Mean sources per fusion: {:.2}", self.mean_sources_per_fusion()),
            format!("Mean quality: {:.3}", self.mean_quality()),
        ];

        if !self.strategy_usage.is_empty() {
            lines.push(String::new());
            lines.push("Strategy usage:".to_string());
            for (strategy, count) in &self.strategy_usage {
                lines.push(format!("  {}: {}", strategy, count));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_domain::{FusionMetadata, QualityMetrics, QualityScore, QualityWeights};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn result(sources: &[&str], conflicts: usize, strategy: ConflictStrategy) -> FusedResult {
        let metrics = QualityMetrics {
            freshness: 0.8,
            completeness: 0.8,
            accuracy: 0.8,
            source_reputation: 0.8,
            latency: 0.8,
        };
        FusedResult {
            payload: json!({}),
            metadata: FusionMetadata {
                sources: sources.iter().map(|s| s.to_string()).collect(),
                primary_source: sources[0].to_string(),
                conflicts,
                conflicting_fields: Vec::new(),
                strategy,
                quality_score: QualityScore::from_metrics("fused", metrics, &QualityWeights::default(), 0),
                field_sources: BTreeMap::new(),
                failed_sources: Vec::new(),
                fused_at: 0,
            },
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = FusionMetrics::new();
        assert_eq!(metrics.fusions, 0);
        assert_eq!(metrics.mean_sources_per_fusion(), 0.0);
        assert_eq!(metrics.mean_quality(), 0.0);
    }

    #[test]
    fn test_record_fusion() {
        let mut metrics = FusionMetrics::new();
        metrics.record_fusion(&result(&["p1"], 0, ConflictStrategy::HighestQuality));
        metrics.record_fusion(&result(&["p1", "p2", "p3"], 2, ConflictStrategy::Consensus));

        assert_eq!(metrics.fusions, 2);
        assert_eq!(metrics.single_source, 1);
        assert_eq!(metrics.conflicts, 2);
        assert_eq!(metrics.mean_sources_per_fusion(), 2.0);
        assert!((metrics.mean_quality() - 0.8).abs() < 1e-9);
        assert_eq!(metrics.strategy_usage["consensus"], 1);
        assert_eq!(metrics.strategy_usage["highest_quality"], 1);
    }

    #[test]
    fn test_reset() {
        let mut metrics = FusionMetrics::new();
        metrics.record_fusion(&result(&["p1"], 0, ConflictStrategy::MostRecent));
        metrics.record_all_failed();
        metrics.record_cache_hit();

        metrics.reset();
        assert_eq!(metrics, FusionMetrics::default());
    }

    #[test]
    fn test_summary() {
        let mut metrics = FusionMetrics::new();
        metrics.record_fusion(&result(&["p1", "p2"], 1, ConflictStrategy::MostRecent));
        metrics.record_all_failed();

        let summary = metrics.summary();
        assert!(summary.contains("Fusions: 1"));
        assert!(summary.contains("Conflicts: 1"));
        assert!(summary.contains("All sources failed: 1"));
        assert!(summary.contains("most_recent: 1"));
    }
}
