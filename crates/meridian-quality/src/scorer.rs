//! Per-response quality scoring
//!
//! The scorer is a pure function of the response plus the current reputation
//! of its source. Reputation is mutated only through
//! [`QualityScorer::update_reputation`].

use crate::{assess, QualityConfig, ReputationRegistry};
use meridian_domain::quality::clamp_unit;
use meridian_domain::{current_timestamp_ms, DataDomain, Payload, QualityMetrics, QualityScore, QualityWeights};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Result of one completed dispatch attempt, fed into reputation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Whether the attempt returned data
    pub success: bool,

    /// Observed latency in milliseconds
    pub latency_ms: u64,
}

impl DispatchOutcome {
    /// Successful attempt
    pub fn success(latency_ms: u64) -> Self {
        Self {
            success: true,
            latency_ms,
        }
    }

    /// Failed attempt (error or timeout)
    pub fn failure(latency_ms: u64) -> Self {
        Self {
            success: false,
            latency_ms,
        }
    }
}

/// Quality Scorer
///
/// Cheap to clone; clones share the same reputation registry.
#[derive(Clone)]
pub struct QualityScorer {
    config: QualityConfig,
    reputation: Arc<ReputationRegistry>,
}

impl QualityScorer {
    /// Create a scorer with a fresh reputation registry
    pub fn new(config: QualityConfig) -> Self {
        let reputation = Arc::new(ReputationRegistry::new(
            config.reputation_alpha,
            config.neutral_reputation,
        ));
        Self { config, reputation }
    }

    /// Create a scorer around an existing (possibly shared) registry
    pub fn with_registry(config: QualityConfig, reputation: Arc<ReputationRegistry>) -> Self {
        Self { config, reputation }
    }

    /// Scoring configuration
    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Shared reputation registry
    pub fn reputation(&self) -> &Arc<ReputationRegistry> {
        &self.reputation
    }

    /// Weights combining components into `overall`
    pub fn weights(&self) -> &QualityWeights {
        &self.config.weights
    }

    /// Score one response against the current clock
    pub fn score(
        &self,
        source: &str,
        domain: DataDomain,
        payload: &Payload,
        response_timestamp: u64,
        latency_ms: u64,
    ) -> QualityScore {
        self.score_at(
            source,
            domain,
            payload,
            response_timestamp,
            latency_ms,
            current_timestamp_ms(),
        )
    }

    /// Score one response as seen at `now` (ms since epoch)
    pub fn score_at(
        &self,
        source: &str,
        domain: DataDomain,
        payload: &Payload,
        response_timestamp: u64,
        latency_ms: u64,
        now: u64,
    ) -> QualityScore {
        let metrics = QualityMetrics {
            freshness: self.freshness(domain, response_timestamp, now),
            completeness: completeness(domain, payload),
            accuracy: self.accuracy(domain, payload),
            source_reputation: self.reputation.get(source),
            latency: self.latency_score(latency_ms),
        };

        let score = QualityScore::from_metrics(source, metrics, &self.config.weights, now);
        tracing::trace!(
            "Scored {} response from {}: overall={:.3}",
            domain,
            source,
            score.overall
        );
        score
    }

    /// Freshness of a response: halves every domain horizon
    ///
    /// Timestamps in the future count as perfectly fresh.
    pub fn freshness(&self, domain: DataDomain, response_timestamp: u64, now: u64) -> f64 {
        if response_timestamp >= now {
            return 1.0;
        }
        let age_ms = (now - response_timestamp) as f64;
        let horizon_ms = self.config.freshness_horizon_ms(domain) as f64;
        clamp_unit(0.5_f64.powf(age_ms / horizon_ms))
    }

    /// Plausibility of a payload, neutral when no check applies
    pub fn accuracy(&self, domain: DataDomain, payload: &Payload) -> f64 {
        assess(domain, payload)
            .map(|report| report.score)
            .unwrap_or(self.config.neutral_accuracy)
    }

    /// `max(0, 1 - latency / ceiling)`
    pub fn latency_score(&self, latency_ms: u64) -> f64 {
        let ceiling = self.config.latency_ceiling_ms.max(1) as f64;
        clamp_unit(1.0 - latency_ms as f64 / ceiling)
    }

    /// Outcome score fed into reputation
    ///
    /// Failures score 0; successes score between `success_floor` and 1.0
    /// depending on latency.
    pub fn outcome_score(&self, outcome: DispatchOutcome) -> f64 {
        if !outcome.success {
            return 0.0;
        }
        let floor = clamp_unit(self.config.success_floor);
        floor + (1.0 - floor) * self.latency_score(outcome.latency_ms)
    }

    /// Fold a dispatch outcome into the reputation of `source`
    ///
    /// Returns the new reputation.
    pub fn update_reputation(&self, source: &str, outcome: DispatchOutcome) -> f64 {
        let outcome_score = self.outcome_score(outcome);
        let reputation = self.reputation.update(source, outcome_score);
        tracing::debug!(
            "Reputation of {} is now {:.3} (success={}, latency={}ms)",
            source,
            reputation,
            outcome.success,
            outcome.latency_ms
        );
        reputation
    }

    /// Current reputation of `source`
    pub fn reputation_of(&self, source: &str) -> f64 {
        self.reputation.get(source)
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

/// Ratio of present to expected fields
///
/// A field counts as present when it exists and is not null. Arrays score the
/// mean of their elements; scalars are complete when non-null.
pub fn completeness(domain: DataDomain, payload: &Payload) -> f64 {
    match payload {
        Value::Null => 0.0,
        Value::Object(object) => {
            let expected = domain.expected_fields();
            if expected.is_empty() {
                return if object.is_empty() { 0.0 } else { 1.0 };
            }
            let present = expected
                .iter()
                .filter(|field| matches!(object.get(**field), Some(v) if !v.is_null()))
                .count();
            present as f64 / expected.len() as f64
        }
        Value::Array(items) => {
            if items.is_empty() {
                return 0.0;
            }
            items.iter().map(|item| completeness(domain, item)).sum::<f64>() / items.len() as f64
        }
        Value::String(s) if s.is_empty() => 0.0,
        _ => 1.0,
    }
}

/// Source with the highest `overall`
///
/// The first of several equal maxima wins. Returns `None` for no scores.
pub fn select_best_source(scores: &[QualityScore]) -> Option<&str> {
    let mut best: Option<&QualityScore> = None;
    for score in scores {
        match best {
            Some(current) if score.overall <= current.overall => {}
            _ => best = Some(score),
        }
    }
    best.map(|score| score.source.as_str())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Property: overall and every component stay in [0, 1]
        #[test]
        fn test_score_bounded(
            price in -1.0e6f64..1.0e6,
            volume in -1.0e6f64..1.0e9,
            age_ms in 0u64..(90u64 * 24 * 3_600_000),
            latency_ms in 0u64..100_000,
        ) {
            let scorer = QualityScorer::default();
            let now = 1_700_000_000_000u64;
            let payload = json!({"symbol": "X", "price": price, "volume": volume});
            let score = scorer.score_at("p", DataDomain::MarketData, &payload, now - age_ms, latency_ms, now);

            prop_assert!((0.0..=1.0).contains(&score.overall));
            prop_assert!((0.0..=1.0).contains(&score.metrics.freshness));
            prop_assert!((0.0..=1.0).contains(&score.metrics.completeness));
            prop_assert!((0.0..=1.0).contains(&score.metrics.accuracy));
            prop_assert!((0.0..=1.0).contains(&score.metrics.latency));
        }
    }
}
