//! Quality score value objects
//!
//! A [`QualityScore`] is computed fresh for every provider response and never
//! mutated afterwards. The weights that combine its components into `overall`
//! are configuration, shared by the scorer and the fusion engine so that fused
//! scores stay comparable with per-response scores.

use serde::{Deserialize, Serialize};

/// Individual quality components, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// How recent the response is, decaying with age
    pub freshness: f64,

    /// Ratio of present to expected fields
    pub completeness: f64,

    /// Domain plausibility of the values
    pub accuracy: f64,

    /// Provider reputation at scoring time
    pub source_reputation: f64,

    /// Latency score, `max(0, 1 - latency_ms / 10000)`
    pub latency: f64,
}

impl QualityMetrics {
    /// Clamp every component into [0, 1]; NaN becomes 0
    pub fn clamped(self) -> Self {
        Self {
            freshness: clamp_unit(self.freshness),
            completeness: clamp_unit(self.completeness),
            accuracy: clamp_unit(self.accuracy),
            source_reputation: clamp_unit(self.source_reputation),
            latency: clamp_unit(self.latency),
        }
    }
}

/// Quality assessment of one response from one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Provider that produced the response
    pub source: String,

    /// Weighted combination of the metrics, in [0, 1]
    pub overall: f64,

    /// Component scores
    pub metrics: QualityMetrics,

    /// When the score was computed (ms since epoch)
    pub timestamp: u64,
}

impl QualityScore {
    /// Build a score from metrics using the given weights
    pub fn from_metrics(
        source: impl Into<String>,
        metrics: QualityMetrics,
        weights: &QualityWeights,
        timestamp: u64,
    ) -> Self {
        let metrics = metrics.clamped();
        Self {
            source: source.into(),
            overall: weights.combine(&metrics),
            metrics,
            timestamp,
        }
    }
}

/// Weights applied to each quality component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Weight of freshness
    #[serde(default = "default_freshness_weight")]
    pub freshness: f64,

    /// Weight of completeness
    #[serde(default = "default_completeness_weight")]
    pub completeness: f64,

    /// Weight of accuracy
    #[serde(default = "default_accuracy_weight")]
    pub accuracy: f64,

    /// Weight of source reputation
    #[serde(default = "default_reputation_weight")]
    pub reputation: f64,

    /// Weight of latency
    #[serde(default = "default_latency_weight")]
    pub latency: f64,
}

fn default_freshness_weight() -> f64 {
    0.3
}

fn default_completeness_weight() -> f64 {
    0.25
}

fn default_accuracy_weight() -> f64 {
    0.2
}

fn default_reputation_weight() -> f64 {
    0.15
}

fn default_latency_weight() -> f64 {
    0.1
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            freshness: default_freshness_weight(),
            completeness: default_completeness_weight(),
            accuracy: default_accuracy_weight(),
            reputation: default_reputation_weight(),
            latency: default_latency_weight(),
        }
    }
}

impl QualityWeights {
    /// Sum of all weights
    pub fn total(&self) -> f64 {
        self.freshness + self.completeness + self.accuracy + self.reputation + self.latency
    }

    /// Weighted sum of `metrics`, normalised by the total weight
    ///
    /// Negative weights are treated as zero. With no usable weight the plain
    /// mean is returned.
    pub fn combine(&self, metrics: &QualityMetrics) -> f64 {
        let parts = [
            (self.freshness, metrics.freshness),
            (self.completeness, metrics.completeness),
            (self.accuracy, metrics.accuracy),
            (self.reputation, metrics.source_reputation),
            (self.latency, metrics.latency),
        ];

        let total: f64 = parts.iter().map(|(w, _)| w.max(0.0)).sum();
        if total <= f64::EPSILON || !total.is_finite() {
            let mean = parts.iter().map(|(_, v)| v).sum::<f64>() / parts.len() as f64;
            return clamp_unit(mean);
        }

        let weighted: f64 = parts.iter().map(|(w, v)| w.max(0.0) * v).sum();
        clamp_unit(weighted / total)
    }
}

/// Clamp into [0, 1], mapping NaN to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
