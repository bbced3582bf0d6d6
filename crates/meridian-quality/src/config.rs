//! Configuration for quality scoring
//!
//! Weights, the reputation smoothing constant and the neutral defaults are all
//! parameters; none of them is part of the scoring contract.

use crate::QualityError;
use meridian_domain::{DataDomain, QualityWeights};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for the Quality Scorer
///
/// # Examples
///
/// ```
/// use meridian_quality::QualityConfig;
///
/// // Balanced defaults
/// let config = QualityConfig::default();
/// assert_eq!(config.reputation_alpha, 0.1);
///
/// // Real-time feeds: freshness and latency dominate
/// let config = QualityConfig::realtime();
/// assert!(config.weights.freshness > QualityConfig::default().weights.freshness);
///
/// // Archival data: completeness and accuracy dominate
/// let config = QualityConfig::archival();
/// assert!(config.weights.completeness > QualityConfig::default().weights.completeness);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Weights combining the components into `overall`
    #[serde(default)]
    pub weights: QualityWeights,

    /// Reputation smoothing constant α in `rep' = rep*(1-α) + outcome*α`
    /// Default: 0.1
    #[serde(default = "default_alpha")]
    pub reputation_alpha: f64,

    /// Reputation of a provider with no history
    /// Default: 0.5
    #[serde(default = "default_neutral_reputation")]
    pub neutral_reputation: f64,

    /// Accuracy used when no plausibility check applies to a payload
    /// Default: 0.85 (inside the neutral 0.7–1.0 band)
    #[serde(default = "default_neutral_accuracy")]
    pub neutral_accuracy: f64,

    /// Latency at which the latency score reaches zero, in milliseconds
    /// Default: 10000
    #[serde(default = "default_latency_ceiling")]
    pub latency_ceiling_ms: u64,

    /// Outcome score of a successful dispatch with zero latency is 1.0; with
    /// latency at the ceiling it is this floor
    /// Default: 0.7
    #[serde(default = "default_success_floor")]
    pub success_floor: f64,

    /// Per-domain freshness half-life overrides, keyed by domain name
    #[serde(default)]
    pub freshness_horizons_ms: BTreeMap<String, u64>,
}

fn default_alpha() -> f64 {
    0.1
}

fn default_neutral_reputation() -> f64 {
    0.5
}

fn default_neutral_accuracy() -> f64 {
    0.85
}

fn default_latency_ceiling() -> u64 {
    10_000
}

fn default_success_floor() -> f64 {
    0.7
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            reputation_alpha: default_alpha(),
            neutral_reputation: default_neutral_reputation(),
            neutral_accuracy: default_neutral_accuracy(),
            latency_ceiling_ms: default_latency_ceiling(),
            success_floor: default_success_floor(),
            freshness_horizons_ms: BTreeMap::new(),
        }
    }
}

impl QualityConfig {
    /// Configuration for real-time feeds
    ///
    /// - Freshness 0.4, latency 0.2
    /// - Faster reputation response (α = 0.2)
    /// - Market data half-life shortened to one minute
    pub fn realtime() -> Self {
        let mut freshness_horizons_ms = BTreeMap::new();
        freshness_horizons_ms.insert(DataDomain::MarketData.as_str().to_string(), 60_000);

        Self {
            weights: QualityWeights {
                freshness: 0.4,
                completeness: 0.15,
                accuracy: 0.15,
                reputation: 0.1,
                latency: 0.2,
            },
            reputation_alpha: 0.2,
            latency_ceiling_ms: 5_000,
            freshness_horizons_ms,
            ..Self::default()
        }
    }

    /// Configuration for archival / end-of-day data
    ///
    /// - Completeness 0.35, accuracy 0.3
    /// - Slower reputation response (α = 0.05)
    pub fn archival() -> Self {
        Self {
            weights: QualityWeights {
                freshness: 0.1,
                completeness: 0.35,
                accuracy: 0.3,
                reputation: 0.2,
                latency: 0.05,
            },
            reputation_alpha: 0.05,
            latency_ceiling_ms: 30_000,
            ..Self::default()
        }
    }

    /// Freshness half-life for a domain, honouring overrides
    pub fn freshness_horizon_ms(&self, domain: DataDomain) -> u64 {
        self.freshness_horizons_ms
            .get(domain.as_str())
            .copied()
            .unwrap_or_else(|| domain.freshness_horizon_ms())
            .max(1)
    }

    /// Check ranges of the tunable constants
    pub fn validate(&self) -> Result<(), QualityError> {
        if !(self.reputation_alpha > 0.0 && self.reputation_alpha <= 1.0) {
            return Err(QualityError::InvalidConfig(format!(
                "reputation_alpha {} is outside (0.0, 1.0]",
                self.reputation_alpha
            )));
        }

        for (name, value) in [
            ("neutral_reputation", self.neutral_reputation),
            ("neutral_accuracy", self.neutral_accuracy),
            ("success_floor", self.success_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(QualityError::InvalidConfig(format!(
                    "{} {} is outside [0.0, 1.0]",
                    name, value
                )));
            }
        }

        if self.weights.total() <= 0.0 {
            return Err(QualityError::InvalidConfig(
                "quality weights must not all be zero".to_string(),
            ));
        }

        for key in self.freshness_horizons_ms.keys() {
            if DataDomain::parse(key).is_none() {
                return Err(QualityError::InvalidConfig(format!(
                    "unknown data domain in freshness_horizons_ms: {}",
                    key
                )));
            }
        }

        Ok(())
    }
}
