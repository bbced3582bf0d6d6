//! Fusion value objects

use crate::{Payload, QualityScore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One provider's answer, prepared for fusion
///
/// `payload` is `None` when the fetch failed; such inputs are excluded from the
/// merge and reported as failed sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionInput {
    /// Provider identifier
    pub source: String,

    /// Response payload, if the fetch succeeded
    pub payload: Option<Payload>,

    /// Quality assessment of the response
    pub quality: QualityScore,

    /// When the provider answered (ms since epoch)
    pub response_timestamp: u64,

    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

impl FusionInput {
    /// Create an input from a successful response
    pub fn new(
        source: impl Into<String>,
        payload: Payload,
        quality: QualityScore,
        response_timestamp: u64,
        latency_ms: u64,
    ) -> Self {
        Self {
            source: source.into(),
            payload: Some(payload),
            quality,
            response_timestamp,
            latency_ms,
        }
    }

    /// Create an input for a failed fetch
    pub fn failed(source: impl Into<String>, quality: QualityScore, latency_ms: u64) -> Self {
        Self {
            source: source.into(),
            payload: None,
            quality,
            response_timestamp: 0,
            latency_ms,
        }
    }

    /// Whether this input carries usable data
    pub fn is_usable(&self) -> bool {
        matches!(&self.payload, Some(p) if !p.is_null())
    }
}

/// How disagreements between sources are resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Take the value from the source with the best overall quality
    #[default]
    HighestQuality,

    /// Take the value from the most recent response
    MostRecent,

    /// Take the strict-majority value among three or more sources,
    /// otherwise fall back to `HighestQuality`
    Consensus,
}

impl ConflictStrategy {
    /// Get the strategy name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::HighestQuality => "highest_quality",
            ConflictStrategy::MostRecent => "most_recent",
            ConflictStrategy::Consensus => "consensus",
        }
    }

    /// Parse a strategy from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "highest_quality" => Some(ConflictStrategy::HighestQuality),
            "most_recent" => Some(ConflictStrategy::MostRecent),
            "consensus" => Some(ConflictStrategy::Consensus),
            _ => None,
        }
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid conflict strategy: {}", s))
    }
}

/// Metadata describing how a fused record was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionMetadata {
    /// Sources whose payloads took part in the merge
    pub sources: Vec<String>,

    /// Source with the best overall quality
    pub primary_source: String,

    /// Number of fields on which sources disagreed beyond tolerance
    pub conflicts: usize,

    /// Names of the conflicting fields
    #[serde(default)]
    pub conflicting_fields: Vec<String>,

    /// Strategy used to resolve conflicts
    pub strategy: ConflictStrategy,

    /// Aggregate quality of the fused record
    pub quality_score: QualityScore,

    /// Which source supplied each output field
    #[serde(default)]
    pub field_sources: BTreeMap<String, String>,

    /// Sources that were asked but returned nothing
    #[serde(default)]
    pub failed_sources: Vec<String>,

    /// When the fusion happened (ms since epoch)
    pub fused_at: u64,
}

/// A merged record plus its fusion metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    /// Merged payload
    pub payload: Payload,

    /// How the payload was produced
    pub metadata: FusionMetadata,
}
