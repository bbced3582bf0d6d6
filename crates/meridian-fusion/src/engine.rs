//! The Fusion Engine
//!
//! Merges scored responses for the same logical entity field by field. Inputs
//! are ranked once (overall quality descending, then source id) and every
//! decision walks that ranking, so the result does not depend on input order.

use crate::{FusionError, FusionOptions};
use meridian_domain::{
    current_timestamp_ms, ConflictStrategy, FusedResult, FusionInput, FusionMetadata, Payload,
    QualityMetrics, QualityScore, QualityWeights,
};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Field name under which non-object payloads are fused
pub const ANONYMOUS_FIELD: &str = "value";

/// Source name of aggregate quality scores
pub const FUSED_SOURCE: &str = "fused";

/// One usable input with its payload unwrapped
struct Contributor<'a> {
    input: &'a FusionInput,
    payload: &'a Payload,
}

impl<'a> Contributor<'a> {
    fn source(&self) -> &'a str {
        &self.input.source
    }

    fn field(&self, name: &str) -> Option<&'a Value> {
        match self.payload {
            Value::Object(object) => object.get(name),
            other if name == ANONYMOUS_FIELD => Some(other),
            _ => None,
        }
    }

    fn field_names(&self) -> Vec<&'a str> {
        match self.payload {
            Value::Object(object) => object.keys().map(String::as_str).collect(),
            _ => vec![ANONYMOUS_FIELD],
        }
    }
}

fn rank_order(a: &Contributor<'_>, b: &Contributor<'_>) -> Ordering {
    b.input
        .quality
        .overall
        .total_cmp(&a.input.quality.overall)
        .then_with(|| a.input.source.cmp(&b.input.source))
        .then_with(|| b.input.response_timestamp.cmp(&a.input.response_timestamp))
}

/// Whether two numbers are within `tolerance` of the larger magnitude
fn numbers_agree(a: f64, b: f64, tolerance: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= tolerance * a.abs().max(b.abs())
}

/// Numbers agree within tolerance; everything else by equality
fn values_agree(a: &Value, b: &Value, tolerance: f64) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => numbers_agree(x, y, tolerance),
            _ => x == y,
        },
        _ => a == b,
    }
}

type Candidate<'c, 'a> = (&'c Contributor<'a>, &'a Value);

/// Pick the winning value of a disagreeing field
///
/// `values` is in rank order, so index 0 is the highest-quality contributor.
fn resolve<'c, 'a>(
    strategy: ConflictStrategy,
    values: &[Candidate<'c, 'a>],
    tolerance: f64,
) -> Candidate<'c, 'a> {
    match strategy {
        ConflictStrategy::HighestQuality => values[0],
        ConflictStrategy::MostRecent => {
            let mut best = values[0];
            for &candidate in &values[1..] {
                if candidate.0.input.response_timestamp > best.0.input.response_timestamp {
                    best = candidate;
                }
            }
            best
        }
        ConflictStrategy::Consensus => {
            if values.len() < 3 {
                return values[0];
            }
            // (index of the highest-ranked member, member count)
            let mut clusters: Vec<(usize, usize)> = Vec::new();
            for (index, (_, value)) in values.iter().enumerate() {
                match clusters
                    .iter_mut()
                    .find(|(rep, _)| values_agree(values[*rep].1, value, tolerance))
                {
                    Some(cluster) => cluster.1 += 1,
                    None => clusters.push((index, 1)),
                }
            }
            clusters
                .iter()
                .find(|(_, count)| count * 2 > values.len())
                .map(|(rep, _)| values[*rep])
                .unwrap_or(values[0])
        }
    }
}

/// The Fusion Engine
///
/// Pure: no I/O and no shared state. The weights recompute the aggregate
/// `overall` so fused scores stay comparable with per-response scores.
///
/// # Examples
///
/// ```
/// use meridian_domain::{FusionInput, QualityMetrics, QualityScore, QualityWeights};
/// use meridian_fusion::{FusionEngine, FusionOptions};
/// use serde_json::json;
///
/// let score = |source: &str, q: f64| {
///     let metrics = QualityMetrics {
///         freshness: q,
///         completeness: q,
///         accuracy: q,
///         source_reputation: q,
///         latency: q,
///     };
///     QualityScore::from_metrics(source, metrics, &QualityWeights::default(), 0)
/// };
///
/// let engine = FusionEngine::default();
/// let result = engine
///     .fuse(
///         &[
///             FusionInput::new("p1", json!({"price": 150.00}), score("p1", 0.9), 1, 10),
///             FusionInput::new("p2", json!({"price": 150.02}), score("p2", 0.8), 1, 10),
///         ],
///         &FusionOptions::default(),
///     )
///     .unwrap();
///
/// assert_eq!(result.metadata.conflicts, 0);
/// assert_eq!(result.metadata.primary_source, "p1");
/// assert_eq!(result.payload["price"], json!(150.00));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    weights: QualityWeights,
}

impl FusionEngine {
    /// Create an engine using `weights` for aggregate scores
    pub fn new(weights: QualityWeights) -> Self {
        Self { weights }
    }

    /// Weights used for aggregate scores
    pub fn weights(&self) -> &QualityWeights {
        &self.weights
    }

    /// Merge `inputs` into one record
    ///
    /// Inputs without a payload are excluded and listed as failed sources.
    /// With a single usable input the payload passes through unchanged.
    pub fn fuse(
        &self,
        inputs: &[FusionInput],
        options: &FusionOptions,
    ) -> Result<FusedResult, FusionError> {
        let mut failed_sources: Vec<String> = inputs
            .iter()
            .filter(|input| !input.is_usable())
            .map(|input| input.source.clone())
            .collect();
        failed_sources.sort();
        failed_sources.dedup();

        let mut contributors: Vec<Contributor<'_>> = inputs
            .iter()
            .filter_map(|input| match &input.payload {
                Some(payload) if !payload.is_null() => Some(Contributor { input, payload }),
                _ => None,
            })
            .collect();

        if contributors.is_empty() {
            return Err(FusionError::AllSourcesFailed {
                operation: String::new(),
                failed_sources,
            });
        }

        contributors.sort_by(rank_order);

        let result = if contributors.len() == 1 {
            self.pass_through(&contributors[0], failed_sources, options.strategy)
        } else {
            self.merge(&contributors, failed_sources, options)
        };

        tracing::debug!(
            "Fused {} sources (primary: {}, conflicts: {}, strategy: {})",
            result.metadata.sources.len(),
            result.metadata.primary_source,
            result.metadata.conflicts,
            options.strategy.as_str()
        );
        Ok(result)
    }

    fn pass_through(
        &self,
        only: &Contributor<'_>,
        failed_sources: Vec<String>,
        strategy: ConflictStrategy,
    ) -> FusedResult {
        let field_sources = only
            .field_names()
            .into_iter()
            .map(|field| (field.to_string(), only.source().to_string()))
            .collect();

        FusedResult {
            payload: only.payload.clone(),
            metadata: FusionMetadata {
                sources: vec![only.source().to_string()],
                primary_source: only.source().to_string(),
                conflicts: 0,
                conflicting_fields: Vec::new(),
                strategy,
                quality_score: only.input.quality.clone(),
                field_sources,
                failed_sources,
                fused_at: current_timestamp_ms(),
            },
        }
    }

    fn merge(
        &self,
        contributors: &[Contributor<'_>],
        failed_sources: Vec<String>,
        options: &FusionOptions,
    ) -> FusedResult {
        let field_names: BTreeSet<&str> = contributors
            .iter()
            .flat_map(Contributor::field_names)
            .collect();

        let mut merged = Map::new();
        let mut field_sources = BTreeMap::new();
        let mut conflicting_fields = Vec::new();

        for field in field_names {
            let values: Vec<Candidate<'_, '_>> = contributors
                .iter()
                .filter_map(|c| c.field(field).filter(|v| !v.is_null()).map(|v| (c, v)))
                .collect();

            if values.is_empty() {
                // Every contributor sent null
                if let Some(c) = contributors.iter().find(|c| c.field(field).is_some()) {
                    merged.insert(field.to_string(), Value::Null);
                    field_sources.insert(field.to_string(), c.source().to_string());
                }
                continue;
            }

            let tolerance = options.tolerance.for_field(field);
            let agree = values
                .iter()
                .enumerate()
                .all(|(i, (_, a))| values[i + 1..].iter().all(|(_, b)| values_agree(a, b, tolerance)));

            let (winner, value) = if agree {
                values[0]
            } else {
                conflicting_fields.push(field.to_string());
                resolve(options.strategy, &values, tolerance)
            };

            merged.insert(field.to_string(), value.clone());
            field_sources.insert(field.to_string(), winner.source().to_string());
        }

        let payload = if contributors.iter().all(|c| !c.payload.is_object()) {
            merged.remove(ANONYMOUS_FIELD).unwrap_or(Value::Null)
        } else {
            Value::Object(merged)
        };

        let quality_score = self.aggregate_score(contributors, &field_sources);
        FusedResult {
            payload,
            metadata: FusionMetadata {
                sources: contributors.iter().map(|c| c.source().to_string()).collect(),
                primary_source: contributors[0].source().to_string(),
                conflicts: conflicting_fields.len(),
                conflicting_fields,
                strategy: options.strategy,
                quality_score,
                field_sources,
                failed_sources,
                fused_at: current_timestamp_ms(),
            },
        }
    }

    /// Best component across contributors; reputation weighted by fields supplied
    fn aggregate_score(
        &self,
        contributors: &[Contributor<'_>],
        field_sources: &BTreeMap<String, String>,
    ) -> QualityScore {
        let best = |component: fn(&QualityMetrics) -> f64| {
            contributors
                .iter()
                .map(|c| component(&c.input.quality.metrics))
                .fold(0.0_f64, f64::max)
        };

        let mut supplied: BTreeMap<&str, usize> = BTreeMap::new();
        for source in field_sources.values() {
            *supplied.entry(source.as_str()).or_insert(0) += 1;
        }

        let (weighted, total) = contributors
            .iter()
            .filter_map(|c| supplied.get(c.source()).map(|n| (c, *n as f64)))
            .fold((0.0, 0.0), |(sum, total), (c, n)| {
                (sum + c.input.quality.metrics.source_reputation * n, total + n)
            });
        let source_reputation = if total > 0.0 {
            weighted / total
        } else {
            contributors[0].input.quality.metrics.source_reputation
        };

        let metrics = QualityMetrics {
            freshness: best(|m| m.freshness),
            completeness: best(|m| m.completeness),
            accuracy: best(|m| m.accuracy),
            source_reputation,
            latency: best(|m| m.latency),
        };
        QualityScore::from_metrics(FUSED_SOURCE, metrics, &self.weights, current_timestamp_ms())
    }
}
