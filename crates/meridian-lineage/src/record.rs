//! Lineage records and steps

use crate::TrackingId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a recorded step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Data was reshaped, fetched or merged
    Transformation,
    /// Data was checked against a rule
    Validation,
    /// Data was scored
    QualityCheck,
}

impl StepKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Transformation => "transformation",
            StepKind::Validation => "validation",
            StepKind::QualityCheck => "quality_check",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step in a lineage chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageStep {
    /// Step kind
    pub kind: StepKind,

    /// Short name (e.g. `fetch:alpha`, `schema`, `quality:alpha`)
    pub name: String,

    /// Free-form detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Outcome of a validation or quality check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,

    /// Score of a quality check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// When the step was recorded (ms since epoch)
    pub recorded_at: u64,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    /// Whether the operation produced a result
    pub success: bool,

    /// End-to-end processing time in milliseconds
    pub processing_time_ms: u64,
}

impl FinalizeOutcome {
    /// Successful session
    pub fn success(processing_time_ms: u64) -> Self {
        Self {
            success: true,
            processing_time_ms,
        }
    }

    /// Failed session
    pub fn failure(processing_time_ms: u64) -> Self {
        Self {
            success: false,
            processing_time_ms,
        }
    }
}

/// Trace of one operation: source, ordered steps and output
///
/// Append-only while active; immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    /// Tracking id
    pub id: TrackingId,

    /// Originating source (provider id, or `fusion` for multi-source sessions)
    pub source_id: String,

    /// Kind of data tracked (usually the operation name)
    pub data_type: String,

    /// Caller-supplied context
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Steps in call order
    pub steps: Vec<LineageStep>,

    /// Session start (ms since epoch)
    pub started_at: u64,

    /// Finalize time; `None` while active
    pub finalized_at: Option<u64>,

    /// End-to-end latency reported at finalize
    pub latency_ms: Option<u64>,

    /// Outcome reported at finalize
    pub success: Option<bool>,
}

impl LineageRecord {
    pub(crate) fn start(
        source_id: String,
        data_type: String,
        context: BTreeMap<String, String>,
        now: u64,
    ) -> Self {
        Self {
            id: TrackingId::new(),
            source_id,
            data_type,
            context,
            steps: Vec::new(),
            started_at: now,
            finalized_at: None,
            latency_ms: None,
            success: None,
        }
    }

    /// Whether the session has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }

    /// Steps of one kind, in call order
    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &LineageStep> {
        self.steps.iter().filter(move |step| step.kind == kind)
    }

    /// Transformation steps
    pub fn transformations(&self) -> Vec<&LineageStep> {
        self.steps_of(StepKind::Transformation).collect()
    }

    /// Validation steps
    pub fn validations(&self) -> Vec<&LineageStep> {
        self.steps_of(StepKind::Validation).collect()
    }

    /// Quality-check steps
    pub fn quality_checks(&self) -> Vec<&LineageStep> {
        self.steps_of(StepKind::QualityCheck).collect()
    }

    /// Steps flattened as `kind:name` joined by `|`
    pub fn step_summary(&self) -> String {
        self.steps
            .iter()
            .map(|step| format!("{}:{}", step.kind, step.name))
            .collect::<Vec<_>>()
            .join("|")
    }
}
