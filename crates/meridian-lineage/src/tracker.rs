//! The Lineage Tracker
//!
//! Active sessions live in a map keyed by tracking id; finalized records move
//! into a bounded FIFO history. Aggregates over the retained history are kept
//! as running sums, so every event costs O(1).

use crate::export::export_records;
use crate::{
    ExportFormat, FinalizeOutcome, LineageConfig, LineageError, LineageGraph, LineageRecord,
    LineageStep, StepKind, TrackingId,
};
use meridian_domain::current_timestamp_ms;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Filter for [`LineageTracker::query`]
///
/// Unset fields match everything. Results are most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineageQuery {
    /// Match this source id
    #[serde(default)]
    pub source_id: Option<String>,

    /// Match this data type
    #[serde(default)]
    pub data_type: Option<String>,

    /// Match this outcome
    #[serde(default)]
    pub success: Option<bool>,

    /// Sessions started at or after this time (ms since epoch)
    #[serde(default)]
    pub since_ms: Option<u64>,

    /// Sessions started at or before this time (ms since epoch)
    #[serde(default)]
    pub until_ms: Option<u64>,

    /// Maximum number of records returned
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LineageQuery {
    /// Query matching every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a source
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    /// Restrict to a data type
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Restrict to an outcome
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Restrict to a start-time window
    pub fn between(mut self, since_ms: u64, until_ms: u64) -> Self {
        self.since_ms = Some(since_ms);
        self.until_ms = Some(until_ms);
        self
    }

    /// Cap the result size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, record: &LineageRecord) -> bool {
        self.source_id.as_ref().map_or(true, |s| *s == record.source_id)
            && self.data_type.as_ref().map_or(true, |d| *d == record.data_type)
            && self.success.map_or(true, |s| record.success == Some(s))
            && self.since_ms.map_or(true, |t| record.started_at >= t)
            && self.until_ms.map_or(true, |t| record.started_at <= t)
    }
}

/// Aggregates reported by [`LineageTracker::stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageStats {
    /// Sessions not yet finalized
    pub active_sessions: usize,
    /// Sessions started since creation
    pub total_started: u64,
    /// Sessions finalized since creation
    pub total_finalized: u64,
    /// Records currently retained
    pub retained: usize,
    /// Records evicted from the history
    pub evicted: u64,
    /// Success rate over retained records
    pub success_rate: f64,
    /// Mean end-to-end latency over retained records
    pub avg_latency_ms: f64,
}

#[derive(Default)]
struct TrackerState {
    active: HashMap<TrackingId, LineageRecord>,
    history: VecDeque<LineageRecord>,
    total_started: u64,
    total_finalized: u64,
    evicted: u64,
    retained_successes: u64,
    retained_latency_ms: u128,
}

impl TrackerState {
    fn retain(&mut self, record: LineageRecord) {
        self.retained_latency_ms += u128::from(record.latency_ms.unwrap_or(0));
        if record.success == Some(true) {
            self.retained_successes += 1;
        }
        self.history.push_back(record);
    }

    fn evict_oldest(&mut self) {
        if let Some(old) = self.history.pop_front() {
            self.retained_latency_ms -= u128::from(old.latency_ms.unwrap_or(0));
            if old.success == Some(true) {
                self.retained_successes -= 1;
            }
            self.evicted += 1;
        }
    }
}

/// Records the lineage of every operation
///
/// Safe to share across tasks; each call takes a short, non-suspending lock.
///
/// # Examples
///
/// ```
/// use meridian_lineage::{FinalizeOutcome, LineageConfig, LineageTracker};
/// use std::collections::BTreeMap;
///
/// let tracker = LineageTracker::new(LineageConfig::default());
/// let id = tracker.start_tracking("alpha", "get_quote", BTreeMap::new());
/// tracker.add_transformation(id, "fetch:alpha", "200 OK").unwrap();
/// tracker.add_validation(id, "schema", true, None).unwrap();
/// tracker.add_quality_check(id, "quality:alpha", 0.92, true).unwrap();
///
/// let record = tracker.finalize_tracking(id, FinalizeOutcome::success(42)).unwrap();
/// assert_eq!(record.steps.len(), 3);
/// assert!(tracker.finalize_tracking(id, FinalizeOutcome::success(42)).is_err());
/// ```
pub struct LineageTracker {
    config: LineageConfig,
    state: Mutex<TrackerState>,
}

impl LineageTracker {
    /// Create a tracker
    pub fn new(config: LineageConfig) -> Self {
        Self {
            config,
            state: Mutex::new(TrackerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracker configuration
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Open a session and return its id
    pub fn start_tracking(
        &self,
        source_id: &str,
        data_type: &str,
        context: BTreeMap<String, String>,
    ) -> TrackingId {
        let record = LineageRecord::start(
            source_id.to_string(),
            data_type.to_string(),
            context,
            current_timestamp_ms(),
        );
        let id = record.id;

        let mut state = self.lock();
        state.active.insert(id, record);
        state.total_started += 1;
        tracing::trace!("Started lineage session {} for {}", id, source_id);
        id
    }

    fn append(&self, id: TrackingId, step: LineageStep) -> Result<(), LineageError> {
        let mut state = self.lock();
        let record = state
            .active
            .get_mut(&id)
            .ok_or(LineageError::UnknownTrackingId(id))?;
        record.steps.push(step);
        Ok(())
    }

    /// Record a transformation step
    pub fn add_transformation(
        &self,
        id: TrackingId,
        name: &str,
        detail: impl Into<String>,
    ) -> Result<(), LineageError> {
        self.append(
            id,
            LineageStep {
                kind: StepKind::Transformation,
                name: name.to_string(),
                detail: Some(detail.into()),
                passed: None,
                score: None,
                recorded_at: current_timestamp_ms(),
            },
        )
    }

    /// Record a validation step
    pub fn add_validation(
        &self,
        id: TrackingId,
        name: &str,
        passed: bool,
        message: Option<String>,
    ) -> Result<(), LineageError> {
        self.append(
            id,
            LineageStep {
                kind: StepKind::Validation,
                name: name.to_string(),
                detail: message,
                passed: Some(passed),
                score: None,
                recorded_at: current_timestamp_ms(),
            },
        )
    }

    /// Record a quality-check step
    pub fn add_quality_check(
        &self,
        id: TrackingId,
        name: &str,
        score: f64,
        passed: bool,
    ) -> Result<(), LineageError> {
        self.append(
            id,
            LineageStep {
                kind: StepKind::QualityCheck,
                name: name.to_string(),
                detail: None,
                passed: Some(passed),
                score: Some(score),
                recorded_at: current_timestamp_ms(),
            },
        )
    }

    /// Close a session and move it into history
    ///
    /// Fails with `UnknownTrackingId` for ids that were never issued or are
    /// already finalized.
    pub fn finalize_tracking(
        &self,
        id: TrackingId,
        outcome: FinalizeOutcome,
    ) -> Result<LineageRecord, LineageError> {
        let mut state = self.lock();
        let mut record = state
            .active
            .remove(&id)
            .ok_or(LineageError::UnknownTrackingId(id))?;

        record.finalized_at = Some(current_timestamp_ms());
        record.latency_ms = Some(outcome.processing_time_ms);
        record.success = Some(outcome.success);

        state.total_finalized += 1;
        if self.config.max_history > 0 {
            while state.history.len() >= self.config.max_history {
                state.evict_oldest();
            }
            state.retain(record.clone());
        } else {
            state.evicted += 1;
        }

        tracing::debug!(
            "Finalized lineage session {} ({} steps, success={})",
            id,
            record.steps.len(),
            outcome.success
        );
        Ok(record)
    }

    /// Snapshot of an active session
    pub fn active(&self, id: TrackingId) -> Option<LineageRecord> {
        self.lock().active.get(&id).cloned()
    }

    /// Retained record with `id`
    pub fn get(&self, id: TrackingId) -> Option<LineageRecord> {
        self.lock().history.iter().rev().find(|r| r.id == id).cloned()
    }

    /// Retained records matching `query`, most recent first
    pub fn query(&self, query: &LineageQuery) -> Vec<LineageRecord> {
        let state = self.lock();
        let limit = query.limit.unwrap_or(usize::MAX);
        state
            .history
            .iter()
            .rev()
            .filter(|record| query.matches(record))
            .take(limit)
            .cloned()
            .collect()
    }

    /// The `limit` most recent records, most recent first
    pub fn recent(&self, limit: usize) -> Vec<LineageRecord> {
        self.query(&LineageQuery::all().with_limit(limit))
    }

    /// Graph over the `limit` most recent records
    pub fn graph(&self, limit: Option<usize>) -> LineageGraph {
        let records = self.recent(limit.unwrap_or(self.config.default_recent_limit));
        LineageGraph::build(records.iter().rev())
    }

    /// Export the `limit` most recent records
    pub fn export(&self, format: ExportFormat, limit: Option<usize>) -> Result<String, LineageError> {
        let records = self.recent(limit.unwrap_or(self.config.default_recent_limit));
        export_records(&records, format)
    }

    /// Running aggregates
    pub fn stats(&self) -> LineageStats {
        let state = self.lock();
        let retained = state.history.len();
        let (success_rate, avg_latency_ms) = if retained == 0 {
            (0.0, 0.0)
        } else {
            (
                state.retained_successes as f64 / retained as f64,
                state.retained_latency_ms as f64 / retained as f64,
            )
        };

        LineageStats {
            active_sessions: state.active.len(),
            total_started: state.total_started,
            total_finalized: state.total_finalized,
            retained,
            evicted: state.evicted,
            success_rate,
            avg_latency_ms,
        }
    }
}

impl Default for LineageTracker {
    fn default() -> Self {
        Self::new(LineageConfig::default())
    }
}
