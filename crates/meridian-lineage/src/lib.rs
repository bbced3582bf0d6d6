//! Meridian Lineage Tracker
//!
//! Records where every piece of data came from and what happened to it on the
//! way out: the originating source, each transformation, validation and
//! quality check in call order, and the final outcome.
//!
//! # Overview
//!
//! - **Sessions**: opened with [`LineageTracker::start_tracking`], appended to
//!   while active, closed exactly once with
//!   [`LineageTracker::finalize_tracking`]
//! - **History**: finalized records in a bounded FIFO
//!   (`LineageConfig::max_history`)
//! - **Aggregates**: success rate and mean latency kept as running sums
//! - **Queries**: filter by source, data type, outcome and time window
//! - **Graph**: source → steps → output chains via [`LineageGraph`]
//! - **Export**: JSON or CSV via [`ExportFormat`]
//!
//! # Usage
//!
//! ```
//! use meridian_lineage::{ExportFormat, FinalizeOutcome, LineageQuery, LineageTracker};
//! use std::collections::BTreeMap;
//!
//! let tracker = LineageTracker::default();
//! let id = tracker.start_tracking("alpha", "get_quote", BTreeMap::new());
//! tracker.add_transformation(id, "fetch:alpha", "200 OK").unwrap();
//! tracker.finalize_tracking(id, FinalizeOutcome::success(12)).unwrap();
//!
//! let alpha = tracker.query(&LineageQuery::all().with_source("alpha"));
//! assert_eq!(alpha.len(), 1);
//!
//! let csv = tracker.export(ExportFormat::Csv, None).unwrap();
//! assert!(csv.starts_with("tracking_id,"));
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod export;
mod graph;
mod id;
mod record;
mod tracker;

pub use config::LineageConfig;
pub use error::LineageError;
pub use export::{export_records, ExportFormat};
pub use graph::{GraphEdge, GraphNode, LineageGraph, NodeKind};
pub use id::TrackingId;
pub use record::{FinalizeOutcome, LineageRecord, LineageStep, StepKind};
pub use tracker::{LineageQuery, LineageStats, LineageTracker};
