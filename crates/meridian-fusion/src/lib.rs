//! Meridian Fusion
//!
//! Merges answers from several providers into one record and wraps the whole
//! fetch → score → fuse → lineage pipeline in a [`FusionService`].
//!
//! # Overview
//!
//! - **Engine**: pure field-by-field merge with relative numeric tolerance
//!   and a [`ConflictStrategy`](meridian_domain::ConflictStrategy) for
//!   disagreements
//! - **Service**: parallel or sequential multi-source fetch through the
//!   orchestrator, scoring, lineage recording and fused-result caching
//! - **Metrics**: fusion counters reported by
//!   [`FusionService::get_fusion_stats`]
//!
//! # Usage
//!
//! ```no_run
//! use meridian_domain::{ConflictStrategy, Operation};
//! use meridian_fusion::{FetchOptions, FusionService};
//! use meridian_lineage::LineageTracker;
//! use meridian_orchestrator::ProviderOrchestrator;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(orchestrator: Arc<ProviderOrchestrator>) -> Result<(), Box<dyn std::error::Error>> {
//! let service = FusionService::new(orchestrator, Arc::new(LineageTracker::default()));
//!
//! let outcome = service
//!     .fetch_fused(
//!         &Operation::new("get_quote", json!({"symbol": "AAPL"})),
//!         &FetchOptions::default().with_strategy(ConflictStrategy::Consensus),
//!     )
//!     .await?;
//! println!(
//!     "{} sources, {} conflicts",
//!     outcome.result.metadata.sources.len(),
//!     outcome.result.metadata.conflicts
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod engine;
mod error;
mod metrics;
mod options;
mod service;

pub use engine::{FusionEngine, ANONYMOUS_FIELD, FUSED_SOURCE};
pub use error::FusionError;
pub use metrics::FusionMetrics;
pub use options::{FetchMode, FetchOptions, FusionOptions, ToleranceConfig};
pub use service::{
    FusionOutcome, FusionService, FusionStats, FUSION_SOURCE_ID, ORCHESTRATOR_SOURCE_ID,
    QUALITY_PASS_THRESHOLD,
};
