//! Meridian Domain Layer
//!
//! Core value types and trait boundaries shared by every Meridian crate.
//! Nothing in here performs I/O; adapters and caches are described as traits
//! and implemented elsewhere (or by the host process).
//!
//! ## Key Concepts
//!
//! - **Operation**: a named logical request plus canonicalized parameters
//! - **Provider**: an upstream source described by a [`ProviderDescriptor`]
//! - **Data domain**: market data, fundamentals, filings, economic indicators,
//!   web intelligence; drives freshness horizons, schemas and tolerances
//! - **Quality score**: point-in-time assessment of one provider response
//! - **Fusion**: one merged record built from several scored responses
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator ──> ProviderAdapter (trait)      Cache (trait)
//!      │
//!      └──> QualityScore ──> FusionInput ──> FusedResult
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod domain;
pub mod fusion;
pub mod operation;
pub mod provider;
pub mod quality;
pub mod traits;

// Re-exports for convenience
pub use clock::current_timestamp_ms;
pub use domain::DataDomain;
pub use fusion::{ConflictStrategy, FusedResult, FusionInput, FusionMetadata};
pub use operation::{canonicalize, Operation};
pub use provider::{ProviderDescriptor, MAX_MIN_INTERVAL};
pub use quality::{QualityMetrics, QualityScore, QualityWeights};
pub use traits::{AdapterResponse, Cache, CacheMetadata, CachedValue, ProviderAdapter};

/// Payloads exchanged with providers are arbitrary JSON documents
pub type Payload = serde_json::Value;
