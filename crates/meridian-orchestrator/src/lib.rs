//! Meridian Provider Orchestrator
//!
//! Routes logical operations to upstream providers with health-aware ranking,
//! per-provider rate limiting, in-flight deduplication, cache short-circuiting
//! and one bounded fallback.
//!
//! # Overview
//!
//! - **Registry**: providers, their adapters and [`ConnectionStats`]
//! - **Operation table**: static operation → providers mapping from TOML
//! - **Ranking**: `(1 - error_rate) * 0.4 + latency_score * 0.3 + reputation * 0.3`
//! - **Dispatch**: FIFO rate gate, hard deadline, shared in-flight results
//! - **Fallback**: at most two attempts per invoke
//! - **Testing**: [`MockAdapter`] for deterministic providers
//! - **Health**: on-demand [`ProviderOrchestrator::refresh_health`] or a
//!   scheduled [`HealthWorker`]
//!
//! # Usage
//!
//! ```no_run
//! use meridian_domain::Operation;
//! use meridian_orchestrator::{InvokeOptions, MemoryCache, OrchestratorConfig, ProviderOrchestrator};
//! use meridian_quality::QualityScorer;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(adapters: Vec<Arc<dyn meridian_domain::ProviderAdapter>>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OrchestratorConfig::from_file("meridian.toml")?;
//! let orchestrator = ProviderOrchestrator::from_config(&config, adapters, QualityScorer::default())?
//!     .with_cache(Arc::new(MemoryCache::new()));
//!
//! let quote = orchestrator
//!     .invoke(
//!         &Operation::new("get_quote", json!({"symbol": "AAPL"})),
//!         &InvokeOptions::default().with_cache_ttl(30),
//!     )
//!     .await?;
//! println!("{} answered in {}ms", quote.provider, quote.latency_ms);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod health;
mod inflight;
mod mock;
mod operations;
mod orchestrator;
mod rate_gate;
mod registry;
mod stats;

pub use cache::{matches_pattern, MemoryCache};
pub use config::{InvokeDefaults, OrchestratorConfig, MAX_CACHE_TTL_SECS};
pub use error::{ConfigError, OrchestratorError};
pub use health::HealthWorker;
pub use inflight::{DispatchResult, DispatchSuccess};
pub use mock::MockAdapter;
pub use operations::{OperationRoute, OperationTable};
pub use orchestrator::{InvokeOptions, InvokeOutcome, Priority, ProviderOrchestrator, MAX_ATTEMPTS};
pub use rate_gate::RateGate;
pub use registry::{ProviderRegistry, RegisteredProvider};
pub use stats::{ConnectionStats, ProviderStats};
