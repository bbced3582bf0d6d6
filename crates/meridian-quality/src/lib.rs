//! Meridian Quality Scorer
//!
//! Scores individual provider responses and maintains a per-provider
//! reputation.
//!
//! # Overview
//!
//! - **Scoring**: freshness, completeness, accuracy, reputation and latency
//!   combined into one `overall` value by configurable weights
//! - **Reputation**: exponential moving average of dispatch outcomes,
//!   always in [0, 1], persisted to JSON between runs
//! - **Selection**: `select_best_source` picks the argmax by `overall`
//!
//! # Usage
//!
//! ```
//! use meridian_quality::{DispatchOutcome, QualityConfig, QualityScorer};
//! use meridian_domain::{current_timestamp_ms, DataDomain};
//! use serde_json::json;
//!
//! let scorer = QualityScorer::new(QualityConfig::default());
//! scorer.update_reputation("alpha", DispatchOutcome::success(120));
//!
//! let payload = json!({"symbol": "AAPL", "price": 150.0, "volume": 1000});
//! let score = scorer.score("alpha", DataDomain::MarketData, &payload, current_timestamp_ms(), 120);
//! assert!(score.overall > 0.0 && score.overall <= 1.0);
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [quality]
//! reputation_alpha = 0.1
//! neutral_reputation = 0.5
//!
//! [quality.weights]
//! freshness = 0.3
//! completeness = 0.25
//! accuracy = 0.2
//! reputation = 0.15
//! latency = 0.1
//! ```

#![warn(missing_docs)]

mod accuracy;
mod config;
mod error;
mod reputation;
mod scorer;

pub use accuracy::{assess, PlausibilityReport};
pub use config::QualityConfig;
pub use error::QualityError;
pub use reputation::{ReputationEntry, ReputationRegistry, ReputationSnapshot};
pub use scorer::{completeness, select_best_source, DispatchOutcome, QualityScorer};
