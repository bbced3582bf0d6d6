//! Fusion and fetch options

use meridian_domain::{ConflictStrategy, DataDomain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relative tolerances under which two numeric values agree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// Tolerance for fields without an override
    /// Default: 0.001 (0.1 %)
    #[serde(default = "default_relative_tolerance")]
    pub default_relative: f64,

    /// Per-field overrides
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

fn default_relative_tolerance() -> f64 {
    0.001
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            default_relative: default_relative_tolerance(),
            fields: BTreeMap::new(),
        }
    }
}

impl ToleranceConfig {
    /// Uniform tolerance
    pub fn relative(default_relative: f64) -> Self {
        Self {
            default_relative,
            fields: BTreeMap::new(),
        }
    }

    /// Default tolerance of a data domain
    pub fn for_domain(domain: DataDomain) -> Self {
        Self::relative(domain.default_tolerance())
    }

    /// Override the tolerance of one field
    pub fn with_field(mut self, field: impl Into<String>, tolerance: f64) -> Self {
        self.fields.insert(field.into(), tolerance);
        self
    }

    /// Tolerance applied to `field`
    pub fn for_field(&self, field: &str) -> f64 {
        self.fields
            .get(field)
            .copied()
            .unwrap_or(self.default_relative)
            .max(0.0)
    }
}

/// Options of [`FusionEngine::fuse`](crate::FusionEngine::fuse)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionOptions {
    /// Conflict resolution strategy
    #[serde(default)]
    pub strategy: ConflictStrategy,

    /// Agreement tolerances
    #[serde(default)]
    pub tolerance: ToleranceConfig,
}

impl FusionOptions {
    /// Options using `strategy` and the default tolerance
    pub fn with_strategy(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            tolerance: ToleranceConfig::default(),
        }
    }

    /// Replace the tolerances
    pub fn with_tolerance(mut self, tolerance: ToleranceConfig) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// How a multi-source fetch dispatches its candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// All candidates at once
    #[default]
    Parallel,
    /// One candidate at a time, in candidate order
    Sequential,
}

impl FetchMode {
    /// Get the mode name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchMode::Parallel => "parallel",
            FetchMode::Sequential => "sequential",
        }
    }
}

/// Options of [`FusionService::fetch_fused`](crate::FusionService::fetch_fused)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Dispatch mode
    #[serde(default)]
    pub mode: FetchMode,

    /// Conflict resolution strategy
    #[serde(default)]
    pub strategy: ConflictStrategy,

    /// Explicit sources; unset uses the enabled providers of the operation
    #[serde(default)]
    pub providers: Option<Vec<String>>,

    /// TTL of the fused result; 0 disables caching, unset uses the default
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,

    /// Per-source deadline; unset uses each provider's timeout
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Agreement tolerances; unset uses the operation's domain default
    #[serde(default)]
    pub tolerance: Option<ToleranceConfig>,
}

impl FetchOptions {
    /// Set the dispatch mode
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the conflict strategy
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Fetch from exactly these sources
    pub fn with_providers<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers = Some(providers.into_iter().map(Into::into).collect());
        self
    }

    /// Set the fused-result TTL (0 disables caching)
    pub fn with_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.cache_ttl_secs = Some(ttl_secs);
        self
    }

    /// Set the per-source deadline
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the agreement tolerances
    pub fn with_tolerance(mut self, tolerance: ToleranceConfig) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
}
