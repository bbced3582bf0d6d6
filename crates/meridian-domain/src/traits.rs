//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the fusion core and the outside
//! world. Upstream wire formats and cache backends implement them in other
//! crates (or in the host process).

use crate::Payload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Uniform result of one adapter call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterResponse {
    /// Whether the upstream call succeeded
    pub success: bool,

    /// Response data on success
    #[serde(default)]
    pub data: Option<Payload>,

    /// Error message on failure
    #[serde(default)]
    pub error: Option<String>,
}

impl AdapterResponse {
    /// Successful response carrying `data`
    pub fn ok(data: Payload) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response with an error message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Trait for provider adapters
///
/// Each adapter translates the uniform `execute(operation, params)` contract
/// into one upstream protocol. The enabled flag is controlled outside the
/// orchestrator; a disabled adapter is treated exactly like an unavailable one.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier of the provider this adapter serves
    fn provider_id(&self) -> &str;

    /// Runtime enabled flag
    fn is_enabled(&self) -> bool;

    /// Execute an operation against the upstream
    ///
    /// `timeout_ms` is advisory: the orchestrator enforces its own deadline and
    /// stops waiting once it expires.
    async fn execute(&self, operation: &str, params: &Payload, timeout_ms: u64) -> AdapterResponse;

    /// Lightweight health probe; defaults to the enabled flag
    async fn health_check(&self) -> bool {
        self.is_enabled()
    }
}

/// Metadata stored alongside a cached value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Operation name that produced the value
    pub operation: String,

    /// Provider (or `fused`) that produced the value
    pub provider: Option<String>,

    /// When the value was stored (ms since epoch)
    pub stored_at: u64,
}

/// A cached value with its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    /// Cached payload
    pub value: Payload,

    /// Metadata recorded at `set` time
    pub metadata: CacheMetadata,
}

/// Trait for TTL caches
///
/// Keys are deterministic functions of (operation, canonicalized params).
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a live entry
    async fn get(&self, key: &str) -> Option<CachedValue>;

    /// Store a value for `ttl_secs` seconds
    async fn set(&self, key: &str, value: Payload, ttl_secs: u64, metadata: CacheMetadata);

    /// Remove every key matching `pattern` (`*` matches any run of characters)
    ///
    /// Returns the number of removed entries.
    async fn invalidate_pattern(&self, pattern: &str) -> usize;

    /// Drop entries whose TTL has elapsed, returning how many were removed
    ///
    /// Backends that expire entries on their own keep the default.
    async fn purge_expired(&self) -> usize {
        0
    }
}
