//! Provider descriptors - static per-provider configuration

use crate::DataDomain;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest spacing a rate limit can impose (one dispatch per day)
pub const MAX_MIN_INTERVAL: Duration = Duration::from_secs(86_400);

/// Static configuration of one upstream provider
///
/// Loaded once at start-up and immutable afterwards. The `enabled` flag here
/// is the configured default; adapters expose their own runtime flag and a
/// provider is only dispatched to when both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Provider identifier (e.g., "alpha_vantage", "sec_edgar")
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,

    /// Data domain served by this provider
    #[serde(default)]
    pub domain: DataDomain,

    /// Maximum sustained requests per second (0 = unlimited)
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_sec: f64,

    /// Per-dispatch deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Configured enabled flag
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Upstream endpoint, used by the generic HTTP adapter
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Default rate limit: 5 requests per second
fn default_rate_limit() -> f64 {
    5.0
}

/// Default timeout: 10 seconds
fn default_timeout_ms() -> u64 {
    10_000
}

fn default_enabled() -> bool {
    true
}

impl ProviderDescriptor {
    /// Create a descriptor with default limits
    pub fn new(id: impl Into<String>, domain: DataDomain) -> Self {
        Self {
            id: id.into(),
            name: None,
            domain,
            rate_limit_per_sec: default_rate_limit(),
            timeout_ms: default_timeout_ms(),
            enabled: true,
            endpoint: None,
        }
    }

    /// Set the rate limit (requests per second)
    pub fn with_rate_limit(mut self, per_sec: f64) -> Self {
        self.rate_limit_per_sec = per_sec;
        self
    }

    /// Set the dispatch timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the configured enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the upstream endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Minimum delay between consecutive dispatches (`1000 / rate_limit` ms)
    ///
    /// Capped at [`MAX_MIN_INTERVAL`]; a zero, negative or non-finite rate
    /// means unlimited.
    pub fn min_interval(&self) -> Duration {
        if self.rate_limit_per_sec > 0.0 && self.rate_limit_per_sec.is_finite() {
            Duration::try_from_secs_f64(1.0 / self.rate_limit_per_sec)
                .map_or(MAX_MIN_INTERVAL, |interval| interval.min(MAX_MIN_INTERVAL))
        } else {
            Duration::ZERO
        }
    }

    /// Dispatch deadline as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Display name, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_interval() {
        let desc = ProviderDescriptor::new("alpha", DataDomain::MarketData).with_rate_limit(4.0);
        assert_eq!(desc.min_interval(), Duration::from_millis(250));

        let unlimited = desc.clone().with_rate_limit(0.0);
        assert_eq!(unlimited.min_interval(), Duration::ZERO);
    }

    #[test]
    fn test_tiny_rate_is_capped() {
        let desc = ProviderDescriptor::new("alpha", DataDomain::MarketData).with_rate_limit(1e-300);
        assert_eq!(desc.min_interval(), MAX_MIN_INTERVAL);

        let slow = desc.clone().with_rate_limit(1e-6);
        assert_eq!(slow.min_interval(), MAX_MIN_INTERVAL);

        let subnormal = desc.with_rate_limit(f64::MIN_POSITIVE / 4.0);
        assert_eq!(subnormal.min_interval(), MAX_MIN_INTERVAL);
    }

    #[test]
    fn test_defaults_from_json() {
        let desc: ProviderDescriptor = serde_json::from_str(r#"{"id": "fred"}"#).unwrap();
        assert_eq!(desc.id, "fred");
        assert_eq!(desc.domain, DataDomain::MarketData);
        assert_eq!(desc.rate_limit_per_sec, 5.0);
        assert_eq!(desc.timeout_ms, 10_000);
        assert!(desc.enabled);
        assert_eq!(desc.display_name(), "fred");
    }
}
