//! Configuration file parsing for the Orchestrator.
//!
//! Loads provider descriptors, the operation table and invoke defaults from
//! TOML.

use crate::operations::{OperationRoute, OperationTable};
use crate::ConfigError;
use meridian_domain::{DataDomain, ProviderDescriptor, MAX_MIN_INTERVAL};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Longest cache TTL accepted from configuration or a request (30 days)
pub const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Defaults applied when an invoke leaves an option unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeDefaults {
    /// Cache TTL in seconds (0 disables caching)
    /// Default: 60
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Interval of the background health refresh in seconds
    /// Default: 30
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_health_interval() -> u64 {
    30
}

impl Default for InvokeDefaults {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            health_interval_secs: default_health_interval(),
        }
    }
}

/// Orchestrator configuration loaded from TOML
///
/// ```toml
/// [defaults]
/// cache_ttl_secs = 60
///
/// [[providers]]
/// id = "alpha"
/// domain = "market_data"
/// rate_limit_per_sec = 5.0
/// timeout_ms = 3000
///
/// [operations.get_quote]
/// domain = "market_data"
/// providers = ["alpha", "beta"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Invoke defaults
    #[serde(default)]
    pub defaults: InvokeDefaults,

    /// Known providers
    #[serde(default)]
    pub providers: Vec<ProviderDescriptor>,

    /// Operation → providers table
    #[serde(default)]
    pub operations: OperationTable,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: OrchestratorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that provider ids are unique, rates and TTLs are in range and
    /// every route names a known provider
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "cache_ttl_secs {} exceeds the maximum of {}",
                self.defaults.cache_ttl_secs, MAX_CACHE_TTL_SECS
            )));
        }

        let min_rate = 1.0 / MAX_MIN_INTERVAL.as_secs_f64();
        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.id.is_empty() {
                return Err(ConfigError::Invalid("provider id must not be empty".to_string()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
            let rate = provider.rate_limit_per_sec;
            if !rate.is_finite() || rate < 0.0 || (rate > 0.0 && rate < min_rate) {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' has rate_limit_per_sec {}; expected 0 or at least {}",
                    provider.id, rate, min_rate
                )));
            }
            if provider.timeout_ms == 0 {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' has a zero timeout",
                    provider.id
                )));
            }
        }

        for (operation, route) in self.operations.iter() {
            for provider in &route.providers {
                if !seen.contains(provider.as_str()) {
                    return Err(ConfigError::UnknownProvider {
                        operation: operation.to_string(),
                        provider: provider.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Descriptor of `id`
    pub fn provider(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Create a default configuration for testing
    ///
    /// Three market-data providers (`p1`, `p2`, `p3`) all serving `get_quote`,
    /// with `p3` disabled.
    pub fn default_test_config() -> Self {
        let providers = vec![
            ProviderDescriptor::new("p1", DataDomain::MarketData).with_rate_limit(10.0),
            ProviderDescriptor::new("p2", DataDomain::MarketData).with_rate_limit(10.0),
            ProviderDescriptor::new("p3", DataDomain::MarketData)
                .with_rate_limit(10.0)
                .with_enabled(false),
        ];

        let operations = OperationTable::new().with_route(
            "get_quote",
            OperationRoute::new(["p1", "p2", "p3"]).with_domain(DataDomain::MarketData),
        );

        Self {
            defaults: InvokeDefaults::default(),
            providers,
            operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default_test_config();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.defaults.cache_ttl_secs, 60);
        assert!(!config.provider("p3").unwrap().enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [defaults]
            cache_ttl_secs = 0

            [[providers]]
            id = "alpha"
            domain = "market_data"
            rate_limit_per_sec = 2.0
            timeout_ms = 3000

            [[providers]]
            id = "fred"
            domain = "economic"

            [operations.get_quote]
            domain = "market_data"
            providers = ["alpha"]

            [operations.get_cpi]
            providers = ["fred"]
        "#;

        let config = OrchestratorConfig::from_toml(toml).unwrap();
        assert_eq!(config.defaults.cache_ttl_secs, 0);
        assert_eq!(config.defaults.health_interval_secs, 30);
        assert_eq!(config.providers[0].rate_limit_per_sec, 2.0);
        assert_eq!(config.providers[1].domain, DataDomain::Economic);
        assert_eq!(config.operations.providers_for("get_quote"), ["alpha"]);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let toml = r#"
            [[providers]]
            id = "alpha"

            [operations.get_quote]
            providers = ["alpha", "ghost"]
        "#;

        let result = OrchestratorConfig::from_toml(toml);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownProvider { ref provider, .. }) if provider == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let toml = r#"
            [[providers]]
            id = "alpha"

            [[providers]]
            id = "alpha"
        "#;

        assert!(matches!(
            OrchestratorConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_out_of_range_rate_rejected() {
        for rate in ["1e-300", "-1.0", "nan", "inf"] {
            let toml = format!("[[providers]]\nid = \"alpha\"\nrate_limit_per_sec = {}\n", rate);
            assert!(
                matches!(OrchestratorConfig::from_toml(&toml), Err(ConfigError::Invalid(_))),
                "rate {} accepted",
                rate
            );
        }

        let slow = "[[providers]]\nid = \"alpha\"\nrate_limit_per_sec = 0.5\n";
        assert!(OrchestratorConfig::from_toml(slow).is_ok());
    }

    #[test]
    fn test_oversized_default_ttl_rejected() {
        let toml = format!("[defaults]\ncache_ttl_secs = {}\n", MAX_CACHE_TTL_SECS + 1);
        assert!(matches!(
            OrchestratorConfig::from_toml(&toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orchestrator.toml");
        std::fs::write(&path, "[[providers]]\nid = \"alpha\"\n").unwrap();

        let config = OrchestratorConfig::from_file(&path).unwrap();
        assert_eq!(config.providers.len(), 1);

        assert!(matches!(
            OrchestratorConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::FileRead(_))
        ));
    }
}
