//! Configuration for the Meridian server.
//!
//! One TOML file carries the HTTP binding, the quality and lineage settings
//! and the orchestrator's providers, operation table and defaults.

use meridian_domain::{DataDomain, ProviderDescriptor};
use meridian_lineage::LineageConfig;
use meridian_orchestrator::{InvokeDefaults, OperationRoute, OperationTable, OrchestratorConfig};
use meridian_quality::{QualityConfig, QualityError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Providers or operations are inconsistent
    #[error(transparent)]
    Orchestrator(#[from] meridian_orchestrator::ConfigError),

    /// Quality settings are out of range
    #[error(transparent)]
    Quality(#[from] QualityError),

    /// Any other inconsistency
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address to bind the HTTP server to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to bind the HTTP server to
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Reputation snapshot loaded at start-up and written on shutdown
    #[serde(default)]
    pub reputation_file: Option<PathBuf>,

    /// Health refresh interval in seconds, overriding
    /// `defaults.health_interval_secs` (0 disables the worker)
    #[serde(default)]
    pub health_interval_secs: Option<u64>,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
            reputation_file: None,
            health_interval_secs: None,
        }
    }
}

impl ServerSection {
    /// Replace address and port from a `host:port` string
    pub fn set_bind(&mut self, bind: &str) -> Result<(), ConfigError> {
        let (address, port) = bind
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Invalid(format!("bind '{}' is not host:port", bind)))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| ConfigError::Invalid(format!("bind '{}' has an invalid port", bind)))?;
        if address.is_empty() {
            return Err(ConfigError::Invalid(format!("bind '{}' has no host", bind)));
        }

        self.bind_address = address.to_string();
        self.bind_port = port;
        Ok(())
    }
}

/// Meridian server configuration
///
/// ```toml
/// [server]
/// bind_address = "0.0.0.0"
/// bind_port = 8080
/// reputation_file = "reputation.json"
///
/// [quality]
/// reputation_alpha = 0.1
///
/// [lineage]
/// max_history = 10000
///
/// [defaults]
/// cache_ttl_secs = 60
///
/// [[providers]]
/// id = "alpha"
/// domain = "market_data"
/// endpoint = "http://127.0.0.1:9001/"
///
/// [operations.get_quote]
/// domain = "market_data"
/// providers = ["alpha"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP binding and persistence
    #[serde(default)]
    pub server: ServerSection,

    /// Quality scoring and reputation
    #[serde(default)]
    pub quality: QualityConfig,

    /// Lineage history bounds
    #[serde(default)]
    pub lineage: LineageConfig,

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

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator_config().validate()?;
        self.quality.validate()?;

        if self.lineage.default_recent_limit == 0 {
            return Err(ConfigError::Invalid(
                "lineage.default_recent_limit must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// The orchestrator's part of the configuration
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            defaults: self.defaults.clone(),
            providers: self.providers.clone(),
            operations: self.operations.clone(),
        }
    }

    /// Effective health refresh interval in seconds (0 = disabled)
    pub fn health_interval_secs(&self) -> u64 {
        self.server
            .health_interval_secs
            .unwrap_or(self.defaults.health_interval_secs)
    }

    /// Get the socket address to bind to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
    }

    /// Create a default configuration for testing
    ///
    /// Two market-data providers on local endpoints serving `get_quote`.
    pub fn default_test_config() -> Self {
        let providers = ["p1", "p2"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut descriptor =
                    ProviderDescriptor::new(*id, DataDomain::MarketData).with_rate_limit(10.0);
                descriptor.endpoint = Some(format!("http://127.0.0.1:{}/", 9001 + i));
                descriptor
            })
            .collect();

        let operations = OperationTable::new().with_route(
            "get_quote",
            OperationRoute::new(["p1", "p2"]).with_domain(DataDomain::MarketData),
        );

        Self {
            server: ServerSection::default(),
            quality: QualityConfig::default(),
            lineage: LineageConfig::default(),
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
        let config = ServerConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.health_interval_secs(), 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [server]
            bind_address = "0.0.0.0"
            bind_port = 9090
            reputation_file = "/var/lib/meridian/reputation.json"
            health_interval_secs = 0

            [quality]
            reputation_alpha = 0.2

            [lineage]
            max_history = 500

            [defaults]
            cache_ttl_secs = 15

            [[providers]]
            id = "alpha"
            domain = "market_data"
            endpoint = "http://127.0.0.1:9001/"

            [operations.get_quote]
            domain = "market_data"
            providers = ["alpha"]
        "#;

        let config = ServerConfig::from_toml(toml).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(
            config.server.reputation_file.as_deref(),
            Some(Path::new("/var/lib/meridian/reputation.json"))
        );
        assert_eq!(config.health_interval_secs(), 0);
        assert_eq!(config.quality.reputation_alpha, 0.2);
        assert_eq!(config.lineage.max_history, 500);
        assert_eq!(config.orchestrator_config().defaults.cache_ttl_secs, 15);
        assert_eq!(config.operations.providers_for("get_quote"), ["alpha"]);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config.server, ServerSection::default());
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let toml = r#"
            [operations.get_quote]
            providers = ["ghost"]
        "#;
        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::Orchestrator(_))
        ));

        let toml = r#"
            [quality]
            reputation_alpha = 1.5
        "#;
        assert!(matches!(
            ServerConfig::from_toml(toml),
            Err(ConfigError::Quality(_))
        ));
    }

    #[test]
    fn test_set_bind() {
        let mut section = ServerSection::default();
        section.set_bind("0.0.0.0:3000").unwrap();
        assert_eq!(section.bind_address, "0.0.0.0");
        assert_eq!(section.bind_port, 3000);

        assert!(section.set_bind("localhost").is_err());
        assert!(section.set_bind("localhost:http").is_err());
        assert!(section.set_bind(":3000").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meridian.toml");
        std::fs::write(&path, "[server]\nbind_port = 7000\n").unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.server.bind_port, 7000);

        assert!(matches!(
            ServerConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::FileRead(_))
        ));
    }
}
