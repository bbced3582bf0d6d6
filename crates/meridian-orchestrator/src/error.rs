//! Error types for the Provider Orchestrator

use thiserror::Error;

/// Failure of one `invoke`
///
/// Every variant carries the operation name; dispatch failures also carry the
/// provider attempted. The type is `Clone` so one in-flight result can be
/// shared with every deduplicated waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrchestratorError {
    /// No enabled provider is registered for the operation
    #[error("No provider available for operation '{operation}'")]
    NoProviderAvailable {
        /// Operation name
        operation: String,
    },

    /// The dispatch deadline expired
    #[error("Provider '{provider}' timed out after {timeout_ms}ms on '{operation}'")]
    ProviderTimeout {
        /// Operation name
        operation: String,
        /// Provider attempted
        provider: String,
        /// Deadline that expired
        timeout_ms: u64,
    },

    /// The adapter reported an error (or was disabled mid-flight)
    #[error("Provider '{provider}' failed on '{operation}': {message}")]
    ProviderError {
        /// Operation name
        operation: String,
        /// Provider attempted
        provider: String,
        /// Upstream error message
        message: String,
    },
}

impl OrchestratorError {
    /// Stable machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::NoProviderAvailable { .. } => "no_provider_available",
            OrchestratorError::ProviderTimeout { .. } => "provider_timeout",
            OrchestratorError::ProviderError { .. } => "provider_error",
        }
    }

    /// Operation the error belongs to
    pub fn operation(&self) -> &str {
        match self {
            OrchestratorError::NoProviderAvailable { operation }
            | OrchestratorError::ProviderTimeout { operation, .. }
            | OrchestratorError::ProviderError { operation, .. } => operation,
        }
    }

    /// Provider attempted, if any
    pub fn provider(&self) -> Option<&str> {
        match self {
            OrchestratorError::NoProviderAvailable { .. } => None,
            OrchestratorError::ProviderTimeout { provider, .. }
            | OrchestratorError::ProviderError { provider, .. } => Some(provider),
        }
    }
}

/// Orchestrator configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// An operation route names a provider that is not configured
    #[error("Operation '{operation}' references unknown provider '{provider}'")]
    UnknownProvider {
        /// Operation name
        operation: String,
        /// Missing provider id
        provider: String,
    },

    /// A configured provider has no adapter
    #[error("No adapter supplied for provider '{0}'")]
    MissingAdapter(String),

    /// Any other inconsistency
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_accessors() {
        let err = OrchestratorError::ProviderTimeout {
            operation: "get_quote".to_string(),
            provider: "alpha".to_string(),
            timeout_ms: 250,
        };
        assert_eq!(err.kind(), "provider_timeout");
        assert_eq!(err.operation(), "get_quote");
        assert_eq!(err.provider(), Some("alpha"));
        assert_eq!(
            err.to_string(),
            "Provider 'alpha' timed out after 250ms on 'get_quote'"
        );

        let err = OrchestratorError::NoProviderAvailable {
            operation: "get_quote".to_string(),
        };
        assert_eq!(err.provider(), None);
    }
}
