//! Meridian Server
//!
//! Hosts the fusion engine behind an HTTP API: builds one HTTP adapter per
//! configured provider, wires orchestrator, scorer, lineage tracker and
//! fusion service together, and runs the background health refresh.

#![warn(missing_docs)]

pub mod adapter;
pub mod config;
pub mod handlers;

use adapter::{AdapterError, HttpProviderAdapter};
use config::ServerConfig;
use handlers::{create_router, AppState, ProviderSwitches};
use meridian_domain::ProviderAdapter;
use meridian_fusion::FusionService;
use meridian_lineage::LineageTracker;
use meridian_orchestrator::{HealthWorker, MemoryCache, ProviderOrchestrator};
use meridian_quality::QualityScorer;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A provider cannot be reached over HTTP
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

impl From<meridian_orchestrator::ConfigError> for ServerError {
    fn from(e: meridian_orchestrator::ConfigError) -> Self {
        ServerError::Config(e.into())
    }
}

/// Build the application state from configuration
///
/// Restores reputation from `server.reputation_file` when the file exists;
/// an unreadable snapshot is logged and the scorer starts neutral.
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    let scorer = QualityScorer::new(config.quality.clone());
    if let Some(path) = &config.server.reputation_file {
        if path.exists() {
            match scorer.reputation().load_from(path) {
                Ok(count) => info!("Restored reputation of {} providers from {}", count, path.display()),
                Err(e) => warn!("Ignoring reputation file {}: {}", path.display(), e),
            }
        }
    }

    let mut switches = ProviderSwitches::new();
    let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::with_capacity(config.providers.len());
    for descriptor in &config.providers {
        let adapter = HttpProviderAdapter::from_descriptor(descriptor)?;
        switches.insert(descriptor.id.clone(), adapter.enabled_flag());
        adapters.push(Arc::new(adapter));
    }

    let orchestrator = ProviderOrchestrator::from_config(&config.orchestrator_config(), adapters, scorer)?
        .with_cache(Arc::new(MemoryCache::new()));
    let lineage = LineageTracker::new(config.lineage.clone());
    let service = FusionService::new(Arc::new(orchestrator), Arc::new(lineage));

    Ok(AppState::new(Arc::new(service)).with_switches(switches))
}

/// Start the Meridian HTTP server
///
/// Serves until Ctrl+C, then writes the reputation snapshot if a file is
/// configured.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Meridian server");
    info!("Bind address: {}", config.bind_addr());
    info!("Configured providers: {}", config.providers.len());
    info!("Configured operations: {}", config.operations.len());

    let state = build_state(&config)?;
    let orchestrator = Arc::clone(state.service.orchestrator());

    let health_interval = config.health_interval_secs();
    if health_interval > 0 {
        let mut worker = HealthWorker::new(Arc::clone(&orchestrator), Duration::from_secs(health_interval));
        tokio::spawn(async move { worker.run().await });
    } else {
        info!("Health refresh disabled");
    }

    let app = create_router(state);

    // Bind and serve
    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Meridian listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    if let Some(path) = &config.server.reputation_file {
        match orchestrator.scorer().reputation().save_to(path) {
            Ok(()) => info!("Saved reputation to {}", path.display()),
            Err(e) => warn!("Failed to save reputation to {}: {}", path.display(), e),
        }
    }

    info!("Meridian server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_orchestrator::ConfigError as OrchestratorConfigError;

    #[test]
    fn test_build_state_from_test_config() {
        let state = build_state(&ServerConfig::default_test_config()).unwrap();
        assert_eq!(state.switches.len(), 2);
        assert_eq!(state.service.orchestrator().registry().len(), 2);
        assert!(state.service.orchestrator().cache().is_some());
    }

    #[test]
    fn test_missing_endpoint_rejected() {
        let mut config = ServerConfig::default_test_config();
        config.providers[0].endpoint = None;
        assert!(matches!(
            build_state(&config),
            Err(ServerError::Adapter(AdapterError::MissingEndpoint(ref id))) if id == "p1"
        ));
    }

    #[test]
    fn test_reputation_restored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reputation.json");

        let seeded = QualityScorer::default();
        seeded.reputation().seed("p1", 0.9);
        seeded.reputation().save_to(&path).unwrap();

        let mut config = ServerConfig::default_test_config();
        config.server.reputation_file = Some(path);
        let state = build_state(&config).unwrap();
        let reputation = state.service.orchestrator().scorer().reputation_of("p1");
        assert!((reputation - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_reputation_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reputation.json");
        std::fs::write(&path, "not json").unwrap();

        let mut config = ServerConfig::default_test_config();
        config.server.reputation_file = Some(path);
        assert!(build_state(&config).is_ok());
    }

    #[test]
    fn test_orchestrator_config_error_converts() {
        let err: ServerError = OrchestratorConfigError::MissingAdapter("p1".to_string()).into();
        assert!(matches!(err, ServerError::Config(_)));
    }
}
