//! Background worker for periodic health refresh

use crate::ProviderOrchestrator;
use std::sync::Arc;
use tokio::time::{interval, Duration};

/// Background worker that refreshes provider health on a schedule
///
/// Each cycle also purges expired entries from the orchestrator's cache.
///
/// # Examples
///
/// ```no_run
/// use meridian_orchestrator::{HealthWorker, OrchestratorConfig, ProviderOrchestrator};
/// use meridian_quality::QualityScorer;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = OrchestratorConfig::from_file("meridian.toml")?;
///     let orchestrator = Arc::new(ProviderOrchestrator::from_config(
///         &config,
///         Vec::new(),
///         QualityScorer::default(),
///     )?);
///
///     // Run until Ctrl+C
///     HealthWorker::new(orchestrator, Duration::from_secs(30)).run().await;
///     Ok(())
/// }
/// ```
pub struct HealthWorker {
    orchestrator: Arc<ProviderOrchestrator>,
    interval: Duration,
    refreshes: usize,
}

impl HealthWorker {
    /// Create a worker refreshing every `interval`
    pub fn new(orchestrator: Arc<ProviderOrchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            refreshes: 0,
        }
    }

    /// Create a worker using the orchestrator's configured interval
    pub fn from_defaults(orchestrator: Arc<ProviderOrchestrator>) -> Self {
        let secs = orchestrator.defaults().health_interval_secs.max(1);
        Self::new(orchestrator, Duration::from_secs(secs))
    }

    /// Refresh interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed refresh cycles
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// Run until a shutdown signal (Ctrl+C) is received
    pub async fn run(&mut self) {
        let mut ticker = interval(self.interval);

        tracing::info!("Health worker started (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received, stopping health worker");
                    break;
                }
            }
        }

        tracing::info!("Health worker stopped after {} refreshes", self.refreshes);
    }

    /// Run for a specific number of cycles (useful for testing)
    pub async fn run_cycles(&mut self, cycles: usize) {
        let mut ticker = interval(self.interval);

        for cycle in 0..cycles {
            ticker.tick().await;
            tracing::debug!("Health refresh {}/{}", cycle + 1, cycles);
            self.refresh_once().await;
        }

        tracing::info!("Health worker finished {} cycles", cycles);
    }

    async fn refresh_once(&mut self) {
        let health = self.orchestrator.refresh_health().await;
        self.refreshes += 1;

        for (provider, healthy) in &health {
            if !healthy {
                tracing::warn!("Provider {} is unhealthy", provider);
            }
        }

        let purged = self.orchestrator.purge_cache().await;
        if purged > 0 {
            tracing::debug!("Purged {} expired cache entries", purged);
        }
    }
}
