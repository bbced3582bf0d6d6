//! Error types for fusion

use meridian_lineage::LineageError;
use meridian_orchestrator::OrchestratorError;
use thiserror::Error;

/// Errors that can occur while fetching or fusing data
#[derive(Debug, Error)]
pub enum FusionError {
    /// No source produced usable data
    #[error("All sources failed for {operation}: {}", failed_sources.join(", "))]
    AllSourcesFailed {
        /// Operation being fused (empty when fusing outside a fetch)
        operation: String,
        /// Sources that were asked
        failed_sources: Vec<String>,
    },

    /// Single-source fetch failed
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// Lineage recording failed
    #[error(transparent)]
    Lineage(#[from] LineageError),
}

impl FusionError {
    /// Attach the operation name to an `AllSourcesFailed` error
    pub fn for_operation(self, name: &str) -> Self {
        match self {
            FusionError::AllSourcesFailed { failed_sources, .. } => FusionError::AllSourcesFailed {
                operation: name.to_string(),
                failed_sources,
            },
            other => other,
        }
    }

    /// Stable machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            FusionError::AllSourcesFailed { .. } => "all_sources_failed",
            FusionError::Orchestrator(err) => err.kind(),
            FusionError::Lineage(LineageError::UnknownTrackingId(_)) => "unknown_tracking_id",
            FusionError::Lineage(_) => "lineage_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sources_failed_message() {
        let err = FusionError::AllSourcesFailed {
            operation: String::new(),
            failed_sources: vec!["p1".into(), "p2".into()],
        }
        .for_operation("get_quote");

        assert_eq!(err.to_string(), "All sources failed for get_quote: p1, p2");
        assert_eq!(err.kind(), "all_sources_failed");
    }

    #[test]
    fn test_orchestrator_errors_keep_their_kind() {
        let err: FusionError = OrchestratorError::NoProviderAvailable {
            operation: "get_quote".into(),
        }
        .into();
        assert_eq!(err.kind(), "no_provider_available");
        assert!(err.to_string().contains("get_quote"));
    }
}
