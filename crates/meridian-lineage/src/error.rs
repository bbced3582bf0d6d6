//! Error types for lineage tracking

use crate::TrackingId;
use thiserror::Error;

/// Errors that can occur while tracking lineage
#[derive(Debug, Error)]
pub enum LineageError {
    /// The tracking id was never issued or its session is already finalized
    #[error("Unknown tracking id: {0}")]
    UnknownTrackingId(TrackingId),

    /// Export serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV export failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Requested export format is not supported
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}
