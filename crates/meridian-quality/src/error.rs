//! Error types for quality scoring and reputation persistence

use thiserror::Error;

/// Errors that can occur in the quality layer
#[derive(Error, Debug)]
pub enum QualityError {
    /// Reading or writing the reputation file failed
    #[error("Reputation file error: {0}")]
    Io(#[from] std::io::Error),

    /// Reputation snapshot could not be (de)serialized
    #[error("Reputation serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is out of range
    #[error("Invalid quality configuration: {0}")]
    InvalidConfig(String),
}
