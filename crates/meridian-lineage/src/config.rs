//! Configuration for the Lineage Tracker

use serde::{Deserialize, Serialize};

/// Configuration for the Lineage Tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageConfig {
    /// Maximum finalized records retained (oldest evicted first)
    /// Default: 10000
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Records included by `graph` and `export` when no limit is given
    /// Default: 100
    #[serde(default = "default_recent_limit")]
    pub default_recent_limit: usize,
}

fn default_max_history() -> usize {
    10_000
}

fn default_recent_limit() -> usize {
    100
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            default_recent_limit: default_recent_limit(),
        }
    }
}

impl LineageConfig {
    /// Configuration with a custom history bound
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }
}
