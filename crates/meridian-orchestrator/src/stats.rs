//! Per-provider connection statistics

use serde::{Deserialize, Serialize};

/// Latency at which the ranking latency score reaches zero
pub const LATENCY_CEILING_MS: f64 = 10_000.0;

/// Mutable per-provider counters, updated after every dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStats {
    /// Whether the last dispatch (or health probe) succeeded
    pub connected: bool,

    /// Successful dispatches
    pub request_count: u64,

    /// Failed dispatches (errors, timeouts, mid-flight disables)
    pub error_count: u64,

    /// Rolling average latency of successful dispatches
    pub avg_response_time_ms: f64,

    /// Time of the last success (ms since epoch)
    pub last_success_ms: Option<u64>,

    /// Message of the last failure
    pub last_error: Option<String>,
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self {
            // Assume connected until the first failure
            connected: true,
            request_count: 0,
            error_count: 0,
            avg_response_time_ms: 0.0,
            last_success_ms: None,
            last_error: None,
        }
    }
}

impl ConnectionStats {
    /// Record a successful dispatch
    ///
    /// The rolling average is `(old + new) / 2`; the first sample is taken
    /// as-is.
    pub fn record_success(&mut self, latency_ms: u64, now_ms: u64) {
        self.request_count += 1;
        let latency = latency_ms as f64;
        self.avg_response_time_ms = if self.request_count == 1 {
            latency
        } else {
            (self.avg_response_time_ms + latency) / 2.0
        };
        self.connected = true;
        self.last_success_ms = Some(now_ms);
    }

    /// Record a failed dispatch
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.error_count += 1;
        self.connected = false;
        self.last_error = Some(message.into());
    }

    /// `errors / (requests + errors)`, 0 without history
    pub fn error_rate(&self) -> f64 {
        let total = self.request_count + self.error_count;
        if total == 0 {
            0.0
        } else {
            self.error_count as f64 / total as f64
        }
    }

    /// `max(0, 1 - avg_latency / 10000)`
    pub fn latency_score(&self) -> f64 {
        (1.0 - self.avg_response_time_ms / LATENCY_CEILING_MS).max(0.0)
    }

    /// Serializable view including the runtime enabled flag
    pub fn snapshot(&self, enabled: bool) -> ProviderStats {
        ProviderStats {
            connected: self.connected,
            request_count: self.request_count,
            error_count: self.error_count,
            avg_response_time_ms: self.avg_response_time_ms,
            last_success_ms: self.last_success_ms,
            last_error: self.last_error.clone(),
            enabled,
        }
    }
}

/// Statistics of one provider as reported by `get_stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Connectivity flag
    pub connected: bool,
    /// Successful dispatches
    pub request_count: u64,
    /// Failed dispatches
    pub error_count: u64,
    /// Rolling average latency
    pub avg_response_time_ms: f64,
    /// Last success (ms since epoch)
    pub last_success_ms: Option<u64>,
    /// Last error message
    pub last_error: Option<String>,
    /// Descriptor and adapter flags combined
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average() {
        let mut stats = ConnectionStats::default();
        stats.record_success(100, 1);
        assert_eq!(stats.avg_response_time_ms, 100.0);

        stats.record_success(300, 2);
        assert_eq!(stats.avg_response_time_ms, 200.0);
        assert_eq!(stats.request_count, 2);
        assert_eq!(stats.last_success_ms, Some(2));
    }

    #[test]
    fn test_failure_counts() {
        let mut stats = ConnectionStats::default();
        stats.record_success(100, 1);
        stats.record_failure("boom");

        assert_eq!(stats.request_count, 1);
        assert_eq!(stats.error_count, 1);
        assert!(!stats.connected);
        assert_eq!(stats.last_error.as_deref(), Some("boom"));
        assert_eq!(stats.error_rate(), 0.5);
    }

    #[test]
    fn test_scores_without_history() {
        let stats = ConnectionStats::default();
        assert_eq!(stats.error_rate(), 0.0);
        assert_eq!(stats.latency_score(), 1.0);
    }

    #[test]
    fn test_latency_score_floor() {
        let mut stats = ConnectionStats::default();
        stats.record_success(25_000, 1);
        assert_eq!(stats.latency_score(), 0.0);
    }
}
