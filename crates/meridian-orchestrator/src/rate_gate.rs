//! Per-provider minimum-interval gate
//!
//! Consecutive dispatches to one provider are spaced at least
//! `1 / rate_limit` seconds apart. Callers queue on a fair tokio mutex, so
//! excess requests are delayed in arrival order rather than rejected.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval gate for one provider
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateGate {
    /// Create a gate enforcing `min_interval` between dispatches
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Gate that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Configured interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait for this caller's dispatch slot
    ///
    /// The lock is held across the sleep so later callers queue behind it.
    pub async fn acquire(&self) {
        if self.min_interval.is_zero() {
            return;
        }

        let mut last = self.last_dispatch.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!("Rate gate delaying dispatch by {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
