//! Deterministic provider adapter for tests and demos

use async_trait::async_trait;
use meridian_domain::{AdapterResponse, Payload, ProviderAdapter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Mock provider adapter
///
/// Returns pre-configured responses without any network calls, optionally
/// after a fixed delay. Clones share state, so a test can keep a handle to
/// inspect calls after handing the adapter to the orchestrator.
///
/// # Examples
///
/// ```
/// use meridian_orchestrator::MockAdapter;
/// use meridian_domain::ProviderAdapter;
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let adapter = MockAdapter::new("alpha", json!({"price": 150.0}));
/// let response = adapter.execute("get_quote", &json!({"symbol": "AAPL"}), 1000).await;
/// assert!(response.success);
/// assert_eq!(adapter.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockAdapter {
    id: String,
    default_response: Arc<Mutex<AdapterResponse>>,
    responses: Arc<Mutex<HashMap<String, AdapterResponse>>>,
    delay: Duration,
    enabled: Arc<AtomicBool>,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl MockAdapter {
    /// Adapter answering every operation with `payload`
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self::with_response(id, AdapterResponse::ok(payload))
    }

    /// Adapter failing every operation with `message`
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_response(id, AdapterResponse::failure(message))
    }

    /// Adapter answering every operation with `response`
    pub fn with_response(id: impl Into<String>, response: AdapterResponse) -> Self {
        Self {
            id: id.into(),
            default_response: Arc::new(Mutex::new(response)),
            responses: Arc::new(Mutex::new(HashMap::new())),
            delay: Duration::ZERO,
            enabled: Arc::new(AtomicBool::new(true)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer `operation` with `response`
    pub fn add_response(&self, operation: impl Into<String>, response: AdapterResponse) {
        lock(&self.responses).insert(operation.into(), response);
    }

    /// Replace the default response
    pub fn set_default_response(&self, response: AdapterResponse) {
        *lock(&self.default_response) = response;
    }

    /// Flip the runtime enabled flag
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Shared runtime enabled flag
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    /// Number of `execute` calls so far
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Start time of every `execute` call
    pub fn call_times(&self) -> Vec<Instant> {
        lock(&self.calls).clone()
    }

    /// Forget recorded calls
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn execute(&self, operation: &str, _params: &Payload, _timeout_ms: u64) -> AdapterResponse {
        lock(&self.calls).push(Instant::now());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let specific = lock(&self.responses).get(operation).cloned();
        specific.unwrap_or_else(|| lock(&self.default_response).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_per_operation_responses() {
        let adapter = MockAdapter::new("alpha", json!({"default": true}));
        adapter.add_response("get_cpi", AdapterResponse::failure("not served"));

        let quote = adapter.execute("get_quote", &json!({}), 100).await;
        assert_eq!(quote.data, Some(json!({"default": true})));

        let cpi = adapter.execute("get_cpi", &json!({}), 100).await;
        assert!(!cpi.success);
        assert_eq!(adapter.call_count(), 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let adapter = MockAdapter::failing("alpha", "down");
        let handle = adapter.clone();

        adapter.set_enabled(false);
        assert!(!handle.is_enabled());
        assert!(!handle.health_check().await);

        adapter.execute("get_quote", &json!({}), 100).await;
        assert_eq!(handle.call_count(), 1);
        handle.reset_calls();
        assert_eq!(adapter.call_count(), 0);
    }
}
