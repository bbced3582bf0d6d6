//! Generic HTTP provider adapter
//!
//! Speaks a minimal JSON protocol with an upstream (or a sidecar translating
//! for one): each call is `POST {endpoint}` with body
//! `{"operation": ..., "params": ...}` and the reply is an
//! [`AdapterResponse`] document `{"success": ..., "data": ..., "error": ...}`.

use async_trait::async_trait;
use meridian_domain::{AdapterResponse, Payload, ProviderAdapter, ProviderDescriptor};
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deadline of one health probe
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

/// Error returned when a descriptor cannot be turned into an HTTP adapter
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The descriptor has no `endpoint`
    #[error("Provider '{0}' has no endpoint configured")]
    MissingEndpoint(String),

    /// The endpoint is not an http(s) URL
    #[error("Provider '{provider}' has an invalid endpoint '{endpoint}'")]
    InvalidEndpoint {
        /// Provider id
        provider: String,
        /// Configured endpoint
        endpoint: String,
    },
}

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    operation: &'a str,
    params: &'a Payload,
}

/// Provider adapter backed by an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpProviderAdapter {
    id: String,
    endpoint: String,
    client: Client,
    enabled: Arc<AtomicBool>,
}

impl HttpProviderAdapter {
    /// Create an adapter for `id` posting to `endpoint`
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            client: Client::new(),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Build the adapter of a configured provider
    ///
    /// The runtime flag starts at the descriptor's `enabled` value.
    pub fn from_descriptor(descriptor: &ProviderDescriptor) -> Result<Self, AdapterError> {
        let endpoint = descriptor
            .endpoint
            .as_deref()
            .ok_or_else(|| AdapterError::MissingEndpoint(descriptor.id.clone()))?;

        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(AdapterError::InvalidEndpoint {
                provider: descriptor.id.clone(),
                endpoint: endpoint.to_string(),
            });
        }

        let adapter = Self::new(descriptor.id.clone(), endpoint);
        adapter.set_enabled(descriptor.enabled);
        Ok(adapter)
    }

    /// Upstream endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Flip the runtime enabled flag
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Shared runtime enabled flag
    pub fn enabled_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    async fn execute(&self, operation: &str, params: &Payload, timeout_ms: u64) -> AdapterResponse {
        let request = ExecuteRequest { operation, params };

        let response = match self
            .client
            .post(&self.endpoint)
            .timeout(Duration::from_millis(timeout_ms.max(1)))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Request to {} failed: {}", self.id, e);
                return AdapterResponse::failure(format!("request failed: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return AdapterResponse::failure(format!("HTTP {}: {}", status, body));
        }

        match response.json::<AdapterResponse>().await {
            Ok(reply) if reply.success && reply.data.is_none() => {
                AdapterResponse::failure("upstream reported success without data")
            }
            Ok(reply) => reply,
            Err(e) => AdapterResponse::failure(format!("malformed upstream reply: {}", e)),
        }
    }

    async fn health_check(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        match self.client.get(&self.endpoint).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                tracing::debug!("Health probe of {} failed: {}", self.id, e);
                false
            }
        }
    }
}
