//! In-flight request deduplication
//!
//! The first caller for a key becomes the leader and performs the dispatch;
//! concurrent callers for the same key subscribe to the leader's completion
//! handle. The leader's guard removes the map entry when dropped, whether the
//! dispatch succeeded, failed or was cancelled.

use crate::OrchestratorError;
use meridian_domain::Payload;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Data returned by one successful dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSuccess {
    /// Provider that answered
    pub provider: String,
    /// Response data
    pub payload: Payload,
    /// Observed latency
    pub latency_ms: u64,
    /// When the response arrived (ms since epoch)
    pub response_timestamp: u64,
}

/// Result shared between the leader and its waiters
pub type DispatchResult = Result<DispatchSuccess, OrchestratorError>;

type Completion = watch::Receiver<Option<DispatchResult>>;

/// Map of keys currently being dispatched
#[derive(Debug, Default)]
pub struct InFlight {
    pending: Mutex<HashMap<String, Completion>>,
}

/// Role of a caller for one key
pub enum Slot<'a> {
    /// First caller; must dispatch and complete the guard
    Leader(LeaderGuard<'a>),
    /// Later caller; waits for the leader's result
    Follower(Completion),
}

/// Completion handle held by the leader
pub struct LeaderGuard<'a> {
    owner: &'a InFlight,
    key: String,
    sender: watch::Sender<Option<DispatchResult>>,
}

impl InFlight {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Completion>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the dispatch for `key`, becoming its leader if none is running
    pub fn join(&self, key: &str) -> Slot<'_> {
        let mut pending = self.lock();
        if let Some(receiver) = pending.get(key) {
            return Slot::Follower(receiver.clone());
        }

        let (sender, receiver) = watch::channel(None);
        pending.insert(key.to_string(), receiver);
        Slot::Leader(LeaderGuard {
            owner: self,
            key: key.to_string(),
            sender,
        })
    }

    /// Wait for the leader of a followed dispatch
    pub async fn wait(mut completion: Completion, operation: &str, provider: &str) -> DispatchResult {
        let shared = match completion.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };

        shared.unwrap_or_else(|| {
            Err(OrchestratorError::ProviderError {
                operation: operation.to_string(),
                provider: provider.to_string(),
                message: "in-flight request was abandoned".to_string(),
            })
        })
    }

    /// Number of keys currently in flight
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl LeaderGuard<'_> {
    /// Publish the result to every waiter
    pub fn complete(&self, result: &DispatchResult) {
        self.sender.send_replace(Some(result.clone()));
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key);
    }
}
