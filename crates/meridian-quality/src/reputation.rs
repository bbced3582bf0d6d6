//! Per-provider reputation registry
//!
//! Reputation is an exponential moving average of dispatch outcomes:
//! `rep' = rep * (1 - α) + outcome * α`. Both inputs are clamped into [0, 1]
//! so the result always stays in [0, 1].
//!
//! A provider that is never dispatched to keeps whatever reputation it had;
//! there is no decay during dormancy.

use crate::QualityError;
use meridian_domain::current_timestamp_ms;
use meridian_domain::quality::clamp_unit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reputation state of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEntry {
    /// Current reputation in [0, 1]
    pub score: f64,

    /// Number of outcomes folded into the score
    pub updates: u64,

    /// Last update (ms since epoch)
    pub last_updated: u64,
}

/// Serializable copy of the whole registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    /// Entries keyed by provider id
    pub entries: BTreeMap<String, ReputationEntry>,

    /// When the snapshot was taken (ms since epoch)
    pub taken_at: u64,
}

/// Registry of provider reputations shared across concurrent operations
///
/// Each update is a single read-modify-write under the write lock, so
/// concurrent updates of the same provider never lose an outcome.
pub struct ReputationRegistry {
    entries: RwLock<HashMap<String, ReputationEntry>>,
    alpha: f64,
    neutral: f64,
}

impl ReputationRegistry {
    /// Create an empty registry
    ///
    /// `alpha` is the smoothing constant, `neutral` the starting reputation of
    /// providers without history.
    pub fn new(alpha: f64, neutral: f64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            alpha: clamp_unit(alpha),
            neutral: clamp_unit(neutral),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ReputationEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ReputationEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Smoothing constant
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reputation of providers without history
    pub fn neutral(&self) -> f64 {
        self.neutral
    }

    /// Current reputation of `source` (neutral if unknown)
    pub fn get(&self, source: &str) -> f64 {
        self.read()
            .get(source)
            .map(|entry| entry.score)
            .unwrap_or(self.neutral)
    }

    /// Full entry for `source`, if it has any history
    pub fn entry(&self, source: &str) -> Option<ReputationEntry> {
        self.read().get(source).cloned()
    }

    /// Fold one outcome score into the reputation of `source`
    ///
    /// Returns the new reputation.
    pub fn update(&self, source: &str, outcome_score: f64) -> f64 {
        let outcome = clamp_unit(outcome_score);
        let now = current_timestamp_ms();

        let mut entries = self.write();
        let entry = entries
            .entry(source.to_string())
            .or_insert_with(|| ReputationEntry {
                score: self.neutral,
                updates: 0,
                last_updated: now,
            });

        entry.score = clamp_unit(entry.score * (1.0 - self.alpha) + outcome * self.alpha);
        entry.updates += 1;
        entry.last_updated = now;
        entry.score
    }

    /// Set the reputation of `source` directly (seeding from config or fixtures)
    pub fn seed(&self, source: &str, score: f64) {
        let mut entries = self.write();
        let now = current_timestamp_ms();
        let entry = entries
            .entry(source.to_string())
            .or_insert_with(|| ReputationEntry {
                score: self.neutral,
                updates: 0,
                last_updated: now,
            });
        entry.score = clamp_unit(score);
        entry.last_updated = now;
    }

    /// All known reputations, keyed by provider id
    pub fn all(&self) -> BTreeMap<String, f64> {
        self.read()
            .iter()
            .map(|(source, entry)| (source.clone(), entry.score))
            .collect()
    }

    /// Number of providers with history
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no provider has history yet
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Copy the registry into a serializable snapshot
    pub fn snapshot(&self) -> ReputationSnapshot {
        ReputationSnapshot {
            entries: self
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            taken_at: current_timestamp_ms(),
        }
    }

    /// Replace the registry contents with `snapshot`
    ///
    /// Scores outside [0, 1] are clamped. Returns the number of entries loaded.
    pub fn restore(&self, snapshot: ReputationSnapshot) -> usize {
        let mut entries = self.write();
        entries.clear();
        for (source, mut entry) in snapshot.entries {
            entry.score = clamp_unit(entry.score);
            entries.insert(source, entry);
        }
        entries.len()
    }

    /// Persist the registry as pretty JSON
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), QualityError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, contents)?;
        tracing::debug!("Saved {} reputations to {}", self.len(), path.display());
        Ok(())
    }

    /// Load reputations from a file written by [`save_to`](Self::save_to)
    pub fn load_from<P: AsRef<Path>>(&self, path: P) -> Result<usize, QualityError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let snapshot: ReputationSnapshot = serde_json::from_str(&contents)?;
        let loaded = self.restore(snapshot);
        tracing::info!("Loaded {} reputations from {}", loaded, path.display());
        Ok(loaded)
    }
}

impl Default for ReputationRegistry {
    fn default() -> Self {
        Self::new(0.1, 0.5)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: reputation stays in [0, 1] for any outcome sequence
        #[test]
        fn test_reputation_bounded(
            alpha in 0.0f64..=1.0,
            outcomes in proptest::collection::vec(-5.0f64..5.0, 0..64),
        ) {
            let registry = ReputationRegistry::new(alpha, 0.5);
            for outcome in outcomes {
                let rep = registry.update("p", outcome);
                prop_assert!((0.0..=1.0).contains(&rep));
            }
            let rep = registry.get("p");
            prop_assert!((0.0..=1.0).contains(&rep));
        }
    }
}
