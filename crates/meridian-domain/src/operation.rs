//! Operation module - a named logical request and its parameters

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A logical request such as `get_quote {"symbol": "AAPL"}`
///
/// Identity is `(name, canonicalized params)`: two operations whose parameter
/// objects differ only in key order are the same operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name, as used in the operation→providers table
    pub name: String,

    /// Parameter bag (usually a JSON object)
    #[serde(default)]
    pub params: Value,
}

impl Operation {
    /// Create a new operation
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Canonical string form of the parameters (keys sorted recursively)
    pub fn canonical_params(&self) -> String {
        canonicalize(&self.params).to_string()
    }

    /// Deterministic key for caching and in-flight deduplication
    ///
    /// # Examples
    ///
    /// ```
    /// use meridian_domain::Operation;
    /// use serde_json::json;
    ///
    /// let a = Operation::new("get_quote", json!({"symbol": "AAPL", "exchange": "NASDAQ"}));
    /// let b = Operation::new("get_quote", json!({"exchange": "NASDAQ", "symbol": "AAPL"}));
    /// assert_eq!(a.key(), b.key());
    /// ```
    pub fn key(&self) -> String {
        format!("op:{}:{}", self.name, self.canonical_params())
    }

    /// Key scoped to a single provider
    pub fn provider_key(&self, provider: &str) -> String {
        format!("{}@{}", self.key(), provider)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.canonical_params())
    }
}

/// Return a copy of `value` with every object's keys sorted
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ignores_param_order() {
        let a = Operation::new("get_quote", json!({"b": 1, "a": {"y": 2, "x": 1}}));
        let b = Operation::new("get_quote", json!({"a": {"x": 1, "y": 2}, "b": 1}));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_distinguishes_names_and_values() {
        let a = Operation::new("get_quote", json!({"symbol": "AAPL"}));
        let b = Operation::new("get_quote", json!({"symbol": "MSFT"}));
        let c = Operation::new("get_fundamentals", json!({"symbol": "AAPL"}));
        assert_ne!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_provider_key() {
        let op = Operation::new("get_quote", json!({"symbol": "AAPL"}));
        assert_eq!(
            op.provider_key("alpha"),
            r#"op:get_quote:{"symbol":"AAPL"}@alpha"#
        );
    }

    #[test]
    fn test_display() {
        let op = Operation::new("get_quote", json!({"symbol": "AAPL"}));
        assert_eq!(op.to_string(), r#"get_quote({"symbol":"AAPL"})"#);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: canonicalization is idempotent
        #[test]
        fn test_canonicalize_idempotent(keys in proptest::collection::vec("[a-z]{1,6}", 0..8)) {
            let mut map = Map::new();
            for (i, key) in keys.iter().enumerate() {
                map.insert(key.clone(), Value::from(i as u64));
            }
            let value = Value::Object(map);
            let once = canonicalize(&value);
            let twice = canonicalize(&once);
            prop_assert_eq!(once.to_string(), twice.to_string());
        }
    }
}
