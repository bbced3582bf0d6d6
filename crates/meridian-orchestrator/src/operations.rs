//! Static operation → providers table

use meridian_domain::DataDomain;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Providers registered for one operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationRoute {
    /// Provider ids in preference order (used to break ranking ties)
    #[serde(default)]
    pub providers: Vec<String>,

    /// Domain of the data the operation returns; defaults to the domain of
    /// the first provider
    #[serde(default)]
    pub domain: Option<DataDomain>,
}

impl OperationRoute {
    /// Create a route over `providers`
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
            domain: None,
        }
    }

    /// Pin the data domain
    pub fn with_domain(mut self, domain: DataDomain) -> Self {
        self.domain = Some(domain);
        self
    }
}

/// Externally editable table mapping operations to their providers
///
/// Loaded from the `[operations]` section of the configuration and shared by
/// the orchestrator and the fusion service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationTable {
    routes: BTreeMap<String, OperationRoute>,
}

impl OperationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the route of `operation`
    pub fn register(&mut self, operation: impl Into<String>, route: OperationRoute) {
        self.routes.insert(operation.into(), route);
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_route(mut self, operation: impl Into<String>, route: OperationRoute) -> Self {
        self.register(operation, route);
        self
    }

    /// Route of `operation`, if registered
    pub fn route(&self, operation: &str) -> Option<&OperationRoute> {
        self.routes.get(operation)
    }

    /// Provider ids registered for `operation`, in table order
    pub fn providers_for(&self, operation: &str) -> &[String] {
        self.routes
            .get(operation)
            .map(|route| route.providers.as_slice())
            .unwrap_or(&[])
    }

    /// Declared domain of `operation`
    pub fn domain_for(&self, operation: &str) -> Option<DataDomain> {
        self.routes.get(operation).and_then(|route| route.domain)
    }

    /// Names of all registered operations
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Iterate over all routes
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationRoute)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route))
    }

    /// Number of registered operations
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no operation is registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl From<BTreeMap<String, OperationRoute>> for OperationTable {
    fn from(routes: BTreeMap<String, OperationRoute>) -> Self {
        Self { routes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let table = OperationTable::new().with_route(
            "get_quote",
            OperationRoute::new(["alpha", "beta"]).with_domain(DataDomain::MarketData),
        );

        assert_eq!(table.providers_for("get_quote"), ["alpha", "beta"]);
        assert_eq!(table.domain_for("get_quote"), Some(DataDomain::MarketData));
        assert!(table.providers_for("get_filings").is_empty());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            [get_quote]
            domain = "market_data"
            providers = ["alpha", "beta"]

            [get_cpi]
            providers = ["fred"]
        "#;

        let table: OperationTable = toml::from_str(toml).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.providers_for("get_cpi"), ["fred"]);
        assert_eq!(table.domain_for("get_cpi"), None);
    }
}
