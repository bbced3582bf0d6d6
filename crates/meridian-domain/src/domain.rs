//! Data domain module - the kind of financial data an operation returns

use serde::{Deserialize, Serialize};

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Domain of the data a provider serves
///
/// Each domain ages at a different pace and declares its own payload shape:
/// - MarketData: quotes and intraday prices, stale within minutes
/// - Fundamentals: ratios and financial statements, stale within days
/// - Filings: regulatory documents, effectively append-only
/// - Economic: published indicators (CPI, rates, payrolls)
/// - WebIntelligence: crawled news and sentiment
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DataDomain {
    /// Real-time and delayed quotes
    #[default]
    MarketData,

    /// Company fundamentals
    Fundamentals,

    /// Regulatory filings
    Filings,

    /// Macro-economic indicators
    Economic,

    /// Crawled web content
    WebIntelligence,
}

impl DataDomain {
    /// All domains, in declaration order
    pub const ALL: [DataDomain; 5] = [
        DataDomain::MarketData,
        DataDomain::Fundamentals,
        DataDomain::Filings,
        DataDomain::Economic,
        DataDomain::WebIntelligence,
    ];

    /// Get the domain name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            DataDomain::MarketData => "market_data",
            DataDomain::Fundamentals => "fundamentals",
            DataDomain::Filings => "filings",
            DataDomain::Economic => "economic",
            DataDomain::WebIntelligence => "web_intelligence",
        }
    }

    /// Parse a domain from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "market_data" | "market" | "quote" => Some(DataDomain::MarketData),
            "fundamentals" | "fundamental" => Some(DataDomain::Fundamentals),
            "filings" | "filing" => Some(DataDomain::Filings),
            "economic" | "economy" => Some(DataDomain::Economic),
            "web_intelligence" | "web" => Some(DataDomain::WebIntelligence),
            _ => None,
        }
    }

    /// Default freshness half-life in milliseconds
    ///
    /// A response this old scores 0.5 freshness; twice as old scores 0.25.
    pub fn freshness_horizon_ms(&self) -> u64 {
        match self {
            DataDomain::MarketData => 5 * MINUTE_MS,
            DataDomain::WebIntelligence => HOUR_MS,
            DataDomain::Economic => DAY_MS,
            DataDomain::Fundamentals => 7 * DAY_MS,
            DataDomain::Filings => 30 * DAY_MS,
        }
    }

    /// Fields a complete payload of this domain is expected to carry
    pub fn expected_fields(&self) -> &'static [&'static str] {
        match self {
            DataDomain::MarketData => &[
                "symbol",
                "price",
                "change",
                "change_percent",
                "volume",
                "timestamp",
            ],
            DataDomain::Fundamentals => &[
                "symbol",
                "market_cap",
                "pe_ratio",
                "eps",
                "revenue",
                "fiscal_period",
            ],
            DataDomain::Filings => &["symbol", "form_type", "filed_at", "url"],
            DataDomain::Economic => &["indicator", "value", "period", "unit"],
            DataDomain::WebIntelligence => &["title", "url", "published_at", "summary"],
        }
    }

    /// Default relative tolerance under which two numeric values agree
    pub fn default_tolerance(&self) -> f64 {
        match self {
            DataDomain::MarketData => 0.001,
            DataDomain::Fundamentals => 0.01,
            DataDomain::Economic => 0.001,
            DataDomain::Filings | DataDomain::WebIntelligence => 0.0,
        }
    }
}

impl std::fmt::Display for DataDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid data domain: {}", s))
    }
}
