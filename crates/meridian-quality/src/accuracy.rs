//! Domain plausibility checks
//!
//! Every check that applies to a payload deducts its penalty when it fails;
//! the accuracy score is what remains, floored at zero. A payload on which no
//! check applies has no defined accuracy and the scorer falls back to its
//! neutral value.

use meridian_domain::{DataDomain, Payload};
use serde_json::Value;

/// Outcome of the plausibility checks on one payload
#[derive(Debug, Clone, PartialEq)]
pub struct PlausibilityReport {
    /// Number of checks that applied
    pub checks: usize,

    /// Description of each failed check
    pub failures: Vec<String>,

    /// Accuracy score in [0, 1]
    pub score: f64,
}

#[derive(Default)]
struct Checker {
    checks: usize,
    penalty: f64,
    failures: Vec<String>,
}

impl Checker {
    fn check(&mut self, passed: bool, penalty: f64, description: impl FnOnce() -> String) {
        self.checks += 1;
        if !passed {
            self.penalty += penalty;
            self.failures.push(description());
        }
    }

    fn finish(self) -> Option<PlausibilityReport> {
        if self.checks == 0 {
            return None;
        }
        Some(PlausibilityReport {
            checks: self.checks,
            failures: self.failures,
            score: (1.0 - self.penalty).max(0.0),
        })
    }
}

/// Read a field as a number, accepting numeric strings
fn number(object: &serde_json::Map<String, Value>, field: &str) -> Option<f64> {
    match object.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn non_empty_str(object: &serde_json::Map<String, Value>, field: &str) -> Option<bool> {
    object
        .get(field)
        .map(|v| v.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false))
}

fn http_url(object: &serde_json::Map<String, Value>, field: &str) -> Option<bool> {
    object.get(field).map(|v| {
        v.as_str()
            .map(|s| s.starts_with("http://") || s.starts_with("https://"))
            .unwrap_or(false)
    })
}

/// Run the plausibility checks of `domain` against `payload`
///
/// Arrays are assessed element by element and averaged.
pub fn assess(domain: DataDomain, payload: &Payload) -> Option<PlausibilityReport> {
    match payload {
        Value::Object(object) => assess_object(domain, object),
        Value::Array(items) => {
            let reports: Vec<PlausibilityReport> = items
                .iter()
                .filter_map(|item| item.as_object())
                .filter_map(|object| assess_object(domain, object))
                .collect();
            if reports.is_empty() {
                return None;
            }

            let score = reports.iter().map(|r| r.score).sum::<f64>() / reports.len() as f64;
            Some(PlausibilityReport {
                checks: reports.iter().map(|r| r.checks).sum(),
                failures: reports.into_iter().flat_map(|r| r.failures).collect(),
                score,
            })
        }
        _ => None,
    }
}

fn assess_object(
    domain: DataDomain,
    object: &serde_json::Map<String, Value>,
) -> Option<PlausibilityReport> {
    let mut checker = Checker::default();

    match domain {
        DataDomain::MarketData => {
            if let Some(price) = number(object, "price") {
                checker.check(price.is_finite() && price > 0.0, 0.5, || {
                    format!("price {} is not positive", price)
                });
            }
            if let Some(volume) = number(object, "volume") {
                checker.check(volume >= 0.0, 0.2, || format!("volume {} is negative", volume));
            }
            if let Some(pct) = number(object, "change_percent") {
                checker.check(pct.abs() <= 50.0, 0.2, || {
                    format!("change_percent {} exceeds 50%", pct)
                });
            }
            if let (Some(high), Some(low)) = (number(object, "high"), number(object, "low")) {
                checker.check(high >= low, 0.3, || format!("high {} below low {}", high, low));
                if let Some(price) = number(object, "price") {
                    checker.check(price >= low && price <= high, 0.2, || {
                        format!("price {} outside day range [{}, {}]", price, low, high)
                    });
                }
            }
            if let (Some(bid), Some(ask)) = (number(object, "bid"), number(object, "ask")) {
                checker.check(ask >= bid, 0.2, || format!("ask {} below bid {}", ask, bid));
            }
        }
        DataDomain::Fundamentals => {
            if let Some(cap) = number(object, "market_cap") {
                checker.check(cap >= 0.0, 0.3, || format!("market_cap {} is negative", cap));
            }
            if let Some(pe) = number(object, "pe_ratio") {
                checker.check(pe.abs() <= 1000.0, 0.2, || {
                    format!("pe_ratio {} is implausible", pe)
                });
            }
            if let Some(revenue) = number(object, "revenue") {
                checker.check(revenue >= 0.0, 0.2, || {
                    format!("revenue {} is negative", revenue)
                });
            }
            if let Some(eps) = number(object, "eps") {
                checker.check(eps.is_finite(), 0.1, || "eps is not finite".to_string());
            }
        }
        DataDomain::Filings => {
            if let Some(ok) = non_empty_str(object, "form_type") {
                checker.check(ok, 0.3, || "form_type is empty".to_string());
            }
            if let Some(ok) = http_url(object, "url") {
                checker.check(ok, 0.2, || "url is not http(s)".to_string());
            }
        }
        DataDomain::Economic => {
            if object.contains_key("value") {
                let value = number(object, "value");
                checker.check(value.map(f64::is_finite).unwrap_or(false), 0.5, || {
                    "value is not a finite number".to_string()
                });
            }
        }
        DataDomain::WebIntelligence => {
            if let Some(ok) = non_empty_str(object, "title") {
                checker.check(ok, 0.3, || "title is empty".to_string());
            }
            if let Some(ok) = http_url(object, "url") {
                checker.check(ok, 0.2, || "url is not http(s)".to_string());
            }
            if let Some(sentiment) = number(object, "sentiment") {
                checker.check((-1.0..=1.0).contains(&sentiment), 0.2, || {
                    format!("sentiment {} outside [-1, 1]", sentiment)
                });
            }
        }
    }

    checker.finish()
}
