use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the holdings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserRef {
    pub id: i64,
}

/// Security classification carried on each holding.
///
/// String representations match the holdings store format (e.g. `"bond"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityType {
    Equity,
    Bond,
    Other,
}

impl SecurityType {
    /// Parse a store-format string; unknown or missing values map to `Other`.
    pub fn from_store(s: Option<&str>) -> Self {
        match s {
            Some("equity") | Some("share") | Some("stock") => Self::Equity,
            Some("bond") => Self::Bond,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Bond => "bond",
            Self::Other => "other",
        }
    }

    /// Human-facing label used in notification messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Equity => "stock",
            Self::Bond => "bond",
            Self::Other => "security",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked security in a user's portfolio.
///
/// Holdings without a ticker cannot be priced and are skipped by the monitor.
#[derive(Debug, Clone)]
pub struct Holding {
    pub ticker: Option<String>,
    pub isin: Option<String>,
    pub security_type: SecurityType,
    pub name: String,
}

/// A current-price observation from one market data provider.
#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub ticker: String,
    /// Last traded price; usable only when present and strictly positive.
    pub last_price: Option<f64>,
    pub provider: String,
    // Reserved for freshness diagnostics
    #[allow(dead_code)]
    pub fetched_at: DateTime<Utc>,
}

/// Composite security identity: ticker concatenated with the ISIN
/// (empty string when absent). Disambiguates same-ticker securities
/// that differ in ISIN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecurityKey(String);

impl SecurityKey {
    pub fn new(ticker: &str, isin: Option<&str>) -> Self {
        Self(format!("{}{}", ticker, isin.unwrap_or("")))
    }
}

impl fmt::Display for SecurityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A significant price movement detected for one user's holding.
///
/// Exists only within one monitoring cycle's output list.
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub user_id: i64,
    pub ticker: String,
    pub name: String,
    pub security_type: SecurityType,
    pub old_price: f64,
    pub new_price: f64,
    /// Signed percentage: `(new - old) / old * 100`.
    pub change_pct: f64,
    pub isin: Option<String>,
    pub provider: Option<String>,
}

/// Signed percentage change from `old` to `new`. `old` must be non-zero.
pub fn percent_change(old: f64, new: f64) -> f64 {
    (new - old) / old * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_change_sign_matches_direction() {
        assert!(percent_change(100.0, 110.0) > 0.0);
        assert!(percent_change(100.0, 90.0) < 0.0);
        assert_eq!(percent_change(100.0, 100.0), 0.0);
    }

    #[test]
    fn percent_change_exact_values() {
        assert!((percent_change(150.0, 151.5) - 1.0).abs() < 1e-9);
        assert!((percent_change(200.0, 150.0) - (-25.0)).abs() < 1e-9);
    }

    #[test]
    fn security_key_includes_isin_when_present() {
        let with = SecurityKey::new("BND", Some("RU1"));
        let without = SecurityKey::new("BND", None);
        assert_ne!(with, without);
        assert_eq!(with, SecurityKey::new("BND", Some("RU1")));
        assert_eq!(without.to_string(), "BND");
    }

    #[test]
    fn security_type_from_store_maps_known_values() {
        assert_eq!(SecurityType::from_store(Some("bond")), SecurityType::Bond);
        assert_eq!(SecurityType::from_store(Some("share")), SecurityType::Equity);
        assert_eq!(SecurityType::from_store(Some("equity")), SecurityType::Equity);
        assert_eq!(SecurityType::from_store(Some("fund")), SecurityType::Other);
        assert_eq!(SecurityType::from_store(None), SecurityType::Other);
    }

    #[test]
    fn security_type_labels() {
        assert_eq!(SecurityType::Bond.label(), "bond");
        assert_eq!(SecurityType::Equity.label(), "stock");
        assert_eq!(SecurityType::Other.label(), "security");
    }
}
