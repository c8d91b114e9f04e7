//! Type definitions for transfer tracing
//! Addresses, transfers, paths and the discrete labels attached to them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::{AppError, AppResult};
use crate::utils::constants::{
    ADDRESS_LEN, ADDRESS_PREFIX, ADDRESS_SHORT_LEN, BAND_CRITICAL, BAND_HIGH, BAND_LOW_MEDIUM,
    BAND_MEDIUM,
};

// ============================================
// Address
// ============================================

/// Validated ledger address (fixed prefix, fixed length)
///
/// Ordering is plain string ordering, which is what deterministic
/// tie-breaks across the analytics layer rely on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and wrap a raw address
    pub fn parse(raw: &str) -> AppResult<Self> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AppError::invalid_address(raw))
        }
    }

    /// Fixed-format check: prefix character and total length
    #[inline]
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == ADDRESS_LEN && raw.starts_with(ADDRESS_PREFIX) && raw.is_ascii()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for warnings and log lines
    pub fn short(&self) -> String {
        format!("{}...", &self.0[..ADDRESS_SHORT_LEN])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(AppError::invalid_address(&value))
        }
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================
// Direction
// ============================================

/// Which side of an address's transfers to fetch and follow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Outgoing transfers, follow receivers
    From,
    /// Incoming transfers, follow senders
    To,
    /// Both sides
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::From => "from",
            Direction::To => "to",
            Direction::Both => "both",
        }
    }

    /// Receivers of outgoing transfers are followed
    pub fn follows_receivers(&self) -> bool {
        matches!(self, Direction::From | Direction::Both)
    }

    /// Senders of incoming transfers are followed
    pub fn follows_senders(&self) -> bool {
        matches!(self, Direction::To | Direction::Both)
    }
}

// ============================================
// Transfer
// ============================================

/// One on-chain token movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub from: Address,
    pub to: Address,
    /// Whole-token amount (converted from minor units)
    pub amount: f64,
    /// Block timestamp in milliseconds
    pub timestamp_ms: i64,
    pub tx_hash: String,
}

// ============================================
// Path
// ============================================

/// Ordered address sequence; hop count is len - 1
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Address>);

impl Path {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }

    /// Single-node path
    pub fn single(address: Address) -> Self {
        Self(vec![address])
    }

    pub fn hops(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn addresses(&self) -> &[Address] {
        &self.0
    }

    pub fn first(&self) -> Option<&Address> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Address> {
        self.0.last()
    }

    /// Consecutive (from, to) pairs
    pub fn hop_pairs(&self) -> impl Iterator<Item = (&Address, &Address)> {
        self.0.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// No address repeats
    pub fn is_simple(&self) -> bool {
        let mut seen = std::collections::HashSet::with_capacity(self.0.len());
        self.0.iter().all(|a| seen.insert(a))
    }
}

impl From<Vec<Address>> for Path {
    fn from(addresses: Vec<Address>) -> Self {
        Self(addresses)
    }
}

// ============================================
// Discrete labels
// ============================================

/// Behavioral wallet category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletCategory {
    Hot,
    Cold,
    Common,
}

impl WalletCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletCategory::Hot => "hot",
            WalletCategory::Cold => "cold",
            WalletCategory::Common => "common",
        }
    }
}

/// Discrete risk band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Low,
    LowMedium,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band for a 0-100 score, lower edges inclusive
    pub fn from_score(score: f64) -> Self {
        if score >= BAND_CRITICAL {
            RiskLevel::Critical
        } else if score >= BAND_HIGH {
            RiskLevel::High
        } else if score >= BAND_MEDIUM {
            RiskLevel::Medium
        } else if score >= BAND_LOW_MEDIUM {
            RiskLevel::LowMedium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::LowMedium => "low-medium",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "✅",
            RiskLevel::LowMedium => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "⚠️",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";

    #[test]
    fn test_address_validation() {
        assert!(Address::parse(VALID).is_ok());
        assert!(Address::parse("").is_err());
        assert!(Address::parse("XR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t").is_err());
        assert!(Address::parse("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6").is_err());
        assert!(Address::parse(" TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t").is_err());
    }

    #[test]
    fn test_address_serde_rejects_invalid() {
        let ok: Result<Address, _> = serde_json::from_str(&format!("\"{}\"", VALID));
        assert!(ok.is_ok());
        let bad: Result<Address, _> = serde_json::from_str("\"0xdeadbeef\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_address_short() {
        let addr = Address::parse(VALID).unwrap();
        assert_eq!(addr.short(), "TR7NHqjeKQxG...");
    }

    #[test]
    fn test_path_hops_and_pairs() {
        let a = Address::parse(VALID).unwrap();
        let b = Address::parse("TBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB").unwrap();
        let path = Path::new(vec![a.clone(), b.clone()]);
        assert_eq!(path.hops(), 1);
        assert_eq!(path.hop_pairs().count(), 1);
        assert!(path.is_simple());
        assert_eq!(Path::single(a.clone()).hops(), 0);
        assert!(!Path::new(vec![a.clone(), b, a]).is_simple());
    }

    #[test]
    fn test_risk_level_serialization() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::LowMedium).unwrap(),
            "\"low-medium\""
        );
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::Low < RiskLevel::LowMedium);
    }

    #[test]
    fn test_risk_band_lower_edges_inclusive() {
        assert_eq!(RiskLevel::from_score(70.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(69.99), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(15.0), RiskLevel::LowMedium);
        assert_eq!(RiskLevel::from_score(14.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_direction_follow_rules() {
        assert!(Direction::From.follows_receivers());
        assert!(!Direction::From.follows_senders());
        assert!(Direction::Both.follows_senders() && Direction::Both.follows_receivers());
    }
}
