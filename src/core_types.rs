//! Core types used throughout the system
//!
//! Identifiers, amounts and percentages shared by the engine, the ledger and
//! the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Amount in the smallest indivisible unit of the transferred value.
pub type Amount = u64;

/// Width of an account identifier in bytes.
pub const ACCOUNT_ID_LEN: usize = 32;

/// Account identifier - opaque, fixed-size.
///
/// # Constraints:
/// - The all-zero id is the "empty" identifier and is rejected by validation
/// - Rendered as 64 lowercase hex chars (also the form used in oracle keys)
///
/// # Parsing:
/// - 64 hex chars, optionally `0x`-prefixed
/// - otherwise a short label (≤ 32 bytes), zero padded on the right
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId([u8; ACCOUNT_ID_LEN]);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Account label is longer than {ACCOUNT_ID_LEN} bytes: {0}")]
    TooLong(String),

    #[error("Invalid hex account id: {0}")]
    InvalidHex(String),
}

impl AccountId {
    /// The empty identifier
    pub const ZERO: AccountId = AccountId([0u8; ACCOUNT_ID_LEN]);

    pub const fn from_bytes(bytes: [u8; ACCOUNT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a short human label (zero padded).
    pub fn from_label(label: &str) -> Result<Self, AccountIdError> {
        let raw = label.as_bytes();
        if raw.len() > ACCOUNT_ID_LEN {
            return Err(AccountIdError::TooLong(label.to_string()));
        }
        let mut bytes = [0u8; ACCOUNT_ID_LEN];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self(bytes))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_LEN] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; ACCOUNT_ID_LEN]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_hex())
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() == ACCOUNT_ID_LEN * 2 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            let mut bytes = [0u8; ACCOUNT_ID_LEN];
            hex::decode_to_slice(digits, &mut bytes)
                .map_err(|e| AccountIdError::InvalidHex(e.to_string()))?;
            return Ok(Self(bytes));
        }
        Self::from_label(s)
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_hex()
    }
}

/// Whole-number percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percent(u8);

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Percentage out of range: {0} (must be 0..=100)")]
pub struct PercentOutOfRange(pub u64);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(100);

    pub fn new(value: u8) -> Result<Self, PercentOutOfRange> {
        if value > 100 {
            Err(PercentOutOfRange(value as u64))
        } else {
            Ok(Self(value))
        }
    }

    /// Clamp an arbitrary oracle value into `0..=100`.
    pub fn clamped(value: u128) -> Self {
        Self(value.min(100) as u8)
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Amount kept after taking this percentage off, truncated toward zero.
    ///
    /// ```
    /// use discount_transfer::core_types::Percent;
    /// let fifteen = Percent::new(15).unwrap();
    /// assert_eq!(fifteen.retain(1000), 850);
    /// ```
    #[inline]
    pub fn retain(&self, amount: Amount) -> Amount {
        // (100 - p) / 100 <= 1, so the result always fits back into u64
        ((amount as u128 * (100 - self.0 as u128)) / 100) as Amount
    }

    /// `self%` of `amount`, truncated toward zero.
    #[inline]
    pub fn portion_of(&self, amount: Amount) -> Amount {
        ((amount as u128 * self.0 as u128) / 100) as Amount
    }
}

impl TryFrom<u8> for Percent {
    type Error = PercentOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Percent::new(value)
    }
}

impl From<Percent> for u8 {
    fn from(p: Percent) -> Self {
        p.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Transaction ID - ULID-based unique identifier
///
/// Monotonic and sortable, so history order matches id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TransactionId(ulid::Ulid);

impl TransactionId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    pub fn inner(&self) -> ulid::Ulid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransactionId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl TryFrom<String> for TransactionId {
    type Error = ulid::DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.0.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_label_and_hex() {
        let alice = AccountId::from_label("alice").unwrap();
        assert!(!alice.is_empty());
        assert_eq!(&alice.as_bytes()[..5], b"alice");

        let parsed: AccountId = alice.to_hex().parse().unwrap();
        assert_eq!(parsed, alice);

        let prefixed: AccountId = format!("0x{}", alice.to_hex()).parse().unwrap();
        assert_eq!(prefixed, alice);
    }

    #[test]
    fn test_account_id_empty() {
        assert!(AccountId::ZERO.is_empty());
        assert!(AccountId::from_label("").unwrap().is_empty());
        assert!(AccountId::from_label(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_account_id_serde_as_hex() {
        let bob = AccountId::from_label("bob").unwrap();
        let json = serde_json::to_string(&bob).unwrap();
        assert_eq!(json, format!("\"{}\"", bob.to_hex()));

        let from_label: AccountId = serde_json::from_str("\"bob\"").unwrap();
        assert_eq!(from_label, bob);
    }

    #[test]
    fn test_percent_bounds() {
        assert!(Percent::new(100).is_ok());
        assert_eq!(Percent::new(101), Err(PercentOutOfRange(101)));
        assert_eq!(Percent::clamped(250).value(), 100);
        assert!(serde_json::from_str::<Percent>("101").is_err());
    }

    #[test]
    fn test_percent_retain_truncates() {
        let five = Percent::new(5).unwrap();
        // 850 * 95 / 100 = 807.5 -> 807
        assert_eq!(five.retain(850), 807);
        assert_eq!(five.portion_of(850), 42);
        assert_eq!(Percent::HUNDRED.retain(1234), 0);
        assert_eq!(Percent::ZERO.retain(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_transaction_id_ordering() {
        let a = TransactionId::new();
        let recovered: TransactionId = a.to_string().parse().unwrap();
        assert_eq!(a, recovered);
    }
}
