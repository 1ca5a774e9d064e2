//! Rate Source - external key/value oracle
//!
//! Supplies the dynamic discount rate and per-account flags. Values are
//! 32-byte big-endian words; a key that was never written reads as zero.
//!
//! # Keys
//!
//! ```text
//! DISCOUNT_RATE              dynamic rate (clamped to 0..=100)
//! ACCOUNT_ACTIVE_<id>        non-zero = active
//! ACCOUNT_BALANCE_<id>       spendable balance
//! PROMO_<id>                 non-zero = eligible for flagged promotions
//! REFERRAL_<id>              referrer account id (zero = none)
//! LOYALTY_POINTS_<id>        mirror of the ledger's loyalty balance
//! ```

pub mod memory;

pub use memory::InMemoryRateSource;

use thiserror::Error;

use crate::core_types::{AccountId, Amount, Percent};

/// Fixed-size oracle value
pub type Word = [u8; 32];

pub const ZERO_WORD: Word = [0u8; 32];

/// Oracle read/write failure. Fatal for the operation that issued it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Rate source error on key {key}: {reason}")]
pub struct RateSourceError {
    pub key: String,
    pub reason: String,
}

impl RateSourceError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// External oracle collaborator
pub trait RateSource: Send + Sync {
    fn get(&self, scope: u64, key: &str) -> Result<Word, RateSourceError>;

    fn set(&self, scope: u64, key: &str, value: Word) -> Result<(), RateSourceError>;
}

pub mod keys {
    use crate::core_types::AccountId;

    pub const DISCOUNT_RATE: &str = "DISCOUNT_RATE";

    pub fn account_active(id: &AccountId) -> String {
        format!("ACCOUNT_ACTIVE_{}", id.to_hex())
    }

    pub fn account_balance(id: &AccountId) -> String {
        format!("ACCOUNT_BALANCE_{}", id.to_hex())
    }

    pub fn promo(id: &AccountId) -> String {
        format!("PROMO_{}", id.to_hex())
    }

    pub fn referral(id: &AccountId) -> String {
        format!("REFERRAL_{}", id.to_hex())
    }

    pub fn loyalty_points(id: &AccountId) -> String {
        format!("LOYALTY_POINTS_{}", id.to_hex())
    }
}

/// Decode a big-endian word, saturating at `u128::MAX` when the high half is set.
pub fn word_to_u128(word: &Word) -> u128 {
    if word[..16].iter().any(|b| *b != 0) {
        return u128::MAX;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    u128::from_be_bytes(low)
}

pub fn word_from_u128(value: u128) -> Word {
    let mut word = ZERO_WORD;
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

#[inline]
pub fn word_is_set(word: &Word) -> bool {
    word != &ZERO_WORD
}

/// Typed reads against one oracle scope.
pub struct ScopedRates<'a> {
    source: &'a dyn RateSource,
    scope: u64,
}

impl<'a> ScopedRates<'a> {
    pub fn new(source: &'a dyn RateSource, scope: u64) -> Self {
        Self { source, scope }
    }

    pub fn scope(&self) -> u64 {
        self.scope
    }

    pub fn read_rate(&self, key: &str) -> Result<Percent, RateSourceError> {
        let word = self.source.get(self.scope, key)?;
        Ok(Percent::clamped(word_to_u128(&word)))
    }

    pub fn read_flag(&self, key: &str) -> Result<bool, RateSourceError> {
        Ok(word_is_set(&self.source.get(self.scope, key)?))
    }

    /// Saturates at `u64::MAX`.
    pub fn read_amount(&self, key: &str) -> Result<Amount, RateSourceError> {
        let word = self.source.get(self.scope, key)?;
        Ok(word_to_u128(&word).min(Amount::MAX as u128) as Amount)
    }

    /// `None` for an unset (all-zero) value.
    pub fn read_account(&self, key: &str) -> Result<Option<AccountId>, RateSourceError> {
        let word = self.source.get(self.scope, key)?;
        if word_is_set(&word) {
            Ok(Some(AccountId::from_bytes(word)))
        } else {
            Ok(None)
        }
    }

    pub fn write_amount(&self, key: &str, value: Amount) -> Result<(), RateSourceError> {
        self.source
            .set(self.scope, key, word_from_u128(value as u128))
    }
}
