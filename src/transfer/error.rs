//! Checkout Error Types
//!
//! One taxonomy for every way a discounted purchase can be refused.
//! Every variant is raised before the ledger commits anything.

use thiserror::Error;

use crate::core_types::{AccountId, Amount};
use crate::discount::DiscountError;
use crate::ledger::LedgerError;
use crate::rate_source::RateSourceError;

/// Input problems, rejected before any state is read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Account identifier is empty: {0}")]
    EmptyIdentifier(&'static str),

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Memo is empty")]
    EmptyMemo,

    #[error("Trace id is empty")]
    EmptyTraceId,

    #[error("Array length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Rate out of range: {0} (must be 0..=100)")]
    RateOutOfRange(u64),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckoutError {
    // === Validation Errors ===
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    // === Collaborator Errors ===
    #[error(transparent)]
    RateSource(#[from] RateSourceError),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    // === Execution Errors ===
    #[error("Reentrant call rejected")]
    ReentrantCall,

    #[error("Purchases are paused")]
    Paused,

    // === Account Errors ===
    #[error("Account is not active: {0}")]
    AccountInactive(AccountId),

    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance { available: Amount, required: Amount },

    // === Policy Errors ===
    #[error("Insufficient loyalty points: have {available}, need {required}")]
    InsufficientLoyaltyPoints { available: u64, required: u64 },

    #[error("Referral already used by account {0}")]
    ReferralAlreadyUsed(AccountId),

    #[error("Promotion {window_id} already claimed by account {account}")]
    PromotionAlreadyClaimed { account: AccountId, window_id: u32 },

    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl CheckoutError {
    /// Stable error code for logs and API responses
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::Validation(ValidationError::EmptyIdentifier(_)) => "EMPTY_IDENTIFIER",
            CheckoutError::Validation(ValidationError::InvalidAmount) => "INVALID_AMOUNT",
            CheckoutError::Validation(ValidationError::EmptyMemo) => "EMPTY_MEMO",
            CheckoutError::Validation(ValidationError::EmptyTraceId) => "EMPTY_TRACE_ID",
            CheckoutError::Validation(ValidationError::LengthMismatch { .. }) => "LENGTH_MISMATCH",
            CheckoutError::Validation(ValidationError::RateOutOfRange(_)) => "RATE_OUT_OF_RANGE",
            CheckoutError::RateSource(_) => "RATE_SOURCE_ERROR",
            CheckoutError::TransferFailed(_) => "TRANSFER_FAILED",
            CheckoutError::ReentrantCall => "REENTRANT_CALL",
            CheckoutError::Paused => "PAUSED",
            CheckoutError::AccountInactive(_) => "ACCOUNT_INACTIVE",
            CheckoutError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            CheckoutError::InsufficientLoyaltyPoints { .. } => "INSUFFICIENT_LOYALTY_POINTS",
            CheckoutError::ReferralAlreadyUsed(_) => "REFERRAL_ALREADY_USED",
            CheckoutError::PromotionAlreadyClaimed { .. } => "PROMOTION_ALREADY_CLAIMED",
            CheckoutError::Overflow(_) => "OVERFLOW",
        }
    }

    /// Whether the same request may simply be sent again.
    ///
    /// `ReentrantCall` is never retryable from the same call stack.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::RateSource(_) | CheckoutError::TransferFailed(_) | CheckoutError::Paused
        )
    }
}

impl From<DiscountError> for CheckoutError {
    fn from(e: DiscountError) -> Self {
        match e {
            DiscountError::InvalidAmount => ValidationError::InvalidAmount.into(),
            DiscountError::RateSource(e) => CheckoutError::RateSource(e),
            DiscountError::InsufficientLoyaltyPoints {
                available,
                required,
            } => CheckoutError::InsufficientLoyaltyPoints {
                available,
                required,
            },
            DiscountError::Overflow => CheckoutError::Overflow("pricing".to_string()),
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InsufficientLoyaltyPoints {
                available,
                required,
            } => CheckoutError::InsufficientLoyaltyPoints {
                available,
                required,
            },
            LedgerError::ReferralAlreadyUsed(id) => CheckoutError::ReferralAlreadyUsed(id),
            LedgerError::PromotionAlreadyClaimed { account, window_id } => {
                CheckoutError::PromotionAlreadyClaimed { account, window_id }
            }
            LedgerError::Overflow(what) => CheckoutError::Overflow(what.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CheckoutError::ReentrantCall.code(), "REENTRANT_CALL");
        assert_eq!(
            CheckoutError::from(ValidationError::EmptyMemo).code(),
            "EMPTY_MEMO"
        );
        assert_eq!(
            CheckoutError::TransferFailed("nope".into()).code(),
            "TRANSFER_FAILED"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(CheckoutError::TransferFailed("x".into()).is_retryable());
        assert!(CheckoutError::RateSource(RateSourceError::new("K", "down")).is_retryable());
        assert!(!CheckoutError::ReentrantCall.is_retryable());
        assert!(!CheckoutError::from(ValidationError::InvalidAmount).is_retryable());
    }

    #[test]
    fn test_discount_error_mapping() {
        assert_eq!(
            CheckoutError::from(DiscountError::InvalidAmount),
            CheckoutError::Validation(ValidationError::InvalidAmount)
        );
        let mapped = CheckoutError::from(LedgerError::Overflow("purchase_count"));
        assert_eq!(mapped.to_string(), "Arithmetic overflow: purchase_count");
    }

    #[test]
    fn test_display() {
        let err = CheckoutError::InsufficientBalance {
            available: 5,
            required: 10,
        };
        assert_eq!(err.to_string(), "Insufficient balance: have 5, need 10");
    }
}
