//! Transfer Core Types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount, TransactionId};
use crate::discount::{PurchaseOptions, RatePolicy};

/// One discounted purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Account initiating the call
    pub sender: AccountId,
    /// Buyer - pays, and owns the purchase history
    pub from: AccountId,
    /// Merchant / recipient
    pub to: AccountId,
    /// Undiscounted price
    pub amount: Amount,
    pub item: String,
    pub memo: String,
    pub trace_id: String,
    #[serde(default)]
    pub options: PurchaseOptions,
}

impl PurchaseRequest {
    pub fn new(
        sender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        item: impl Into<String>,
        memo: impl Into<String>,
        trace_id: impl Into<String>,
    ) -> Self {
        Self {
            sender,
            from,
            to,
            amount,
            item: item.into(),
            memo: memo.into(),
            trace_id: trace_id.into(),
            options: PurchaseOptions::default(),
        }
    }

    pub fn redeem_loyalty(mut self) -> Self {
        self.options.redeem_loyalty = true;
        self
    }
}

/// Result reported by the external token ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    /// Value moved
    Success,
    /// Explicit rejection - nothing moved
    Failed(String),
}

impl OpResult {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, OpResult::Success)
    }

    #[inline]
    pub fn is_explicit_fail(&self) -> bool {
        matches!(self, OpResult::Failed(_))
    }
}

/// What a successful `execute` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transaction_id: TransactionId,
    pub trace_id: String,
    pub original_amount: Amount,
    pub discounted_amount: Amount,
    pub effective_rate: Decimal,
    pub winning_policy: RatePolicy,
    pub loyalty_redeemed: u64,
    pub loyalty_earned: u64,
    pub purchase_count: u64,
    pub loyalty_points: u64,
}
