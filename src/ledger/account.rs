use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Percent};

/// Per-account purchase state.
///
/// # Invariants (enforced by private fields):
/// 1. `purchase_count` only grows, one step per confirmed transfer
/// 2. `loyalty_points` only shrink through redemption or an admin reset
/// 3. Mutations are crate-private; the ledger is the only writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    purchase_count: u64,
    loyalty_points: u64,
    custom_discount_rate: Option<Percent>,
    last_purchase: Option<DateTime<Utc>>,
    referral_redeemed: bool,
    /// Flagged promotion windows already consumed
    promotions_claimed: FxHashSet<u32>,
}

impl Account {
    /// Zero-valued row, as seen on first reference.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            purchase_count: 0,
            loyalty_points: 0,
            custom_discount_rate: None,
            last_purchase: None,
            referral_redeemed: false,
            promotions_claimed: FxHashSet::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> AccountId {
        self.id
    }

    #[inline]
    pub fn purchase_count(&self) -> u64 {
        self.purchase_count
    }

    #[inline]
    pub fn loyalty_points(&self) -> u64 {
        self.loyalty_points
    }

    #[inline]
    pub fn custom_discount_rate(&self) -> Option<Percent> {
        self.custom_discount_rate
    }

    #[inline]
    pub fn last_purchase(&self) -> Option<DateTime<Utc>> {
        self.last_purchase
    }

    #[inline]
    pub fn referral_redeemed(&self) -> bool {
        self.referral_redeemed
    }

    /// Whether this account already consumed promotional window `window_id`.
    #[inline]
    pub fn claimed_promotion(&self, window_id: u32) -> bool {
        self.promotions_claimed.contains(&window_id)
    }

    // ============================================================
    // LEDGER-ONLY MUTATIONS
    // ============================================================

    pub(crate) fn record_purchase(&mut self, at: DateTime<Utc>) -> u64 {
        self.purchase_count = self.purchase_count.saturating_add(1);
        self.last_purchase = Some(at);
        self.purchase_count
    }

    pub(crate) fn credit_points(&mut self, points: u64) {
        self.loyalty_points = self.loyalty_points.saturating_add(points);
    }

    /// Spends up to `points`; returns what was actually spent.
    pub(crate) fn debit_points(&mut self, points: u64) -> u64 {
        let spent = points.min(self.loyalty_points);
        self.loyalty_points -= spent;
        spent
    }

    pub(crate) fn reset_points(&mut self) {
        self.loyalty_points = 0;
    }

    pub(crate) fn mark_referral_redeemed(&mut self) {
        self.referral_redeemed = true;
    }

    /// Returns false if the window was already claimed.
    pub(crate) fn mark_promotion_claimed(&mut self, window_id: u32) -> bool {
        self.promotions_claimed.insert(window_id)
    }

    pub(crate) fn set_custom_discount_rate(&mut self, rate: Option<Percent>) {
        self.custom_discount_rate = rate;
    }

    /// Test/fixture helper: an account with history already behind it.
    #[cfg(test)]
    pub(crate) fn with_history(id: AccountId, purchase_count: u64, loyalty_points: u64) -> Self {
        Self {
            purchase_count,
            loyalty_points,
            ..Self::new(id)
        }
    }
}
