//! Purchase Ledger
//!
//! Owns every per-account purchase row and the append-only transaction log.
//!
//! # Write Path
//!
//! ```text
//! prepare(commit)        validate only, before the external transfer
//!        │
//!   transfer succeeds
//!        ▼
//! record_success(commit) apply every delta under one lock, never refused
//! ```
//!
//! `prepare` runs to completion before the first field is touched, so a
//! rejected purchase leaves rows and history unchanged. Once value has moved
//! the commit always lands; drift since `prepare` is reconciled and logged.

pub mod account;
pub mod record;

pub use account::Account;
pub use record::TransactionRecord;

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::core_types::{AccountId, Percent};
use crate::discount::PolicyEffect;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient loyalty points: have {available}, need {required}")]
    InsufficientLoyaltyPoints { available: u64, required: u64 },

    #[error("Referral already used by account {0}")]
    ReferralAlreadyUsed(AccountId),

    #[error("Promotion {window_id} already claimed by account {account}")]
    PromotionAlreadyClaimed { account: AccountId, window_id: u32 },

    #[error("Ledger overflow on {0}")]
    Overflow(&'static str),
}

/// Everything one successful purchase writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseCommit {
    /// Buyer whose row advances
    pub account: AccountId,
    pub transaction: TransactionRecord,
    /// Points earned by the buyer for this purchase
    pub loyalty_delta: u64,
    pub effects: Vec<PolicyEffect>,
}

/// Row state right after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub purchase_count: u64,
    pub loyalty_points: u64,
    pub points_redeemed: u64,
    /// Referrer credited by this commit, with the points credited
    pub referral_reward: Option<(AccountId, u64)>,
}

/// Read-only view returned by [`PurchaseLedger::query`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub purchase_count: u64,
    pub loyalty_points: u64,
    pub history: Vec<TransactionRecord>,
}

#[derive(Default)]
struct LedgerState {
    accounts: FxHashMap<AccountId, Account>,
    history: Vec<TransactionRecord>,
    /// account -> positions in `history` where it was the buyer
    by_account: FxHashMap<AccountId, Vec<usize>>,
}

impl LedgerState {
    fn row(&self, id: &AccountId) -> Account {
        self.accounts
            .get(id)
            .cloned()
            .unwrap_or_else(|| Account::new(*id))
    }

    fn row_mut(&mut self, id: AccountId) -> &mut Account {
        self.accounts
            .entry(id)
            .or_insert_with(|| Account::new(id))
    }

    fn validate(&self, commit: &PurchaseCommit) -> Result<(), LedgerError> {
        let row = self.row(&commit.account);

        row.purchase_count()
            .checked_add(1)
            .ok_or(LedgerError::Overflow("purchase_count"))?;

        let mut points = row.loyalty_points();
        for effect in &commit.effects {
            match *effect {
                PolicyEffect::RedeemLoyalty { points: spent } => {
                    points = points.checked_sub(spent).ok_or(
                        LedgerError::InsufficientLoyaltyPoints {
                            available: points,
                            required: spent,
                        },
                    )?;
                }
                PolicyEffect::ConsumeReferral {
                    referrer,
                    reward_points,
                } => {
                    if row.referral_redeemed() || row.purchase_count() > 0 {
                        return Err(LedgerError::ReferralAlreadyUsed(commit.account));
                    }
                    self.row(&referrer)
                        .loyalty_points()
                        .checked_add(reward_points)
                        .ok_or(LedgerError::Overflow("referrer loyalty_points"))?;
                }
                PolicyEffect::ConsumePromotion { window_id } => {
                    if row.claimed_promotion(window_id) {
                        return Err(LedgerError::PromotionAlreadyClaimed {
                            account: commit.account,
                            window_id,
                        });
                    }
                }
            }
        }
        points
            .checked_add(commit.loyalty_delta)
            .ok_or(LedgerError::Overflow("loyalty_points"))?;
        Ok(())
    }
}

pub struct PurchaseLedger {
    state: Mutex<LedgerState>,
}

impl Default for PurchaseLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ============================================================
    // QUERY OPERATIONS (Read-Only)
    // ============================================================

    /// Current row; zero-valued for an account never seen.
    pub fn account(&self, id: &AccountId) -> Account {
        self.lock().row(id)
    }

    pub fn query(&self, id: &AccountId) -> AccountSnapshot {
        let state = self.lock();
        let row = state.row(id);
        let history = state
            .by_account
            .get(id)
            .map(|positions| {
                positions
                    .iter()
                    .map(|&i| state.history[i].clone())
                    .collect()
            })
            .unwrap_or_default();
        AccountSnapshot {
            purchase_count: row.purchase_count(),
            loyalty_points: row.loyalty_points(),
            history,
        }
    }

    /// Every recorded transaction, oldest first.
    pub fn history(&self) -> Vec<TransactionRecord> {
        self.lock().history.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().history.len()
    }

    // ============================================================
    // PURCHASE COMMIT
    // ============================================================

    /// Check that `commit` would apply cleanly against the current rows.
    pub fn prepare(&self, commit: &PurchaseCommit) -> Result<(), LedgerError> {
        self.lock().validate(commit)
    }

    /// Apply a confirmed purchase as one unit.
    ///
    /// Only the transfer orchestrator calls this, after the external transfer
    /// reported success, so it cannot be refused. If a row moved since
    /// [`prepare`](Self::prepare), each effect is reconciled against the
    /// current row instead: a redemption spends at most the points left, and
    /// a referral or promotion already consumed is not consumed again.
    pub(crate) fn record_success(&self, commit: PurchaseCommit) -> CommitSummary {
        let mut state = self.lock();
        if let Err(e) = state.validate(&commit) {
            warn!(
                account = %commit.account,
                tx_id = %commit.transaction.id,
                error = %e,
                "Row changed after prepare, reconciling commit"
            );
        }

        let mut summary = CommitSummary {
            purchase_count: 0,
            loyalty_points: 0,
            points_redeemed: 0,
            referral_reward: None,
        };

        for effect in &commit.effects {
            match *effect {
                PolicyEffect::RedeemLoyalty { points } => {
                    let spent = state.row_mut(commit.account).debit_points(points);
                    if spent < points {
                        error!(
                            account = %commit.account,
                            tx_id = %commit.transaction.id,
                            quoted = points,
                            spent = spent,
                            "CRITICAL: redemption clamped to remaining points"
                        );
                    }
                    summary.points_redeemed += spent;
                }
                PolicyEffect::ConsumeReferral {
                    referrer,
                    reward_points,
                } => {
                    let row = state.row_mut(commit.account);
                    if row.referral_redeemed() {
                        warn!(account = %commit.account, "Referral already consumed, no reward");
                        continue;
                    }
                    row.mark_referral_redeemed();
                    state.row_mut(referrer).credit_points(reward_points);
                    summary.referral_reward = Some((referrer, reward_points));
                }
                PolicyEffect::ConsumePromotion { window_id } => {
                    if !state.row_mut(commit.account).mark_promotion_claimed(window_id) {
                        warn!(account = %commit.account, window_id, "Promotion already claimed");
                    }
                }
            }
        }

        let row = state.row_mut(commit.account);
        row.credit_points(commit.loyalty_delta);
        summary.purchase_count = row.record_purchase(commit.transaction.timestamp);
        summary.loyalty_points = row.loyalty_points();

        let position = state.history.len();
        debug!(
            account = %commit.account,
            tx_id = %commit.transaction.id,
            purchase_count = summary.purchase_count,
            "Purchase recorded"
        );
        state.history.push(commit.transaction);
        state
            .by_account
            .entry(commit.account)
            .or_default()
            .push(position);

        summary
    }

    // ============================================================
    // ADMINISTRATIVE OPERATIONS
    // ============================================================

    pub(crate) fn set_custom_rate(&self, id: AccountId, rate: Option<Percent>) {
        self.lock().row_mut(id).set_custom_discount_rate(rate);
        info!(account = %id, rate = ?rate, "Custom discount rate updated");
    }

    /// Returns the points that were cleared.
    pub(crate) fn reset_loyalty_points(&self, id: AccountId) -> u64 {
        let mut state = self.lock();
        let row = state.row_mut(id);
        let cleared = row.loyalty_points();
        row.reset_points();
        info!(account = %id, cleared = cleared, "Loyalty points reset");
        cleared
    }
}
