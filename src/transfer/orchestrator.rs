//! Transfer Orchestrator
//!
//! Drives one discounted purchase from request to committed record.
//!
//! # Flow
//!
//! ```text
//! guard ─► validate ─► pause ─► active ─► balance ─► price ─► prepare
//!                                                              │
//!        receipt ◄─ mirror ◄─ events ◄─ record_success ◄─ custom_transfer
//! ```
//!
//! Nothing is written before the external transfer succeeds, and the ledger
//! lock is never held while it runs.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::adapters::{AccountGate, TokenTransfer, TransferCall};
use super::error::{CheckoutError, ValidationError};
use super::guard::ReentrancyGuard;
use super::types::{OpResult, PurchaseRequest, TransferReceipt};
use crate::admin::PauseState;
use crate::core_types::{AccountId, TransactionId};
use crate::discount::{DiscountPolicyEngine, DiscountQuote};
use crate::events::{DomainEvent, EventSink};
use crate::ledger::{
    Account, AccountSnapshot, CommitSummary, PurchaseCommit, PurchaseLedger, TransactionRecord,
};
use crate::rate_source::{RateSource, ScopedRates, keys};

pub struct TransferOrchestrator {
    engine: Arc<DiscountPolicyEngine>,
    ledger: Arc<PurchaseLedger>,
    rates: Arc<dyn RateSource>,
    gate: Arc<dyn AccountGate>,
    token: Arc<dyn TokenTransfer>,
    pause: Arc<dyn PauseState>,
    events: Arc<dyn EventSink>,
    guard: ReentrancyGuard,
}

impl TransferOrchestrator {
    pub fn new(
        engine: Arc<DiscountPolicyEngine>,
        ledger: Arc<PurchaseLedger>,
        rates: Arc<dyn RateSource>,
        gate: Arc<dyn AccountGate>,
        token: Arc<dyn TokenTransfer>,
        pause: Arc<dyn PauseState>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            engine,
            ledger,
            rates,
            gate,
            token,
            pause,
            events,
            guard: ReentrancyGuard::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<PurchaseLedger> {
        &self.ledger
    }

    pub fn engine(&self) -> &Arc<DiscountPolicyEngine> {
        &self.engine
    }

    pub fn account(&self, id: &AccountId) -> Account {
        self.ledger.account(id)
    }

    pub fn query(&self, id: &AccountId) -> AccountSnapshot {
        self.ledger.query(id)
    }

    /// Price a request without executing it.
    ///
    /// Only input validation applies; pause, activity and balance are not checked.
    pub fn quote(&self, req: &PurchaseRequest) -> Result<DiscountQuote, CheckoutError> {
        validate(req)?;
        let account = self.ledger.account(&req.from);
        Ok(self
            .engine
            .quote(req.amount, &account, self.rates.as_ref(), req.options)?)
    }

    /// Execute a discounted purchase.
    ///
    /// On any error, counts, points, history and events are untouched.
    pub fn execute(&self, req: &PurchaseRequest) -> Result<TransferReceipt, CheckoutError> {
        let _entered = self.guard.enter().inspect_err(|_| {
            warn!(trace_id = %req.trace_id, "Reentrant execute rejected");
        })?;

        self.check_preconditions(req).inspect_err(|e| {
            info!(trace_id = %req.trace_id, code = e.code(), error = %e, "Purchase rejected");
        })?;

        // Price against the buyer's current row
        let account = self.ledger.account(&req.from);
        let quote = self
            .engine
            .apply(req.amount, &account, self.rates.as_ref(), req.options)?;
        let loyalty_earned = self.engine.loyalty_earned(quote.discounted_amount);

        let transaction_id = TransactionId::new();
        let commit = PurchaseCommit {
            account: req.from,
            transaction: TransactionRecord {
                id: transaction_id,
                sender: req.sender,
                source: req.from,
                destination: req.to,
                amount: req.amount,
                discounted_amount: quote.discounted_amount,
                item: req.item.clone(),
                memo: req.memo.clone(),
                trace_id: req.trace_id.clone(),
                timestamp: self.engine.clock().now(),
            },
            loyalty_delta: loyalty_earned,
            effects: quote.effects.clone(),
        };
        self.ledger.prepare(&commit)?;

        // External transfer, exactly once
        let misc2 = req.amount.to_string();
        let call = TransferCall {
            sender: req.sender,
            from: req.from,
            to: req.to,
            amount: quote.discounted_amount,
            misc1: &req.item,
            misc2: &misc2,
            memo: &req.memo,
            trace_id: &req.trace_id,
        };
        debug!(
            trace_id = %req.trace_id,
            adapter = self.token.name(),
            amount = quote.discounted_amount,
            "Calling token transfer"
        );
        if let OpResult::Failed(reason) = self.token.custom_transfer(&call) {
            warn!(
                trace_id = %req.trace_id,
                adapter = self.token.name(),
                reason = %reason,
                "Token transfer failed, nothing committed"
            );
            return Err(CheckoutError::TransferFailed(reason));
        }

        // Value has moved; from here on the purchase cannot fail
        let summary = self.ledger.record_success(commit);
        if summary.points_redeemed < quote.points_redeemed() {
            error!(
                trace_id = %req.trace_id,
                quoted = quote.points_redeemed(),
                spent = summary.points_redeemed,
                "CRITICAL: loyalty points changed during transfer"
            );
        }

        self.publish_events(req, &quote, &summary);
        self.mirror_loyalty(&req.from, summary.loyalty_points);
        if let Some((referrer, _)) = summary.referral_reward {
            let points = self.ledger.account(&referrer).loyalty_points();
            self.mirror_loyalty(&referrer, points);
        }

        info!(
            trace_id = %req.trace_id,
            tx = %transaction_id,
            account = %req.from,
            original = req.amount,
            discounted = quote.discounted_amount,
            policy = %quote.winning_policy,
            purchase_count = summary.purchase_count,
            "Purchase committed"
        );

        Ok(TransferReceipt {
            transaction_id,
            trace_id: req.trace_id.clone(),
            original_amount: req.amount,
            discounted_amount: quote.discounted_amount,
            effective_rate: quote.effective_rate,
            winning_policy: quote.winning_policy,
            loyalty_redeemed: summary.points_redeemed,
            loyalty_earned,
            purchase_count: summary.purchase_count,
            loyalty_points: summary.loyalty_points,
        })
    }

    fn check_preconditions(&self, req: &PurchaseRequest) -> Result<(), CheckoutError> {
        validate(req)?;

        if self.pause.is_paused() {
            return Err(CheckoutError::Paused);
        }

        for id in [&req.sender, &req.from, &req.to] {
            if !self.gate.is_active(id)? {
                return Err(CheckoutError::AccountInactive(*id));
            }
        }

        let available = self.gate.balance_of(&req.from)?;
        if available < req.amount {
            return Err(CheckoutError::InsufficientBalance {
                available,
                required: req.amount,
            });
        }
        Ok(())
    }

    fn publish_events(&self, req: &PurchaseRequest, quote: &DiscountQuote, summary: &CommitSummary) {
        self.events.publish(DomainEvent::DiscountApplied {
            account: req.from,
            item: req.item.clone(),
            original_amount: req.amount,
            discounted_amount: quote.discounted_amount,
        });
        self.events.publish(DomainEvent::TransferCompleted {
            sender: req.sender,
            from: req.from,
            to: req.to,
            amount: quote.discounted_amount,
            misc1: req.item.clone(),
            misc2: req.amount.to_string(),
        });
        self.events.publish(DomainEvent::PurchaseCountIncremented {
            account: req.from,
            new_count: summary.purchase_count,
        });
        if summary.points_redeemed > 0 {
            self.events.publish(DomainEvent::LoyaltyRedeemed {
                account: req.from,
                points: summary.points_redeemed,
            });
        }
        if let Some((referrer, points)) = summary.referral_reward {
            self.events.publish(DomainEvent::ReferralRewarded {
                referrer,
                referred: req.from,
                points,
            });
        }
    }

    /// Best effort: the ledger stays authoritative if the write fails.
    fn mirror_loyalty(&self, id: &AccountId, points: u64) {
        let rates = ScopedRates::new(self.rates.as_ref(), self.engine.scope());
        if let Err(e) = rates.write_amount(&keys::loyalty_points(id), points) {
            warn!(account = %id, error = %e, "Loyalty mirror write failed");
        }
    }
}

fn validate(req: &PurchaseRequest) -> Result<(), ValidationError> {
    for (field, id) in [("sender", &req.sender), ("from", &req.from), ("to", &req.to)] {
        if id.is_empty() {
            return Err(ValidationError::EmptyIdentifier(field));
        }
    }
    if req.amount == 0 {
        return Err(ValidationError::InvalidAmount);
    }
    if req.memo.is_empty() {
        return Err(ValidationError::EmptyMemo);
    }
    if req.trace_id.is_empty() {
        return Err(ValidationError::EmptyTraceId);
    }
    Ok(())
}
