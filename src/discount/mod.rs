//! Discount Policy Engine
//!
//! Composes every pricing policy into one discounted amount.
//!
//! # Composition Order
//!
//! ```text
//! tier ─┐
//! dynamic (oracle) ─┤
//! promotion ─┼─► best rate (or stacked) ─► cap ─► bulk ─► loyalty ─► discounted
//! override ─┘        ▲
//!                    └── referral replaces this step on a first purchase
//! ```
//!
//! Each percentage step keeps `retained * (100 - rate) / 100`, truncating
//! toward zero, so `0 <= discounted <= amount` always holds.
//!
//! # Quote vs Apply
//!
//! - [`DiscountPolicyEngine::quote`] is a pure read; a loyalty redemption that
//!   cannot be honoured is skipped.
//! - [`DiscountPolicyEngine::apply`] rejects that redemption and is what the
//!   orchestrator uses; its `effects` are committed only after the transfer.

pub mod policy;
pub mod quote;

pub use policy::{
    BulkTable, BulkTier, CompositionMode, DiscountTier, LoyaltyProgram, MAX_DISCOUNT_PERCENT,
    PolicyError, PolicySet, PromotionalWindow, ReferralBonus, TierTable,
};
pub use quote::{DiscountQuote, PolicyEffect, PurchaseOptions, RateBreakdown, RatePolicy};

use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::core_types::{Amount, Percent};
use crate::ledger::Account;
use crate::rate_source::{RateSource, RateSourceError, ScopedRates, keys};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscountError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error(transparent)]
    RateSource(#[from] RateSourceError),

    #[error("Insufficient loyalty points: have {available}, need {required}")]
    InsufficientLoyaltyPoints { available: u64, required: u64 },

    #[error("Arithmetic overflow while pricing")]
    Overflow,
}

pub struct DiscountPolicyEngine {
    policies: RwLock<Arc<PolicySet>>,
    scope: u64,
    clock: Arc<dyn Clock>,
}

impl DiscountPolicyEngine {
    pub fn new(policies: PolicySet, scope: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            scope,
            clock,
        }
    }

    /// Oracle scope this engine reads from
    pub fn scope(&self) -> u64 {
        self.scope
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of the current policy table
    pub fn policies(&self) -> Arc<PolicySet> {
        self.policies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Swap in a whole new policy table.
    pub fn replace(&self, policies: PolicySet) -> Result<(), PolicyError> {
        policies.validate()?;
        *self.policies.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(policies);
        Ok(())
    }

    /// Copy-on-write edit of the policy table.
    ///
    /// Quotes already holding a snapshot keep pricing with the old table. An
    /// edit that leaves the table invalid is dropped.
    pub fn update<F>(&self, edit: F) -> Result<(), PolicyError>
    where
        F: FnOnce(&mut PolicySet),
    {
        let mut guard = self.policies.write().unwrap_or_else(|e| e.into_inner());
        let mut next = PolicySet::clone(&guard);
        edit(&mut next);
        next.validate()?;
        *guard = Arc::new(next);
        Ok(())
    }

    /// Discounted amount with no caller options.
    pub fn compute(
        &self,
        amount: Amount,
        account: &Account,
        rates: &dyn RateSource,
    ) -> Result<Amount, DiscountError> {
        Ok(self
            .quote(amount, account, rates, PurchaseOptions::default())?
            .discounted_amount)
    }

    /// Read-only price preview.
    pub fn quote(
        &self,
        amount: Amount,
        account: &Account,
        rates: &dyn RateSource,
        options: PurchaseOptions,
    ) -> Result<DiscountQuote, DiscountError> {
        self.evaluate(amount, account, rates, options, false)
    }

    /// Price a purchase that is about to execute.
    pub fn apply(
        &self,
        amount: Amount,
        account: &Account,
        rates: &dyn RateSource,
        options: PurchaseOptions,
    ) -> Result<DiscountQuote, DiscountError> {
        self.evaluate(amount, account, rates, options, true)
    }

    /// Loyalty points earned for paying `paid`.
    pub fn loyalty_earned(&self, paid: Amount) -> u64 {
        self.policies().loyalty.points_earned(paid)
    }

    fn evaluate(
        &self,
        amount: Amount,
        account: &Account,
        source: &dyn RateSource,
        options: PurchaseOptions,
        strict: bool,
    ) -> Result<DiscountQuote, DiscountError> {
        if amount == 0 {
            return Err(DiscountError::InvalidAmount);
        }

        let policies = self.policies();
        let rates = ScopedRates::new(source, self.scope);
        let now = self.clock.now();
        let mut effects = Vec::new();

        // 1-4: what each rate policy offers
        let mut breakdown = RateBreakdown {
            tier: policies.tiers.rate_for(account.purchase_count()),
            dynamic: rates.read_rate(keys::DISCOUNT_RATE)?,
            custom: account.custom_discount_rate(),
            bulk: policies.bulk.rate_for(amount),
            ..RateBreakdown::default()
        };

        let mut promotion_claim = None;
        if let Some(window) = policies.promotion.as_ref().filter(|w| w.is_live(now)) {
            let eligible = if window.requires_flag() {
                !account.claimed_promotion(window.id())
                    && rates.read_flag(&keys::promo(&account.id()))?
            } else {
                true
            };
            if eligible {
                breakdown.promotion = window.rate();
                if window.requires_flag() {
                    promotion_claim = Some(window.id());
                }
            }
        }

        // 7: referral eligibility, first purchase only
        let mut referrer = None;
        if let Some(program) = policies.active_referral()
            && account.purchase_count() == 0
            && !account.referral_redeemed()
            && let Some(candidate) = rates.read_account(&keys::referral(&account.id()))?
            && candidate != account.id()
        {
            breakdown.referral = Some(program.referred_rate);
            referrer = Some((candidate, program.referrer_rate));
        }

        // 5: effective rate
        let (after_rates, winning_policy, effective_rate) = match breakdown.referral {
            Some(referred_rate) => {
                let rate = referred_rate.min(policies.max_discount);
                (rate.retain(amount), RatePolicy::Referral, percent_decimal(rate))
            }
            None => compose_rates(amount, &breakdown, &policies),
        };

        let promotion_used = match winning_policy {
            RatePolicy::Promotion => true,
            RatePolicy::Combined => !breakdown.promotion.is_zero(),
            _ => false,
        };
        if promotion_used && let Some(window_id) = promotion_claim {
            effects.push(PolicyEffect::ConsumePromotion { window_id });
        }

        // 6: bulk reduction stacks on top
        let mut discounted = breakdown.bulk.retain(after_rates);

        // 8: loyalty redemption
        let mut loyalty_credit = 0;
        if options.redeem_loyalty && discounted > 0 {
            let program = &policies.loyalty;
            let available = account.loyalty_points();
            if program.value_per_point == 0 {
                // Tables handed to `new` are not validated
                warn!(account = %account.id(), "Loyalty points have no value, redemption skipped");
            } else if available >= program.redemption_threshold && available > 0 {
                let needed = discounted.div_ceil(program.value_per_point);
                let points = available.min(needed);
                let value = (points as u128 * program.value_per_point as u128)
                    .min(discounted as u128) as Amount;
                discounted -= value;
                loyalty_credit = value;
                effects.push(PolicyEffect::RedeemLoyalty { points });
            } else if strict {
                return Err(DiscountError::InsufficientLoyaltyPoints {
                    available,
                    required: program.redemption_threshold.max(1),
                });
            }
        }

        if let Some((referrer, reward_rate)) = referrer {
            effects.push(PolicyEffect::ConsumeReferral {
                referrer,
                reward_points: reward_rate.portion_of(discounted),
            });
        }

        debug!(
            account = %account.id(),
            amount = amount,
            discounted = discounted,
            policy = %winning_policy,
            effective_rate = %effective_rate,
            bulk = %breakdown.bulk,
            loyalty_credit = loyalty_credit,
            "Discount evaluated"
        );

        Ok(DiscountQuote {
            original_amount: amount,
            effective_rate,
            winning_policy,
            bulk_rate: breakdown.bulk,
            loyalty_credit,
            discounted_amount: discounted,
            breakdown,
            effects,
        })
    }
}

/// Combine tier/dynamic/promotion/override per the configured mode, capped.
///
/// Returns the retained amount, the deciding policy and the nominal rate.
/// The nominal rate is what the policies grant; truncating the retained
/// amount can make the realized discount slightly larger on tiny amounts.
fn compose_rates(
    amount: Amount,
    b: &RateBreakdown,
    policies: &PolicySet,
) -> (Amount, RatePolicy, Decimal) {
    let cap = policies.max_discount;
    let candidates = [
        (b.tier, RatePolicy::Tier),
        (b.dynamic, RatePolicy::Dynamic),
        (b.promotion, RatePolicy::Promotion),
        (b.custom.unwrap_or(Percent::ZERO), RatePolicy::Override),
    ];

    match policies.composition {
        CompositionMode::BestRate => {
            // First listed policy wins ties
            let (rate, policy) = candidates
                .iter()
                .copied()
                .filter(|(rate, _)| !rate.is_zero())
                .fold((Percent::ZERO, RatePolicy::None), |best, cur| {
                    if cur.0 > best.0 { cur } else { best }
                });
            let rate = rate.min(cap);
            (rate.retain(amount), policy, percent_decimal(rate))
        }
        CompositionMode::Stacked => {
            let applied: Vec<_> = candidates.iter().filter(|(r, _)| !r.is_zero()).collect();
            let stacked = applied.iter().fold(amount, |kept, (rate, _)| rate.retain(kept));
            let floor = cap.retain(amount);
            let policy = match applied.as_slice() {
                [] => RatePolicy::None,
                [(_, only)] => *only,
                _ => RatePolicy::Combined,
            };
            let kept_share = applied.iter().fold(Decimal::ONE, |kept, (rate, _)| {
                kept * (Decimal::ONE_HUNDRED - percent_decimal(*rate)) / Decimal::ONE_HUNDRED
            });
            let nominal = (Decimal::ONE_HUNDRED - kept_share * Decimal::ONE_HUNDRED)
                .min(percent_decimal(cap))
                .round_dp(4);
            (stacked.max(floor), policy, nominal)
        }
    }
}

fn percent_decimal(rate: Percent) -> Decimal {
    Decimal::from(rate.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::core_types::AccountId;
    use crate::rate_source::InMemoryRateSource;
    use chrono::{TimeZone, Utc};

    const SCOPE: u64 = 1;

    fn pct(v: u8) -> Percent {
        Percent::new(v).unwrap()
    }

    fn alice() -> AccountId {
        AccountId::from_label("alice").unwrap()
    }

    fn bob() -> AccountId {
        AccountId::from_label("bob").unwrap()
    }

    fn standard_policies() -> PolicySet {
        PolicySet {
            tiers: TierTable::from_parallel(&[5, 10, 20, 50], &[5, 10, 15, 20]).unwrap(),
            ..PolicySet::default()
        }
    }

    fn engine_with(policies: PolicySet) -> (DiscountPolicyEngine, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap(),
        ));
        (
            DiscountPolicyEngine::new(policies, SCOPE, clock.clone()),
            clock,
        )
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        let result = engine.compute(0, &Account::new(alice()), &rates);
        assert_eq!(result, Err(DiscountError::InvalidAmount));
    }

    #[test]
    fn test_new_account_pays_full_price() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        assert_eq!(engine.compute(1000, &Account::new(alice()), &rates), Ok(1000));
    }

    #[test]
    fn test_tier_rate_applies() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        let account = Account::with_history(alice(), 25, 0);

        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.discounted_amount, 850);
        assert_eq!(quote.effective_rate, Decimal::from(15));
        assert_eq!(quote.winning_policy, RatePolicy::Tier);
        assert!(quote.effects.is_empty());
    }

    #[test]
    fn test_bulk_stacks_after_rate() {
        let mut policies = standard_policies();
        policies.bulk = BulkTable::new(vec![BulkTier {
            min_amount: 1000,
            rate: pct(5),
        }])
        .unwrap();
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        let account = Account::with_history(alice(), 25, 0);

        assert_eq!(engine.compute(1000, &account, &rates), Ok(807));
        // Below the bulk threshold only the tier applies
        assert_eq!(engine.compute(999, &account, &rates), Ok(850));
    }

    #[test]
    fn test_best_rate_not_additive_and_capped() {
        let mut policies = standard_policies();
        policies.tiers = TierTable::from_parallel(&[1], &[50]).unwrap();
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        rates.set_u128(SCOPE, keys::DISCOUNT_RATE, 18);

        let account = Account::with_history(alice(), 3, 0);
        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        // 50% tier wins but the cap holds it at 20%
        assert_eq!(quote.winning_policy, RatePolicy::Tier);
        assert_eq!(quote.effective_rate, Decimal::from(20));
        assert_eq!(quote.discounted_amount, 800);
    }

    #[test]
    fn test_dynamic_rate_clamped_and_wins() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        rates.set_u128(SCOPE, keys::DISCOUNT_RATE, 1_000);

        let account = Account::with_history(alice(), 5, 0);
        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.breakdown.dynamic, Percent::HUNDRED);
        assert_eq!(quote.winning_policy, RatePolicy::Dynamic);
        assert_eq!(quote.discounted_amount, 800);
    }

    #[test]
    fn test_rate_source_failure_propagates() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        rates.fail_key(keys::DISCOUNT_RATE, "stale feed");

        let err = engine
            .compute(1000, &Account::new(alice()), &rates)
            .unwrap_err();
        assert!(matches!(err, DiscountError::RateSource(e) if e.reason == "stale feed"));
    }

    #[test]
    fn test_custom_override() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        let mut account = Account::with_history(alice(), 5, 0);
        account.set_custom_discount_rate(Some(pct(12)));

        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.winning_policy, RatePolicy::Override);
        assert_eq!(quote.discounted_amount, 880);
    }

    #[test]
    fn test_public_promotion_window() {
        let mut policies = standard_policies();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        policies.promotion = Some(PromotionalWindow::new(3, start, end, pct(12), false).unwrap());
        let (engine, clock) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        let account = Account::new(alice());

        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.winning_policy, RatePolicy::Promotion);
        assert_eq!(quote.discounted_amount, 880);
        // Public windows are not consumed
        assert!(quote.effects.is_empty());

        clock.set(end + chrono::Duration::days(1));
        assert_eq!(engine.compute(1000, &account, &rates), Ok(1000));
    }

    #[test]
    fn test_flagged_promotion_is_one_shot() {
        let mut policies = standard_policies();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        policies.promotion = Some(PromotionalWindow::new(9, start, end, pct(10), true).unwrap());
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        let mut account = Account::new(alice());

        // Not flagged
        assert_eq!(engine.compute(1000, &account, &rates), Ok(1000));

        rates.set_u128(SCOPE, &keys::promo(&alice()), 1);
        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.discounted_amount, 900);
        assert_eq!(quote.promotion_claimed(), Some(9));

        account.mark_promotion_claimed(9);
        assert_eq!(engine.compute(1000, &account, &rates), Ok(1000));
    }

    #[test]
    fn test_referral_first_purchase_only() {
        let mut policies = standard_policies();
        policies.referral = Some(ReferralBonus {
            referrer_rate: pct(10),
            referred_rate: pct(15),
            active: true,
        });
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        rates.set_account(SCOPE, &keys::referral(&alice()), bob());

        let fresh = Account::new(alice());
        let quote = engine
            .quote(1000, &fresh, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.winning_policy, RatePolicy::Referral);
        assert_eq!(quote.discounted_amount, 850);
        assert_eq!(quote.referral(), Some((bob(), 85)));

        let returning = Account::with_history(alice(), 1, 0);
        let quote = engine
            .quote(1000, &returning, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.referral(), None);
        assert_eq!(quote.discounted_amount, 1000);

        let mut redeemed = Account::new(alice());
        redeemed.mark_referral_redeemed();
        assert_eq!(engine.compute(1000, &redeemed, &rates), Ok(1000));
    }

    #[test]
    fn test_self_referral_ignored() {
        let mut policies = standard_policies();
        policies.referral = Some(ReferralBonus {
            referrer_rate: pct(10),
            referred_rate: pct(15),
            active: true,
        });
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        rates.set_account(SCOPE, &keys::referral(&alice()), alice());

        assert_eq!(engine.compute(1000, &Account::new(alice()), &rates), Ok(1000));
    }

    #[test]
    fn test_loyalty_redemption_quote_vs_apply() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        let poor = Account::with_history(alice(), 0, 40);

        // Quote skips an impossible redemption
        let quote = engine
            .quote(1000, &poor, &rates, PurchaseOptions::redeeming_loyalty())
            .unwrap();
        assert_eq!(quote.discounted_amount, 1000);
        assert_eq!(quote.points_redeemed(), 0);

        // Apply rejects it
        let err = engine
            .apply(1000, &poor, &rates, PurchaseOptions::redeeming_loyalty())
            .unwrap_err();
        assert_eq!(
            err,
            DiscountError::InsufficientLoyaltyPoints {
                available: 40,
                required: 100
            }
        );

        let rich = Account::with_history(alice(), 0, 150);
        let quote = engine
            .apply(1000, &rich, &rates, PurchaseOptions::redeeming_loyalty())
            .unwrap();
        assert_eq!(quote.discounted_amount, 850);
        assert_eq!(quote.loyalty_credit, 150);
        assert_eq!(quote.points_redeemed(), 150);
    }

    #[test]
    fn test_loyalty_spends_only_what_is_needed() {
        let (engine, _) = engine_with(standard_policies());
        let rates = InMemoryRateSource::new();
        let rich = Account::with_history(alice(), 0, 5_000);

        let quote = engine
            .apply(120, &rich, &rates, PurchaseOptions::redeeming_loyalty())
            .unwrap();
        assert_eq!(quote.discounted_amount, 0);
        assert_eq!(quote.points_redeemed(), 120);
    }

    #[test]
    fn test_stacked_composition_capped() {
        let mut policies = standard_policies();
        policies.composition = CompositionMode::Stacked;
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        rates.set_u128(SCOPE, keys::DISCOUNT_RATE, 10);

        // 5% tier then 10% dynamic: 1000 -> 950 -> 855
        let account = Account::with_history(alice(), 5, 0);
        let quote = engine
            .quote(1000, &account, &rates, PurchaseOptions::default())
            .unwrap();
        assert_eq!(quote.winning_policy, RatePolicy::Combined);
        assert_eq!(quote.discounted_amount, 855);
        assert_eq!(quote.effective_rate, Decimal::new(145, 1));

        // 20% tier then 10% dynamic would be 720; cap keeps it at 800
        let veteran = Account::with_history(alice(), 50, 0);
        assert_eq!(engine.compute(1000, &veteran, &rates), Ok(800));
    }

    #[test]
    fn test_policy_update_is_copy_on_write() {
        let (engine, _) = engine_with(standard_policies());
        let before = engine.policies();
        engine.update(|p| p.max_discount = pct(10)).unwrap();
        assert_eq!(before.max_discount.value(), MAX_DISCOUNT_PERCENT);
        assert_eq!(engine.policies().max_discount.value(), 10);
    }

    #[test]
    fn test_invalid_loyalty_program_rejected_by_update_and_replace() {
        let (engine, _) = engine_with(standard_policies());
        assert_eq!(
            engine.update(|p| p.loyalty.value_per_point = 0),
            Err(PolicyError::ZeroValue("value_per_point"))
        );
        assert_eq!(engine.policies().loyalty.value_per_point, 1);

        let mut broken = standard_policies();
        broken.loyalty.value_per_point = 0;
        assert!(engine.replace(broken).is_err());
        assert_eq!(engine.policies().loyalty.value_per_point, 1);
    }

    #[test]
    fn test_worthless_points_are_not_redeemed() {
        let mut policies = standard_policies();
        policies.loyalty.value_per_point = 0;
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();
        let rich = Account::with_history(alice(), 0, 500);

        for strict in [false, true] {
            let quote = engine
                .evaluate(1000, &rich, &rates, PurchaseOptions::redeeming_loyalty(), strict)
                .unwrap();
            assert_eq!(quote.discounted_amount, 1000);
            assert_eq!(quote.points_redeemed(), 0);
        }
    }

    #[test]
    fn test_discount_bounded_and_monotonic() {
        let mut policies = standard_policies();
        policies.bulk = BulkTable::new(vec![BulkTier {
            min_amount: 500,
            rate: pct(5),
        }])
        .unwrap();
        let (engine, _) = engine_with(policies);
        let rates = InMemoryRateSource::new();

        for amount in [1u64, 7, 99, 500, 1000, 12_345, u64::MAX] {
            let mut previous = amount;
            for count in 0..60 {
                let account = Account::with_history(alice(), count, 0);
                let quote = engine
                    .quote(amount, &account, &rates, PurchaseOptions::default())
                    .unwrap();
                assert!(quote.discounted_amount <= amount);
                assert!(quote.discounted_amount <= previous);
                assert!(quote.effective_rate <= Decimal::from(MAX_DISCOUNT_PERCENT));
                previous = quote.discounted_amount;
            }
        }
    }
}
