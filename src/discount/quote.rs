//! Quote types
//!
//! A quote is the engine's full answer for one purchase: which policy won,
//! what each policy offered, and the writes to commit if the purchase goes
//! through.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core_types::{AccountId, Amount, Percent};

/// Caller choices that change how a purchase is priced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOptions {
    /// Spend loyalty points against this purchase
    #[serde(default)]
    pub redeem_loyalty: bool,
}

impl PurchaseOptions {
    pub fn redeeming_loyalty() -> Self {
        Self {
            redeem_loyalty: true,
        }
    }
}

/// Which rate policy decided the effective rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatePolicy {
    None,
    Tier,
    Dynamic,
    Promotion,
    Override,
    Referral,
    /// Several rates combined (stacked composition)
    Combined,
}

impl RatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatePolicy::None => "NONE",
            RatePolicy::Tier => "TIER",
            RatePolicy::Dynamic => "DYNAMIC",
            RatePolicy::Promotion => "PROMOTION",
            RatePolicy::Override => "OVERRIDE",
            RatePolicy::Referral => "REFERRAL",
            RatePolicy::Combined => "COMBINED",
        }
    }
}

impl fmt::Display for RatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What every rate policy offered for this purchase (before the cap).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub tier: Percent,
    pub dynamic: Percent,
    pub promotion: Percent,
    pub custom: Option<Percent>,
    pub referral: Option<Percent>,
    pub bulk: Percent,
}

/// Side-effect write scheduled by a stateful policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyEffect {
    /// Debit spent points from the buyer
    RedeemLoyalty { points: u64 },
    /// Mark the buyer's referral used and credit the referrer
    ConsumeReferral { referrer: AccountId, reward_points: u64 },
    /// Mark a flagged promotional window consumed by the buyer
    ConsumePromotion { window_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountQuote {
    pub original_amount: Amount,
    /// Discount attributable to rate policies, as a percentage of the original
    pub effective_rate: Decimal,
    pub winning_policy: RatePolicy,
    pub bulk_rate: Percent,
    /// Value covered by spent loyalty points
    pub loyalty_credit: Amount,
    pub discounted_amount: Amount,
    pub breakdown: RateBreakdown,
    pub effects: Vec<PolicyEffect>,
}

impl DiscountQuote {
    #[inline]
    pub fn discount(&self) -> Amount {
        self.original_amount - self.discounted_amount
    }

    pub fn points_redeemed(&self) -> u64 {
        self.effects
            .iter()
            .map(|e| match e {
                PolicyEffect::RedeemLoyalty { points } => *points,
                _ => 0,
            })
            .sum()
    }

    pub fn referral(&self) -> Option<(AccountId, u64)> {
        self.effects.iter().find_map(|e| match e {
            PolicyEffect::ConsumeReferral {
                referrer,
                reward_points,
            } => Some((*referrer, *reward_points)),
            _ => None,
        })
    }

    pub fn promotion_claimed(&self) -> Option<u32> {
        self.effects.iter().find_map(|e| match e {
            PolicyEffect::ConsumePromotion { window_id } => Some(*window_id),
            _ => None,
        })
    }
}
