//! Discount policy tables
//!
//! Every table is validated on construction, so the engine never has to
//! re-check thresholds or rates while composing a quote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core_types::{Amount, Percent};

/// Global cap on the rate-based discount
pub const MAX_DISCOUNT_PERCENT: u8 = 20;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Tier thresholds must be strictly increasing (at index {0})")]
    NonIncreasingThresholds(usize),

    #[error("Tier rates must not decrease as thresholds grow (at index {0})")]
    DecreasingRates(usize),

    #[error("Promotional window must start before it ends")]
    InvalidWindow,

    #[error("Array length mismatch: {left} thresholds vs {right} rates")]
    LengthMismatch { left: usize, right: usize },

    #[error("Rate out of range: {0} (must be 0..=100)")]
    RateOutOfRange(u64),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// How simultaneously eligible rate policies combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Single best rate wins
    #[default]
    BestRate,
    /// Rates applied one after another on the retained amount
    Stacked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    pub min_purchases: u64,
    pub rate: Percent,
}

/// Purchase-count tiers, ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierTable {
    tiers: Vec<DiscountTier>,
}

impl TierTable {
    pub fn new(tiers: Vec<DiscountTier>) -> Result<Self, PolicyError> {
        for (i, pair) in tiers.windows(2).enumerate() {
            if pair[1].min_purchases <= pair[0].min_purchases {
                return Err(PolicyError::NonIncreasingThresholds(i + 1));
            }
            if pair[1].rate < pair[0].rate {
                return Err(PolicyError::DecreasingRates(i + 1));
            }
        }
        Ok(Self { tiers })
    }

    /// Build from parallel threshold/rate arrays.
    pub fn from_parallel(thresholds: &[u64], rates: &[u8]) -> Result<Self, PolicyError> {
        if thresholds.len() != rates.len() {
            return Err(PolicyError::LengthMismatch {
                left: thresholds.len(),
                right: rates.len(),
            });
        }
        let tiers = thresholds
            .iter()
            .zip(rates)
            .map(|(&min_purchases, &rate)| {
                Percent::new(rate)
                    .map(|rate| DiscountTier {
                        min_purchases,
                        rate,
                    })
                    .map_err(|e| PolicyError::RateOutOfRange(e.0))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(tiers)
    }

    /// Rate of the highest threshold not exceeding `purchase_count`, else 0.
    pub fn rate_for(&self, purchase_count: u64) -> Percent {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.min_purchases <= purchase_count)
            .map(|t| t.rate)
            .unwrap_or(Percent::ZERO)
    }

    pub fn tiers(&self) -> &[DiscountTier] {
        &self.tiers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkTier {
    pub min_amount: Amount,
    pub rate: Percent,
}

/// Amount-threshold table for the stacked bulk reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkTable {
    tiers: Vec<BulkTier>,
}

impl BulkTable {
    pub fn new(tiers: Vec<BulkTier>) -> Result<Self, PolicyError> {
        for (i, pair) in tiers.windows(2).enumerate() {
            if pair[1].min_amount <= pair[0].min_amount {
                return Err(PolicyError::NonIncreasingThresholds(i + 1));
            }
        }
        Ok(Self { tiers })
    }

    pub fn rate_for(&self, amount: Amount) -> Percent {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.min_amount <= amount)
            .map(|t| t.rate)
            .unwrap_or(Percent::ZERO)
    }

    pub fn tiers(&self) -> &[BulkTier] {
        &self.tiers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionalWindow {
    id: u32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rate: Percent,
    active: bool,
    /// Only accounts flagged with `PROMO_<id>` qualify, once per window
    requires_flag: bool,
}

impl PromotionalWindow {
    pub fn new(
        id: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rate: Percent,
        requires_flag: bool,
    ) -> Result<Self, PolicyError> {
        if start >= end {
            return Err(PolicyError::InvalidWindow);
        }
        Ok(Self {
            id,
            start,
            end,
            rate,
            active: true,
            requires_flag,
        })
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// `active && start <= now <= end`
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.start <= now && now <= self.end
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn rate(&self) -> Percent {
        self.rate
    }

    pub fn requires_flag(&self) -> bool {
        self.requires_flag
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralBonus {
    /// Reward to the referrer, as a share of the referred purchase (in points)
    pub referrer_rate: Percent,
    /// Rate granted on the referred account's first purchase
    pub referred_rate: Percent,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    /// Minimum balance before any points can be spent
    pub redemption_threshold: u64,
    /// Value units subtracted per point spent
    pub value_per_point: Amount,
    /// One point earned per `earn_divisor` units paid; 0 disables earning
    pub earn_divisor: Amount,
}

impl LoyaltyProgram {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.value_per_point == 0 {
            return Err(PolicyError::ZeroValue("value_per_point"));
        }
        Ok(())
    }

    pub fn points_earned(&self, paid: Amount) -> u64 {
        paid.checked_div(self.earn_divisor).unwrap_or(0)
    }
}

impl Default for LoyaltyProgram {
    fn default() -> Self {
        Self {
            redemption_threshold: 100,
            value_per_point: 1,
            earn_divisor: 10,
        }
    }
}

/// The complete policy table the engine composes.
///
/// Swapping the whole set is how a new pricing version is rolled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    pub tiers: TierTable,
    pub bulk: BulkTable,
    pub promotion: Option<PromotionalWindow>,
    pub referral: Option<ReferralBonus>,
    pub loyalty: LoyaltyProgram,
    pub max_discount: Percent,
    pub composition: CompositionMode,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            bulk: BulkTable::default(),
            promotion: None,
            referral: None,
            loyalty: LoyaltyProgram::default(),
            max_discount: Percent::new(MAX_DISCOUNT_PERCENT).unwrap_or(Percent::ZERO),
            composition: CompositionMode::BestRate,
        }
    }
}

impl PolicySet {
    /// Checks the parts a table constructor cannot guard.
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.loyalty.validate()
    }

    /// Referral program, if one is running.
    pub fn active_referral(&self) -> Option<&ReferralBonus> {
        self.referral.as_ref().filter(|r| r.active)
    }
}
