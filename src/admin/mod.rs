//! Administrative surface
//!
//! Privileged configuration of the discount engine, composed from injected
//! capabilities rather than one monolithic owner type:
//!
//! - [`AccessControl`] decides who may call
//! - [`PauseSwitch`] is the pause capability the orchestrator reads
//! - the engine and ledger are shared with the orchestrator
//!
//! Every rate is validated to `0..=100` before anything is replaced.

pub mod access;
pub mod pause;

pub use access::{AccessControl, AdminRoster};
pub use pause::{PauseState, PauseSwitch};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::core_types::{AccountId, Amount, Percent};
use crate::discount::{
    BulkTable, BulkTier, CompositionMode, DiscountPolicyEngine, LoyaltyProgram, PolicyError,
    PromotionalWindow, ReferralBonus, TierTable,
};
use crate::ledger::PurchaseLedger;
use crate::transfer::ValidationError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("Caller is not an admin: {0}")]
    Unauthorized(AccountId),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid policy: {0}")]
    Policy(PolicyError),
}

impl From<PolicyError> for AdminError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::LengthMismatch { left, right } => {
                ValidationError::LengthMismatch { left, right }.into()
            }
            PolicyError::RateOutOfRange(v) => ValidationError::RateOutOfRange(v).into(),
            other => AdminError::Policy(other),
        }
    }
}

fn rate(value: u8) -> Result<Percent, AdminError> {
    Percent::new(value).map_err(|e| ValidationError::RateOutOfRange(e.0).into())
}

pub struct AdminConsole {
    access: Arc<dyn AccessControl>,
    pause: Arc<PauseSwitch>,
    engine: Arc<DiscountPolicyEngine>,
    ledger: Arc<PurchaseLedger>,
}

impl AdminConsole {
    pub fn new(
        access: Arc<dyn AccessControl>,
        pause: Arc<PauseSwitch>,
        engine: Arc<DiscountPolicyEngine>,
        ledger: Arc<PurchaseLedger>,
    ) -> Self {
        Self {
            access,
            pause,
            engine,
            ledger,
        }
    }

    fn authorize(&self, caller: &AccountId) -> Result<(), AdminError> {
        if self.access.is_admin(caller) {
            Ok(())
        } else {
            Err(AdminError::Unauthorized(*caller))
        }
    }

    /// Replace the purchase-count tier table from parallel arrays.
    pub fn set_tiers(
        &self,
        caller: &AccountId,
        thresholds: &[u64],
        rates: &[u8],
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        let table = TierTable::from_parallel(thresholds, rates)?;
        self.engine.update(|p| p.tiers = table)?;
        info!(admin = %caller, tiers = thresholds.len(), "Tier table replaced");
        Ok(())
    }

    pub fn set_bulk_tiers(
        &self,
        caller: &AccountId,
        thresholds: &[Amount],
        rates: &[u8],
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        if thresholds.len() != rates.len() {
            return Err(ValidationError::LengthMismatch {
                left: thresholds.len(),
                right: rates.len(),
            }
            .into());
        }
        let tiers = thresholds
            .iter()
            .zip(rates)
            .map(|(&min_amount, &r)| rate(r).map(|rate| BulkTier { min_amount, rate }))
            .collect::<Result<Vec<_>, _>>()?;
        let table = BulkTable::new(tiers)?;
        self.engine.update(|p| p.bulk = table)?;
        info!(admin = %caller, tiers = thresholds.len(), "Bulk table replaced");
        Ok(())
    }

    pub fn set_promotion(
        &self,
        caller: &AccountId,
        id: u32,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rate_percent: u8,
        requires_flag: bool,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        let window = PromotionalWindow::new(id, start, end, rate(rate_percent)?, requires_flag)?;
        self.engine.update(|p| p.promotion = Some(window))?;
        info!(admin = %caller, promotion = id, %start, %end, rate = rate_percent, "Promotion set");
        Ok(())
    }

    /// Returns false if no promotion was set.
    pub fn cancel_promotion(&self, caller: &AccountId) -> Result<bool, AdminError> {
        self.authorize(caller)?;
        let mut cancelled = false;
        self.engine.update(|p| cancelled = p.promotion.take().is_some())?;
        info!(admin = %caller, cancelled = cancelled, "Promotion cancelled");
        Ok(cancelled)
    }

    pub fn set_referral_program(
        &self,
        caller: &AccountId,
        referrer_rate: u8,
        referred_rate: u8,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        let program = ReferralBonus {
            referrer_rate: rate(referrer_rate)?,
            referred_rate: rate(referred_rate)?,
            active: true,
        };
        self.engine.update(|p| p.referral = Some(program))?;
        info!(admin = %caller, referrer_rate, referred_rate, "Referral program set");
        Ok(())
    }

    /// Deactivates the program but keeps its rates. Returns false if none was active.
    pub fn cancel_referral_program(&self, caller: &AccountId) -> Result<bool, AdminError> {
        self.authorize(caller)?;
        let mut cancelled = false;
        self.engine.update(|p| {
            if let Some(program) = p.referral.as_mut() {
                cancelled = program.active;
                program.active = false;
            }
        })?;
        info!(admin = %caller, cancelled = cancelled, "Referral program cancelled");
        Ok(cancelled)
    }

    pub fn set_custom_rate(
        &self,
        caller: &AccountId,
        account: AccountId,
        rate_percent: Option<u8>,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        if account.is_empty() {
            return Err(ValidationError::EmptyIdentifier("account").into());
        }
        let custom = rate_percent.map(rate).transpose()?;
        self.ledger.set_custom_rate(account, custom);
        Ok(())
    }

    pub fn set_max_discount(&self, caller: &AccountId, rate_percent: u8) -> Result<(), AdminError> {
        self.authorize(caller)?;
        let cap = rate(rate_percent)?;
        self.engine.update(|p| p.max_discount = cap)?;
        info!(admin = %caller, cap = %cap, "Discount cap changed");
        Ok(())
    }

    pub fn set_composition(
        &self,
        caller: &AccountId,
        mode: CompositionMode,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.engine.update(|p| p.composition = mode)?;
        info!(admin = %caller, mode = ?mode, "Composition mode changed");
        Ok(())
    }

    pub fn set_loyalty_program(
        &self,
        caller: &AccountId,
        program: LoyaltyProgram,
    ) -> Result<(), AdminError> {
        self.authorize(caller)?;
        self.engine.update(|p| p.loyalty = program)?;
        Ok(())
    }

    /// Returns the points cleared.
    pub fn reset_loyalty_points(
        &self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<u64, AdminError> {
        self.authorize(caller)?;
        Ok(self.ledger.reset_loyalty_points(account))
    }

    pub fn pause(&self, caller: &AccountId) -> Result<bool, AdminError> {
        self.authorize(caller)?;
        Ok(self.pause.pause())
    }

    pub fn unpause(&self, caller: &AccountId) -> Result<bool, AdminError> {
        self.authorize(caller)?;
        Ok(self.pause.unpause())
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    pub fn grant_admin(&self, caller: &AccountId, id: AccountId) -> Result<bool, AdminError> {
        self.access.grant(caller, id)
    }

    pub fn revoke_admin(&self, caller: &AccountId, id: &AccountId) -> Result<bool, AdminError> {
        self.access.revoke(caller, id)
    }
}
