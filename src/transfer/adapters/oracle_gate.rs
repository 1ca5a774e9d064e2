//! Oracle-backed account gate
//!
//! Reads `ACCOUNT_ACTIVE_<id>` and `ACCOUNT_BALANCE_<id>` from the rate source.

use std::sync::Arc;

use super::AccountGate;
use crate::core_types::{AccountId, Amount};
use crate::rate_source::{RateSource, RateSourceError, ScopedRates, keys};

pub struct OracleAccountGate {
    source: Arc<dyn RateSource>,
    scope: u64,
}

impl OracleAccountGate {
    pub fn new(source: Arc<dyn RateSource>, scope: u64) -> Self {
        Self { source, scope }
    }

    fn rates(&self) -> ScopedRates<'_> {
        ScopedRates::new(self.source.as_ref(), self.scope)
    }
}

impl AccountGate for OracleAccountGate {
    fn is_active(&self, id: &AccountId) -> Result<bool, RateSourceError> {
        self.rates().read_flag(&keys::account_active(id))
    }

    fn balance_of(&self, id: &AccountId) -> Result<Amount, RateSourceError> {
        self.rates().read_amount(&keys::account_balance(id))
    }
}
