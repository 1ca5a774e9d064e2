//! In-memory token ledger
//!
//! Keeps balances as `ACCOUNT_BALANCE_<id>` words in a shared rate source, so
//! the oracle-backed gate and this ledger always agree on balances.
//!
//! Used by the CLI driver and the scenario tests; not a production ledger.

use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::{TokenTransfer, TransferCall};
use crate::core_types::{AccountId, Amount};
use crate::rate_source::{RateSource, RateSourceError, ScopedRates, keys};
use crate::transfer::types::OpResult;

pub struct InMemoryTokenLedger {
    source: Arc<dyn RateSource>,
    scope: u64,
    /// Serializes read-modify-write of balance pairs
    write_lock: Mutex<()>,
}

impl InMemoryTokenLedger {
    pub fn new(source: Arc<dyn RateSource>, scope: u64) -> Self {
        Self {
            source,
            scope,
            write_lock: Mutex::new(()),
        }
    }

    fn rates(&self) -> ScopedRates<'_> {
        ScopedRates::new(self.source.as_ref(), self.scope)
    }

    pub fn balance_of(&self, id: &AccountId) -> Result<Amount, RateSourceError> {
        self.rates().read_amount(&keys::account_balance(id))
    }

    pub fn mint(&self, id: &AccountId, amount: Amount) -> Result<Amount, RateSourceError> {
        let _lock = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let key = keys::account_balance(id);
        let balance = self.rates().read_amount(&key)?.saturating_add(amount);
        self.rates().write_amount(&key, balance)?;
        Ok(balance)
    }

    fn move_value(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Amount,
    ) -> Result<OpResult, RateSourceError> {
        let _lock = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let rates = self.rates();
        let from_key = keys::account_balance(from);
        let to_key = keys::account_balance(to);

        let from_balance = rates.read_amount(&from_key)?;
        let Some(remaining) = from_balance.checked_sub(amount) else {
            return Ok(OpResult::Failed(format!(
                "insufficient balance: have {}, need {}",
                from_balance, amount
            )));
        };
        if from == to {
            return Ok(OpResult::Success);
        }
        let to_balance = rates.read_amount(&to_key)?;
        let Some(credited) = to_balance.checked_add(amount) else {
            return Ok(OpResult::Failed("recipient balance overflow".to_string()));
        };

        rates.write_amount(&from_key, remaining)?;
        if let Err(e) = rates.write_amount(&to_key, credited) {
            // Put the debit back so a failed transfer moves nothing
            rates.write_amount(&from_key, from_balance)?;
            return Err(e);
        }
        Ok(OpResult::Success)
    }
}

impl TokenTransfer for InMemoryTokenLedger {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn custom_transfer(&self, call: &TransferCall<'_>) -> OpResult {
        debug!(
            trace_id = call.trace_id,
            from = %call.from,
            to = %call.to,
            amount = call.amount,
            "In-memory transfer"
        );
        match self.move_value(&call.from, &call.to, call.amount) {
            Ok(result) => result,
            Err(e) => {
                warn!(trace_id = call.trace_id, error = %e, "In-memory transfer storage error");
                OpResult::Failed(e.to_string())
            }
        }
    }
}
