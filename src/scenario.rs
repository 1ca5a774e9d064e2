//! Scenario files - seed state and purchases for the CLI driver
//!
//! ```json
//! {
//!   "dynamic_rate": 0,
//!   "accounts": [{ "id": "alice", "balance": 5000 }],
//!   "custom_rates": [{ "account": "vip", "rate": 18 }],
//!   "purchases": [{ "sender": "alice", "from": "alice", "to": "shop",
//!                   "amount": 1000, "item": "sku-1", "memo": "m", "trace_id": "t1" }]
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::core_types::{AccountId, Amount};
use crate::rate_source::{InMemoryRateSource, keys};
use crate::transfer::{InMemoryTokenLedger, PurchaseRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Oracle `DISCOUNT_RATE`
    #[serde(default)]
    pub dynamic_rate: u8,
    #[serde(default)]
    pub accounts: Vec<AccountSeed>,
    #[serde(default)]
    pub custom_rates: Vec<CustomRateSeed>,
    pub purchases: Vec<ScenarioPurchase>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSeed {
    pub id: AccountId,
    #[serde(default)]
    pub balance: Amount,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Oracle `PROMO_<id>` flag
    #[serde(default)]
    pub promo: bool,
    /// Oracle `REFERRAL_<id>` value
    #[serde(default)]
    pub referrer: Option<AccountId>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CustomRateSeed {
    pub account: AccountId,
    pub rate: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioPurchase {
    #[serde(flatten)]
    pub request: PurchaseRequest,
    /// Run the same request this many times
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

fn default_repeat() -> u32 {
    1
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse scenario {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Write oracle values and opening balances.
    pub fn seed(
        &self,
        rates: &InMemoryRateSource,
        token: &InMemoryTokenLedger,
        scope: u64,
    ) -> Result<()> {
        rates.set_u128(scope, keys::DISCOUNT_RATE, self.dynamic_rate as u128);
        for account in &self.accounts {
            rates.set_u128(scope, &keys::account_active(&account.id), account.active as u128);
            if account.promo {
                rates.set_u128(scope, &keys::promo(&account.id), 1);
            }
            if let Some(referrer) = account.referrer {
                rates.set_account(scope, &keys::referral(&account.id), referrer);
            }
            if account.balance > 0 {
                token
                    .mint(&account.id, account.balance)
                    .with_context(|| format!("Failed to fund {}", account.id))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_source::{RateSource, ScopedRates};
    use std::sync::Arc;

    const SCENARIO: &str = r#"{
        "dynamic_rate": 3,
        "accounts": [
            { "id": "alice", "balance": 5000, "promo": true },
            { "id": "bob", "referrer": "alice" },
            { "id": "shop", "active": true },
            { "id": "ghost", "active": false }
        ],
        "purchases": [
            { "sender": "alice", "from": "alice", "to": "shop", "amount": 10,
              "item": "sku-1", "memo": "warmup", "trace_id": "t-1", "repeat": 3 },
            { "sender": "bob", "from": "bob", "to": "shop", "amount": 100,
              "item": "sku-2", "memo": "first", "trace_id": "t-2",
              "options": { "redeem_loyalty": true } }
        ]
    }"#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        assert_eq!(scenario.accounts.len(), 4);
        assert!(!scenario.accounts[3].active);
        assert_eq!(scenario.purchases[0].repeat, 3);
        assert_eq!(scenario.purchases[1].repeat, 1);
        assert!(scenario.purchases[1].request.options.redeem_loyalty);
        assert_eq!(
            scenario.purchases[1].request.from,
            AccountId::from_label("bob").unwrap()
        );
    }

    #[test]
    fn test_seed_writes_oracle() {
        let scenario = Scenario::from_json(SCENARIO).unwrap();
        let rates = Arc::new(InMemoryRateSource::new());
        let token = InMemoryTokenLedger::new(rates.clone(), 2);
        scenario.seed(&rates, &token, 2).unwrap();

        let alice = AccountId::from_label("alice").unwrap();
        let bob = AccountId::from_label("bob").unwrap();
        let view = ScopedRates::new(rates.as_ref() as &dyn RateSource, 2);
        assert_eq!(view.read_amount(keys::DISCOUNT_RATE).unwrap(), 3);
        assert_eq!(view.read_amount(&keys::account_balance(&alice)).unwrap(), 5_000);
        assert!(view.read_flag(&keys::promo(&alice)).unwrap());
        assert_eq!(view.read_account(&keys::referral(&bob)).unwrap(), Some(alice));
        assert!(
            !view
                .read_flag(&keys::account_active(&AccountId::from_label("ghost").unwrap()))
                .unwrap()
        );
    }

    #[test]
    fn test_missing_purchases_rejected() {
        assert!(Scenario::from_json(r#"{ "accounts": [] }"#).is_err());
    }
}
