use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core_types::{AccountId, Amount, Percent};
use crate::discount::{
    BulkTable, BulkTier, CompositionMode, LoyaltyProgram, MAX_DISCOUNT_PERCENT, PolicyError,
    PolicySet, PromotionalWindow, ReferralBonus, TierTable,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid policy config: {0}")]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Log every quote the engine evaluates (debug level, very chatty)
    #[serde(default)]
    pub trace_pricing: bool,
    /// Oracle scope every rate-source key is read under
    #[serde(default)]
    pub oracle_scope: u64,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    /// First entry is the owner; the rest are delegates
    #[serde(default)]
    pub admins: Vec<AccountId>,
    #[serde(default)]
    pub policies: PolicyConfig,
}

fn default_event_queue_capacity() -> usize {
    1024
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct TierConfig {
    pub min_purchases: u64,
    pub rate: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BulkConfig {
    pub min_amount: Amount,
    pub rate: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct PromotionConfig {
    pub id: u32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub rate: u8,
    #[serde(default)]
    pub requires_flag: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ReferralConfig {
    pub referrer_rate: u8,
    pub referred_rate: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PolicyConfig {
    #[serde(default)]
    pub tiers: Vec<TierConfig>,
    #[serde(default)]
    pub bulk: Vec<BulkConfig>,
    #[serde(default = "default_max_discount")]
    pub max_discount_percent: u8,
    #[serde(default)]
    pub composition: CompositionMode,
    #[serde(default)]
    pub promotion: Option<PromotionConfig>,
    #[serde(default)]
    pub referral: Option<ReferralConfig>,
    #[serde(default)]
    pub loyalty: LoyaltyProgram,
}

fn default_max_discount() -> u8 {
    MAX_DISCOUNT_PERCENT
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            tiers: Vec::new(),
            bulk: Vec::new(),
            max_discount_percent: MAX_DISCOUNT_PERCENT,
            composition: CompositionMode::default(),
            promotion: None,
            referral: None,
            loyalty: LoyaltyProgram::default(),
        }
    }
}

fn percent(value: u8) -> Result<Percent, PolicyError> {
    Percent::new(value).map_err(|e| PolicyError::RateOutOfRange(e.0))
}

impl TryFrom<&PolicyConfig> for PolicySet {
    type Error = PolicyError;

    fn try_from(cfg: &PolicyConfig) -> Result<Self, Self::Error> {
        let thresholds: Vec<u64> = cfg.tiers.iter().map(|t| t.min_purchases).collect();
        let rates: Vec<u8> = cfg.tiers.iter().map(|t| t.rate).collect();
        let tiers = TierTable::from_parallel(&thresholds, &rates)?;

        let bulk = BulkTable::new(
            cfg.bulk
                .iter()
                .map(|b| {
                    Ok::<_, PolicyError>(BulkTier {
                        min_amount: b.min_amount,
                        rate: percent(b.rate)?,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        let promotion = cfg
            .promotion
            .map(|p| PromotionalWindow::new(p.id, p.start, p.end, percent(p.rate)?, p.requires_flag))
            .transpose()?;

        let referral = cfg
            .referral
            .map(|r| {
                Ok::<_, PolicyError>(ReferralBonus {
                    referrer_rate: percent(r.referrer_rate)?,
                    referred_rate: percent(r.referred_rate)?,
                    active: true,
                })
            })
            .transpose()?;

        cfg.loyalty.validate()?;

        Ok(PolicySet {
            tiers,
            bulk,
            promotion,
            referral,
            loyalty: cfg.loyalty,
            max_discount: percent(cfg.max_discount_percent)?,
            composition: cfg.composition,
        })
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml`.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn policy_set(&self) -> Result<PolicySet, ConfigError> {
        Ok(PolicySet::try_from(&self.policies)?)
    }

    /// Owner of the admin roster, if any admins are configured.
    pub fn owner(&self) -> Option<AccountId> {
        self.admins.first().copied()
    }

    pub fn delegates(&self) -> impl Iterator<Item = AccountId> + '_ {
        self.admins.iter().skip(1).copied()
    }
}
