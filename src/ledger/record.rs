use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{AccountId, Amount, TransactionId};

/// Audit entry for one successful discounted transfer.
///
/// Created once, after the external transfer reports success. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub sender: AccountId,
    pub source: AccountId,
    pub destination: AccountId,
    /// Price before any discount
    pub amount: Amount,
    /// Value actually moved
    pub discounted_amount: Amount,
    pub item: String,
    pub memo: String,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}
