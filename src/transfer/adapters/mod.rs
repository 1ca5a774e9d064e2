//! External collaborators
//!
//! The orchestrator never moves value or decides account status itself; it
//! asks these adapters. Both calls are synchronous.

pub mod memory;
pub mod oracle_gate;

pub use memory::InMemoryTokenLedger;
pub use oracle_gate::OracleAccountGate;

use super::types::OpResult;
use crate::core_types::{AccountId, Amount};
use crate::rate_source::RateSourceError;

/// Arguments of one `custom_transfer` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCall<'a> {
    pub sender: AccountId,
    pub from: AccountId,
    pub to: AccountId,
    /// Already discounted
    pub amount: Amount,
    /// Item being purchased
    pub misc1: &'a str,
    /// Undiscounted price, decimal
    pub misc2: &'a str,
    pub memo: &'a str,
    pub trace_id: &'a str,
}

/// Token ledger that actually moves value.
///
/// Called exactly once per executed purchase. Implementations may call back
/// into the orchestrator; such calls are rejected as reentrant.
pub trait TokenTransfer: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    fn custom_transfer(&self, call: &TransferCall<'_>) -> OpResult;
}

/// Activity and balance checks run before pricing.
pub trait AccountGate: Send + Sync {
    fn is_active(&self, id: &AccountId) -> Result<bool, RateSourceError>;

    fn balance_of(&self, id: &AccountId) -> Result<Amount, RateSourceError>;
}

/// Mock adapter for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedCall {
        pub from: AccountId,
        pub to: AccountId,
        pub amount: Amount,
        pub misc1: String,
        pub misc2: String,
    }

    pub struct MockTokenTransfer {
        calls: Mutex<Vec<RecordedCall>>,
        transfer_count: AtomicUsize,
        fail_transfer: Mutex<Option<String>>,
    }

    impl MockTokenTransfer {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                transfer_count: AtomicUsize::new(0),
                fail_transfer: Mutex::new(None),
            }
        }

        pub fn set_fail_transfer(&self, reason: Option<&str>) {
            *self.fail_transfer.lock().unwrap() = reason.map(str::to_string);
        }

        pub fn transfer_count(&self) -> usize {
            self.transfer_count.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TokenTransfer for MockTokenTransfer {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn custom_transfer(&self, call: &TransferCall<'_>) -> OpResult {
            self.transfer_count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(RecordedCall {
                from: call.from,
                to: call.to,
                amount: call.amount,
                misc1: call.misc1.to_string(),
                misc2: call.misc2.to_string(),
            });

            match self.fail_transfer.lock().unwrap().clone() {
                Some(reason) => OpResult::Failed(reason),
                None => OpResult::Success,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn call<'a>(amount: Amount) -> TransferCall<'a> {
            let id = AccountId::from_label("alice").unwrap();
            TransferCall {
                sender: id,
                from: id,
                to: id,
                amount,
                misc1: "sku",
                misc2: "10",
                memo: "m",
                trace_id: "t",
            }
        }

        #[test]
        fn test_mock_transfer_success() {
            let adapter = MockTokenTransfer::new();
            assert!(adapter.custom_transfer(&call(10)).is_success());
            assert_eq!(adapter.transfer_count(), 1);
            assert_eq!(adapter.calls()[0].amount, 10);
        }

        #[test]
        fn test_mock_transfer_failure() {
            let adapter = MockTokenTransfer::new();
            adapter.set_fail_transfer(Some("insufficient balance"));
            assert!(adapter.custom_transfer(&call(10)).is_explicit_fail());
        }
    }
}

#[cfg(test)]
pub use mock::MockTokenTransfer;
