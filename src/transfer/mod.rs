//! Discounted Transfer
//!
//! Executes a purchase as one atomic step: price it, move the discounted
//! value through the external token ledger, then commit the ledger row.
//!
//! # Safety Invariants
//!
//! 1. **Guard First**: the reentrancy guard is taken before anything is read
//! 2. **Validate-Before-Mutate**: every precondition, pricing step and ledger
//!    pre-check runs before the external transfer
//! 3. **Commit-After-Transfer**: count, points, history and one-shot markers
//!    change only after `custom_transfer` reports success
//! 4. **No Lock Across Calls**: no ledger lock is held while an adapter runs,
//!    so a re-entering adapter sees the pre-call state

pub mod adapters;
pub mod error;
pub mod guard;
pub mod orchestrator;
pub mod types;

pub use adapters::{AccountGate, InMemoryTokenLedger, OracleAccountGate, TokenTransfer, TransferCall};
pub use error::{CheckoutError, ValidationError};
pub use guard::{GuardToken, ReentrancyGuard};
pub use orchestrator::TransferOrchestrator;
pub use types::{OpResult, PurchaseRequest, TransferReceipt};
