//! Discount Transfer - Discounted Purchase Engine
//!
//! Prices a purchase from several discount policies, moves the discounted
//! value through an external token ledger and records the purchase, all as
//! one atomic, re-entrancy-guarded step.
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, Percent, TransactionId)
//! - [`discount`] - Policy tables and the discount policy engine
//! - [`ledger`] - Per-account purchase rows and transaction history
//! - [`transfer`] - Transfer orchestrator, adapters and errors
//! - [`admin`] - Access control, pause switch and policy administration
//! - [`rate_source`] - Oracle abstraction (32-byte words by key)
//! - [`events`] - Domain events and sinks
//! - [`audit`] - CSV export of the transaction history
//! - [`scenario`] - Scenario files driven by the CLI

// Core types - must be first!
pub mod core_types;

pub mod admin;
pub mod audit;
pub mod clock;
pub mod config;
pub mod discount;
pub mod events;
pub mod ledger;
pub mod logging;
pub mod rate_source;
pub mod scenario;
pub mod transfer;

// Convenient re-exports at crate root
pub use admin::{AccessControl, AdminConsole, AdminError, AdminRoster, PauseState, PauseSwitch};
pub use clock::{Clock, FixedClock, SystemClock};
pub use core_types::{AccountId, Amount, Percent, TransactionId};
pub use discount::{
    CompositionMode, DiscountError, DiscountPolicyEngine, DiscountQuote, PolicySet,
    PurchaseOptions, RatePolicy,
};
pub use events::{DomainEvent, EventQueue, EventSink, MultiSink, TracingSink};
pub use ledger::{Account, AccountSnapshot, LedgerError, PurchaseLedger, TransactionRecord};
pub use rate_source::{InMemoryRateSource, RateSource, RateSourceError};
pub use transfer::{
    AccountGate, CheckoutError, InMemoryTokenLedger, OpResult, OracleAccountGate,
    PurchaseRequest, TokenTransfer, TransferCall, TransferOrchestrator, TransferReceipt,
    ValidationError,
};
