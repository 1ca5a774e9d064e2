//! Domain events
//!
//! Published only after a purchase has fully committed. Nothing inside the
//! crate consumes them.

use crossbeam_queue::ArrayQueue;
use serde::Serialize;
use tracing::{info, warn};

use crate::core_types::{AccountId, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    DiscountApplied {
        account: AccountId,
        item: String,
        original_amount: Amount,
        discounted_amount: Amount,
    },
    TransferCompleted {
        sender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
        misc1: String,
        misc2: String,
    },
    PurchaseCountIncremented {
        account: AccountId,
        new_count: u64,
    },
    LoyaltyRedeemed {
        account: AccountId,
        points: u64,
    },
    ReferralRewarded {
        referrer: AccountId,
        referred: AccountId,
        points: u64,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::DiscountApplied { .. } => "discount_applied",
            DomainEvent::TransferCompleted { .. } => "transfer_completed",
            DomainEvent::PurchaseCountIncremented { .. } => "purchase_count_incremented",
            DomainEvent::LoyaltyRedeemed { .. } => "loyalty_redeemed",
            DomainEvent::ReferralRewarded { .. } => "referral_rewarded",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Bounded in-memory event buffer.
///
/// When full, the oldest event is evicted to make room.
pub struct EventQueue {
    queue: ArrayQueue<DomainEvent>,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// Take every buffered event, oldest first.
    pub fn drain(&self) -> Vec<DomainEvent> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSink for EventQueue {
    fn publish(&self, event: DomainEvent) {
        if let Some(evicted) = self.queue.force_push(event) {
            warn!(event = evicted.name(), "Event queue full, oldest event dropped");
        }
    }
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: DomainEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.name(), payload = %payload, "Domain event"),
            Err(e) => warn!(event = event.name(), error = %e, "Domain event not serializable"),
        }
    }
}

/// Fan-out to several sinks.
pub struct MultiSink {
    sinks: Vec<std::sync::Arc<dyn EventSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for MultiSink {
    fn publish(&self, event: DomainEvent) {
        for sink in &self.sinks {
            sink.publish(event.clone());
        }
    }
}
