use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEventKind {
    DonationRecorded,
    RequestFulfilled,
    FulfillmentDiverged,
}

impl DomainEventKind {
    /// Pub/sub channel each event kind is published on; the single source of
    /// truth for channel names on both the publishing and consuming side.
    pub fn channel(self) -> &'static str {
        match self {
            DomainEventKind::DonationRecorded => "donations.recorded",
            DomainEventKind::RequestFulfilled => "wishlist.fulfilled",
            DomainEventKind::FulfillmentDiverged => "wishlist.divergence",
        }
    }
}

/// Best-effort notification published after a store write. Delivery is not
/// guaranteed; nothing downstream may rely on receiving one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    pub kind: DomainEventKind,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl DomainEvent {
    pub fn new(kind: DomainEventKind, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            occurred_at: Utc::now(),
            payload,
        }
    }
}
