use chrono::{DateTime, Utc};
use common::{ActorId, ItemId, Money};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stock event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of stock change an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockEventKind {
    /// Item created with its initial stock.
    Create,
    /// Stock decremented by a sale.
    Purchase,
    /// Stock incremented by a delivery.
    Restock,
    /// Signed manual correction (e.g., shrinkage write-off).
    ManualAdjust,
}

impl StockEventKind {
    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Purchase => "Purchase",
            Self::Restock => "Restock",
            Self::ManualAdjust => "ManualAdjust",
        }
    }

    /// Parses the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Create" => Some(Self::Create),
            "Purchase" => Some(Self::Purchase),
            "Restock" => Some(Self::Restock),
            "ManualAdjust" => Some(Self::ManualAdjust),
            _ => None,
        }
    }
}

impl std::fmt::Display for StockEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one stock change.
///
/// Appended exactly once when its parent operation commits; never mutated,
/// and deleted only when its item is permanently removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEvent {
    pub id: EventId,
    pub item_id: ItemId,
    pub kind: StockEventKind,
    /// Signed stock change; the `Create` event carries the initial quantity.
    pub delta: i64,
    /// Stock count after this change committed.
    pub resulting_quantity: u32,
    /// Buyer or staff member behind the change, when known.
    pub actor_id: Option<ActorId>,
    /// For purchases: quantity × unit price at event time.
    pub total_value: Option<Money>,
    pub timestamp: DateTime<Utc>,
}

impl StockEvent {
    /// Creates an event with a fresh ID and the current time.
    pub fn new(item_id: ItemId, kind: StockEventKind, delta: i64, resulting_quantity: u32) -> Self {
        Self {
            id: EventId::new(),
            item_id,
            kind,
            delta,
            resulting_quantity,
            actor_id: None,
            total_value: None,
            timestamp: Utc::now(),
        }
    }

    /// Attributes the event to an actor.
    pub fn with_actor(mut self, actor_id: ActorId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Records the monetary value of the change.
    pub fn with_total_value(mut self, total_value: Money) -> Self {
        self.total_value = Some(total_value);
        self
    }
}

/// Sums the deltas of an item's events, oldest first.
///
/// The `Create` event carries the initial quantity as its delta, so for a
/// complete trail the sum equals the item's current stock count.
pub fn replay_quantity(events: &[StockEvent]) -> i64 {
    events.iter().map(|e| e.delta).sum()
}

/// Checks that every event's `resulting_quantity` matches the running sum
/// of deltas up to and including it.
pub fn verify_running_totals(events: &[StockEvent]) -> bool {
    let mut running = 0i64;
    for event in events {
        running += event.delta;
        if running < 0 || running != i64::from(event.resulting_quantity) {
            return false;
        }
    }
    true
}
