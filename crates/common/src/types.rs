use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a catalog item.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// item IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Creates a new random item ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an item ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ItemId> for Uuid {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

/// Unique identifier for the actor behind a stock change (buyer or staff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Creates a new random actor ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an actor ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ActorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ActorId> for Uuid {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 199 = $1.99)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from a whole dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Adds another money amount, returning None on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.cents.checked_add(other.cents).map(Money::from_cents)
    }

    /// Multiplies by a quantity, returning None on overflow.
    pub fn checked_times(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_new_creates_unique_ids() {
        let id1 = ItemId::new();
        let id2 = ItemId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn item_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = ItemId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn item_id_serialization_roundtrip() {
        let id = ItemId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn actor_id_serialization_roundtrip() {
        let id = ActorId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: ActorId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn money_from_dollars() {
        assert_eq!(Money::from_dollars(10).cents(), 1000);
    }

    #[test]
    fn money_display() {
        assert_eq!(Money::from_cents(199).to_string(), "$1.99");
        assert_eq!(Money::from_cents(-250).to_string(), "-$2.50");
        assert_eq!(Money::zero().to_string(), "$0.00");
    }

    #[test]
    fn money_checked_times() {
        let price = Money::from_cents(199);
        assert_eq!(price.checked_times(3), Some(Money::from_cents(597)));
        assert_eq!(Money::from_cents(i64::MAX).checked_times(2), None);
    }

    #[test]
    fn money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);
        assert_eq!((a + b).cents(), 1250);
        assert_eq!((a - b).cents(), 750);
        assert_eq!(a.checked_add(b), Some(Money::from_cents(1250)));
    }
}
