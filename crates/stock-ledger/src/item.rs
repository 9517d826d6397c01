use chrono::{DateTime, Utc};
use common::{ItemId, Money};
use serde::{Deserialize, Serialize};

/// A sellable catalog item with a live stock count.
///
/// `quantity` is non-negative by construction; only the inventory engine
/// writes it, always under the item's row lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub description: Option<String>,
    pub image_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Materializes a new item from a creation spec.
    pub fn from_spec(spec: NewItem, at: DateTime<Utc>) -> Self {
        Self {
            id: ItemId::new(),
            name: spec.name,
            category: spec.category,
            unit_price: spec.unit_price,
            quantity: spec.quantity,
            description: spec.description,
            image_ref: spec.image_ref,
            created_at: at,
            updated_at: at,
        }
    }

    /// Returns a copy with the stock count replaced and `updated_at` bumped.
    pub fn with_quantity(&self, quantity: u32, at: DateTime<Utc>) -> Self {
        Self {
            quantity,
            updated_at: at,
            ..self.clone()
        }
    }

    /// Applies a partial update of the non-stock fields.
    pub fn apply_patch(&mut self, patch: ItemPatch, at: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(unit_price) = patch.unit_price {
            self.unit_price = unit_price;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(image_ref) = patch.image_ref {
            self.image_ref = Some(image_ref);
        }
        self.updated_at = at;
    }
}

/// Creation spec for a new item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

impl NewItem {
    /// Creates a spec with the required fields.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            unit_price,
            quantity,
            description: None,
            image_ref: None,
        }
    }

    /// Sets the optional description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the optional image reference.
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }
}

/// Typed partial update of an item's non-stock fields.
///
/// Only the listed optional fields are recognized; `quantity` is absent on
/// purpose, since stock moves only through the event-producing engine
/// operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit_price: Option<Money>,
    pub description: Option<String>,
    pub image_ref: Option<String>,
}

impl ItemPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a new name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a new category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets a new unit price.
    pub fn unit_price(mut self, unit_price: Money) -> Self {
        self.unit_price = Some(unit_price);
        self
    }

    /// Sets a new description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets a new image reference.
    pub fn image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = Some(image_ref.into());
        self
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.unit_price.is_none()
            && self.description.is_none()
            && self.image_ref.is_none()
    }
}
