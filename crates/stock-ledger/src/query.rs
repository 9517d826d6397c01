use common::Money;

/// Builder for catalog item queries.
///
/// Supports the filters the storefront exposes: case-insensitive name
/// substring, exact category, and a unit-price range. Results are always
/// ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
    /// Case-insensitive substring match on the item name.
    pub name_contains: Option<String>,

    /// Exact category match.
    pub category: Option<String>,

    /// Minimum unit price (inclusive).
    pub min_price: Option<Money>,

    /// Maximum unit price (inclusive).
    pub max_price: Option<Money>,

    /// Maximum number of items to return.
    pub limit: Option<usize>,

    /// Number of items to skip.
    pub offset: Option<usize>,
}

impl ItemQuery {
    /// Creates a new empty query (matches every item).
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by name substring, case-insensitively.
    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    /// Filters by exact category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Filters by minimum unit price (inclusive).
    pub fn min_price(mut self, min_price: Money) -> Self {
        self.min_price = Some(min_price);
        self
    }

    /// Filters by maximum unit price (inclusive).
    pub fn max_price(mut self, max_price: Money) -> Self {
        self.max_price = Some(max_price);
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` results.
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}
