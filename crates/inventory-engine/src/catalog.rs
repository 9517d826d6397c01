//! Thin read-only catalog over the ledger store.

use common::ItemId;
use stock_ledger::{Item, ItemQuery, LedgerStore, Result};

/// Query-side companion to the engine: listing and storefront filtering.
///
/// Takes no locks and may observe a recent-but-stale snapshot, which is
/// fine for browsing; committed stock changes are serialized elsewhere.
pub struct Catalog<S: LedgerStore> {
    store: S,
}

impl<S: LedgerStore> Catalog<S> {
    /// Creates a catalog over the given ledger store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Lists all items, ordered by name.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Item>> {
        self.store.list_items().await
    }

    /// Lists the items matching the filter, ordered by name.
    #[tracing::instrument(skip(self, query))]
    pub async fn search(&self, query: ItemQuery) -> Result<Vec<Item>> {
        self.store.query_items(query).await
    }

    /// Reads a single item, if it exists.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, item_id: ItemId) -> Result<Option<Item>> {
        self.store.fetch_item(item_id).await
    }
}
