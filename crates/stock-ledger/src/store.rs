use std::pin::Pin;

use async_trait::async_trait;
use common::ItemId;
use futures_core::Stream;

use crate::{Item, ItemQuery, Result, StockEvent};

/// A stream of stock events, oldest first.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StockEvent>> + Send>>;

/// One caller-scoped atomic unit against the ledger.
///
/// All writes staged through a unit become visible together at `commit`, or
/// not at all. `lock_item` takes the item's exclusive row lock and re-reads
/// the current record under it; callers must validate against that fresh
/// value, never against anything read before the lock (lock-then-check).
///
/// A unit locks at most one item; taking a second row lock in the same unit
/// is outside the contract and may deadlock.
#[async_trait]
pub trait AtomicUnit: Send {
    /// Acquires the exclusive row lock for `item_id` and returns the
    /// freshly-read record, or `None` if no such item exists.
    ///
    /// Blocks other units mutating the same item; units working on other
    /// items are unaffected. Fails with [`LedgerError::LockTimeout`] once
    /// the store's bounded wait expires.
    ///
    /// [`LedgerError::LockTimeout`]: crate::LedgerError::LockTimeout
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>>;

    /// Stages the insert of a brand-new item row.
    async fn insert_item(&mut self, item: &Item) -> Result<()>;

    /// Stages a full-row update of an existing item.
    async fn write_item(&mut self, item: &Item) -> Result<()>;

    /// Stages the append of a stock event.
    async fn append_event(&mut self, event: &StockEvent) -> Result<()>;

    /// Stages the removal of an item; its events go with it.
    async fn delete_item(&mut self, item_id: ItemId) -> Result<()>;

    /// Commits every staged write as a whole, then releases held locks.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards every staged write and releases held locks.
    async fn abort(self: Box<Self>) -> Result<()>;
}

/// Core trait for stock ledger implementations.
///
/// Mutations go through [`AtomicUnit`]s obtained from [`begin`]; the read
/// methods take no locks and may observe a recent-but-stale snapshot, which
/// is acceptable because committed events are immutable and append-only.
///
/// [`begin`]: LedgerStore::begin
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a new atomic unit.
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>>;

    /// Reads an item without locking it.
    async fn fetch_item(&self, item_id: ItemId) -> Result<Option<Item>>;

    /// Lists all items, ordered by name.
    async fn list_items(&self) -> Result<Vec<Item>>;

    /// Lists the items matching `query`, ordered by name.
    async fn query_items(&self, query: ItemQuery) -> Result<Vec<Item>>;

    /// Streams an item's committed events, oldest first.
    ///
    /// The stream is finite and restartable: each call produces a fresh
    /// snapshot of the trail as of some recent commit.
    async fn events_for_item(&self, item_id: ItemId) -> Result<EventStream>;
}
