use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::ItemId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::timeout;

use crate::{
    AtomicUnit, EventStream, Item, ItemQuery, LedgerError, LedgerStore, Result, StockEvent,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct LedgerState {
    items: HashMap<ItemId, Item>,
    /// Append-only, in commit order.
    events: Vec<StockEvent>,
    row_locks: HashMap<ItemId, Arc<Mutex<()>>>,
}

/// In-memory ledger store implementation for testing.
///
/// Clones share state, so a test can hand the store to an engine and keep
/// a handle for inspection. Row locks are per-item `Mutex`es acquired with
/// a bounded wait; staged writes become visible atomically at commit, while
/// the row lock is still held.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
    lock_timeout: Option<Duration>,
    fail_next_append: Arc<AtomicBool>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the bounded row-lock wait (default 5s).
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = Some(lock_timeout);
        self
    }

    /// Returns the total number of committed events.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns the number of items.
    pub async fn item_count(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Clears all items and events.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.items.clear();
        state.events.clear();
    }

    /// Makes the next `append_event` fail with a storage error, for
    /// exercising abort paths.
    pub fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }

    fn lock_timeout(&self) -> Duration {
        self.lock_timeout.unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    async fn row_lock(&self, item_id: ItemId) -> Arc<Mutex<()>> {
        let mut state = self.state.write().await;
        state
            .row_locks
            .entry(item_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

enum Staged {
    Insert(Item),
    Write(Item),
    Append(StockEvent),
    Delete(ItemId),
}

struct MemoryUnit {
    store: InMemoryLedgerStore,
    staged: Vec<Staged>,
    guards: Vec<OwnedMutexGuard<()>>,
}

#[async_trait]
impl AtomicUnit for MemoryUnit {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>> {
        let lock = self.store.row_lock(item_id).await;
        let guard = match timeout(self.store.lock_timeout(), lock.lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                tracing::debug!(%item_id, "row lock wait expired");
                return Err(LedgerError::LockTimeout(item_id));
            }
        };
        self.guards.push(guard);

        // Committers hold the row lock until their writes land, so this
        // re-read observes the latest committed record.
        let state = self.store.state.read().await;
        Ok(state.items.get(&item_id).cloned())
    }

    async fn insert_item(&mut self, item: &Item) -> Result<()> {
        // Primary-key simulation: reject an insert for an existing row.
        if self.store.state.read().await.items.contains_key(&item.id) {
            return Err(LedgerError::DuplicateItem(item.id));
        }
        self.staged.push(Staged::Insert(item.clone()));
        Ok(())
    }

    async fn write_item(&mut self, item: &Item) -> Result<()> {
        self.staged.push(Staged::Write(item.clone()));
        Ok(())
    }

    async fn append_event(&mut self, event: &StockEvent) -> Result<()> {
        if self.store.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Storage("injected append failure".to_string()));
        }
        self.staged.push(Staged::Append(event.clone()));
        Ok(())
    }

    async fn delete_item(&mut self, item_id: ItemId) -> Result<()> {
        self.staged.push(Staged::Delete(item_id));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut state = self.store.state.write().await;
        for staged in self.staged {
            match staged {
                Staged::Insert(item) | Staged::Write(item) => {
                    state.items.insert(item.id, item);
                }
                Staged::Append(event) => state.events.push(event),
                Staged::Delete(item_id) => {
                    state.items.remove(&item_id);
                    state.events.retain(|e| e.item_id != item_id);
                }
            }
        }
        Ok(())
        // Row locks release when `self.guards` drops, after the writes land.
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        // Staged writes and guards drop with `self`.
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>> {
        Ok(Box::new(MemoryUnit {
            store: self.clone(),
            staged: Vec::new(),
            guards: Vec::new(),
        }))
    }

    async fn fetch_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        Ok(self.state.read().await.items.get(&item_id).cloned())
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state.items.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn query_items(&self, query: ItemQuery) -> Result<Vec<Item>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .items
            .values()
            .filter(|item| {
                if let Some(ref fragment) = query.name_contains
                    && !item.name.to_lowercase().contains(&fragment.to_lowercase())
                {
                    return false;
                }
                if let Some(ref category) = query.category
                    && &item.category != category
                {
                    return false;
                }
                if let Some(min) = query.min_price
                    && item.unit_price < min
                {
                    return false;
                }
                if let Some(max) = query.max_price
                    && item.unit_price > max
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        items.sort_by(|a, b| a.name.cmp(&b.name));

        let offset = query.offset.unwrap_or(0);
        let items: Vec<_> = items.into_iter().skip(offset).collect();

        let items = if let Some(limit) = query.limit {
            items.into_iter().take(limit).collect()
        } else {
            items
        };

        Ok(items)
    }

    async fn events_for_item(&self, item_id: ItemId) -> Result<EventStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect();

        let stream = stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }
}
