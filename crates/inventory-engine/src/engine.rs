//! The inventory consistency engine.

use chrono::Utc;
use common::{ActorId, ItemId};
use futures_util::TryStreamExt;
use serde::Serialize;
use stock_ledger::{
    AtomicUnit, EventStream, Item, ItemPatch, LedgerError, LedgerStore, NewItem, StockEvent,
    StockEventKind, replay_quantity, verify_running_totals,
};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Successful outcome of a stock-mutating operation: the updated item and
/// the single audit event the commit recorded.
#[derive(Debug, Clone, Serialize)]
pub struct StockChange {
    pub item: Item,
    pub event: StockEvent,
}

/// Result of replaying an item's audit trail against its live record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub item_id: ItemId,
    /// Stock count on the item row.
    pub recorded_quantity: u32,
    /// Sum of event deltas (the `Create` event carries the initial stock).
    pub replayed_quantity: i64,
    pub event_count: usize,
    /// Whether every event's `resulting_quantity` matches the running sum.
    pub totals_consistent: bool,
}

impl AuditReport {
    /// True when the trail fully accounts for the live stock count.
    pub fn is_consistent(&self) -> bool {
        self.totals_consistent && i64::from(self.recorded_quantity) == self.replayed_quantity
    }
}

/// The sole authority for changing stock counts.
///
/// Every mutating operation runs as one atomic unit against the ledger
/// store: acquire the item's row lock, re-validate against the freshly
/// locked record (never a value read earlier), stage the row write and the
/// audit event, commit. Expected business failures (`Validation`,
/// `InsufficientStock`) abort the unit with no write; so does every store
/// failure after the lock is held.
///
/// The store handle is passed in explicitly so tests can substitute the
/// in-memory implementation.
pub struct InventoryEngine<S: LedgerStore> {
    store: S,
    config: EngineConfig,
}

impl<S: LedgerStore> InventoryEngine<S> {
    /// Creates an engine with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Creates an engine with explicit configuration.
    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a new item with its initial stock.
    ///
    /// The item row and its `Create` event (delta = initial quantity) land
    /// in one atomic unit, so an item can never exist without the start of
    /// its audit trail.
    #[tracing::instrument(skip(self, spec), fields(item_name = %spec.name))]
    pub async fn create(&self, spec: NewItem) -> Result<StockChange, EngineError> {
        if spec.name.trim().is_empty() {
            return Err(validation("name", "must not be empty"));
        }
        if spec.category.trim().is_empty() {
            return Err(validation("category", "must not be empty"));
        }
        if spec.unit_price.is_negative() {
            return Err(validation("unit_price", "must not be negative"));
        }

        let item = Item::from_spec(spec, Utc::now());
        let event = StockEvent::new(
            item.id,
            StockEventKind::Create,
            i64::from(item.quantity),
            item.quantity,
        );

        let mut unit = self.store.begin().await?;
        if let Err(e) = unit.insert_item(&item).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        if let Err(e) = unit.append_event(&event).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        unit.commit().await?;

        metrics::counter!("engine_items_created_total").increment(1);
        Ok(StockChange { item, event })
    }

    /// Sells `qty` units to `buyer`.
    ///
    /// Serializes with every other mutation of the same item through the
    /// row lock; the lock, not any earlier read, is what prevents
    /// overselling. Fails with `InsufficientStock` (and writes nothing)
    /// when the freshly locked count is too low.
    #[tracing::instrument(skip(self))]
    pub async fn purchase(
        &self,
        item_id: ItemId,
        qty: u32,
        buyer: ActorId,
    ) -> Result<StockChange, EngineError> {
        ensure_positive_qty(qty)?;

        let outcome = self
            .commit_stock_change(item_id, |current| {
                let remaining = current.quantity.checked_sub(qty).ok_or(
                    EngineError::InsufficientStock {
                        item_id,
                        available: current.quantity,
                        requested: qty,
                    },
                )?;
                let total = current
                    .unit_price
                    .checked_times(qty)
                    .ok_or_else(|| validation("qty", "purchase value overflows"))?;
                let event =
                    StockEvent::new(item_id, StockEventKind::Purchase, -i64::from(qty), remaining)
                        .with_actor(buyer)
                        .with_total_value(total);
                Ok((current.with_quantity(remaining, Utc::now()), event))
            })
            .await;

        match &outcome {
            Ok(_) => metrics::counter!("engine_purchases_total").increment(1),
            Err(EngineError::InsufficientStock { .. }) => {
                metrics::counter!("engine_insufficient_stock_total").increment(1);
            }
            Err(_) => {}
        }
        outcome
    }

    /// Adds `qty` units of delivered stock.
    ///
    /// Holds the row lock even though no underflow is possible: a restock
    /// computed from a stale read would silently swallow a racing purchase.
    #[tracing::instrument(skip(self))]
    pub async fn restock(
        &self,
        item_id: ItemId,
        qty: u32,
        actor: ActorId,
    ) -> Result<StockChange, EngineError> {
        ensure_positive_qty(qty)?;

        let change = self
            .commit_stock_change(item_id, |current| {
                let new_quantity = current
                    .quantity
                    .checked_add(qty)
                    .ok_or_else(|| validation("qty", "stock count would overflow"))?;
                let event =
                    StockEvent::new(item_id, StockEventKind::Restock, i64::from(qty), new_quantity)
                        .with_actor(actor);
                Ok((current.with_quantity(new_quantity, Utc::now()), event))
            })
            .await?;

        metrics::counter!("engine_restocks_total").increment(1);
        Ok(change)
    }

    /// Applies a signed manual correction (e.g., a shrinkage write-off).
    ///
    /// Rejects a zero delta, and rejects any correction that would drive
    /// the count below zero.
    #[tracing::instrument(skip(self))]
    pub async fn adjust(
        &self,
        item_id: ItemId,
        delta: i64,
        actor: ActorId,
    ) -> Result<StockChange, EngineError> {
        if delta == 0 {
            return Err(validation("delta", "must not be zero"));
        }

        let change = self
            .commit_stock_change(item_id, |current| {
                let target = i64::from(current.quantity)
                    .checked_add(delta)
                    .ok_or_else(|| validation("delta", "stock count would overflow"))?;
                if target < 0 {
                    return Err(EngineError::InsufficientStock {
                        item_id,
                        available: current.quantity,
                        requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
                    });
                }
                let new_quantity = u32::try_from(target)
                    .map_err(|_| validation("delta", "stock count would overflow"))?;
                let event =
                    StockEvent::new(item_id, StockEventKind::ManualAdjust, delta, new_quantity)
                        .with_actor(actor);
                Ok((current.with_quantity(new_quantity, Utc::now()), event))
            })
            .await?;

        metrics::counter!("engine_adjustments_total").increment(1);
        Ok(change)
    }

    /// Updates an item's non-stock fields from a typed partial update.
    ///
    /// Takes the row lock despite not touching `quantity`: the full-row
    /// write would otherwise clobber a racing stock change. Records no
    /// stock event.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_details(
        &self,
        item_id: ItemId,
        patch: ItemPatch,
    ) -> Result<Item, EngineError> {
        if patch.is_empty() {
            return Err(validation("patch", "no fields to update"));
        }
        if let Some(price) = patch.unit_price
            && price.is_negative()
        {
            return Err(validation("unit_price", "must not be negative"));
        }

        let (mut unit, current) = self.begin_locked(item_id).await?;
        let mut updated = current;
        updated.apply_patch(patch, Utc::now());

        if let Err(e) = unit.write_item(&updated).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        unit.commit().await?;

        Ok(updated)
    }

    /// Administratively removes an item; its audit trail cascades with it.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, item_id: ItemId) -> Result<Item, EngineError> {
        let (mut unit, current) = self.begin_locked(item_id).await?;

        if let Err(e) = unit.delete_item(item_id).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        unit.commit().await?;

        metrics::counter!("engine_items_removed_total").increment(1);
        Ok(current)
    }

    /// Reads an item without locking it.
    #[tracing::instrument(skip(self))]
    pub async fn get_item(&self, item_id: ItemId) -> Result<Item, EngineError> {
        self.store
            .fetch_item(item_id)
            .await?
            .ok_or(EngineError::NotFound(item_id))
    }

    /// Streams an item's committed stock events, oldest first.
    ///
    /// Lock-free: the trail is append-only and immutable once committed,
    /// so a recent-but-stale snapshot is acceptable.
    #[tracing::instrument(skip(self))]
    pub async fn audit_trail(&self, item_id: ItemId) -> Result<EventStream, EngineError> {
        // Fail fast on unknown ids rather than returning an empty stream.
        self.get_item(item_id).await?;
        Ok(self.store.events_for_item(item_id).await?)
    }

    /// Replays an item's audit trail and checks it against the live record.
    #[tracing::instrument(skip(self))]
    pub async fn audit_report(&self, item_id: ItemId) -> Result<AuditReport, EngineError> {
        let item = self.get_item(item_id).await?;
        let events: Vec<StockEvent> = self
            .store
            .events_for_item(item_id)
            .await?
            .try_collect()
            .await?;

        Ok(AuditReport {
            item_id,
            recorded_quantity: item.quantity,
            replayed_quantity: replay_quantity(&events),
            event_count: events.len(),
            totals_consistent: verify_running_totals(&events),
        })
    }

    /// Opens a unit and takes the item's row lock, retrying expired lock
    /// waits up to the configured attempt budget before surfacing `Busy`.
    async fn begin_locked(
        &self,
        item_id: ItemId,
    ) -> Result<(Box<dyn AtomicUnit>, Item), EngineError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let mut unit = self.store.begin().await?;
            match unit.lock_item(item_id).await {
                Ok(Some(item)) => return Ok((unit, item)),
                Ok(None) => {
                    abort_quietly(unit).await;
                    return Err(EngineError::NotFound(item_id));
                }
                Err(LedgerError::LockTimeout(_)) if attempt < self.config.lock_attempts => {
                    abort_quietly(unit).await;
                    tracing::debug!(%item_id, attempt, "row lock wait expired, retrying");
                }
                Err(LedgerError::LockTimeout(_)) => {
                    abort_quietly(unit).await;
                    metrics::counter!("engine_lock_timeouts_total").increment(1);
                    return Err(EngineError::Busy(item_id));
                }
                Err(e) => {
                    abort_quietly(unit).await;
                    return Err(e.into());
                }
            }
        }
    }

    /// Lock-then-check core shared by the stock mutations: `decide` sees
    /// only the freshly locked record and returns the updated row plus its
    /// audit event; both are committed together or not at all.
    async fn commit_stock_change<F>(
        &self,
        item_id: ItemId,
        decide: F,
    ) -> Result<StockChange, EngineError>
    where
        F: FnOnce(&Item) -> Result<(Item, StockEvent), EngineError>,
    {
        let (mut unit, current) = self.begin_locked(item_id).await?;

        let (updated, event) = match decide(&current) {
            Ok(outcome) => outcome,
            Err(e) => {
                abort_quietly(unit).await;
                return Err(e);
            }
        };

        if let Err(e) = unit.write_item(&updated).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        if let Err(e) = unit.append_event(&event).await {
            abort_quietly(unit).await;
            return Err(e.into());
        }
        unit.commit().await?;

        Ok(StockChange {
            item: updated,
            event,
        })
    }
}

fn validation(field: &'static str, message: impl Into<String>) -> EngineError {
    EngineError::Validation {
        field,
        message: message.into(),
    }
}

fn ensure_positive_qty(qty: u32) -> Result<(), EngineError> {
    if qty == 0 {
        return Err(validation("qty", "must be a positive integer"));
    }
    Ok(())
}

async fn abort_quietly(unit: Box<dyn AtomicUnit>) {
    if let Err(error) = unit.abort().await {
        tracing::warn!(%error, "failed to abort atomic unit");
    }
}
