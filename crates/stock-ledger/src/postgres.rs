use std::time::Duration;

use async_trait::async_trait;
use common::{ActorId, ItemId, Money};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AtomicUnit, EventStream, Item, ItemQuery, LedgerError, LedgerStore, Result, StockEvent,
    StockEventKind, event::EventId,
};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

// SQLSTATE codes surfaced by the locking and insert paths.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed ledger store implementation.
///
/// Atomic units map to database transactions; the row lock is
/// `SELECT ... FOR UPDATE` bounded by a per-transaction `lock_timeout`.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Overrides the bounded row-lock wait (default 5s).
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_item(row: PgRow) -> Result<Item> {
        let quantity: i64 = row.try_get("quantity")?;
        let quantity = u32::try_from(quantity)
            .map_err(|_| LedgerError::Storage(format!("quantity out of range: {quantity}")))?;

        Ok(Item {
            id: ItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            quantity,
            description: row.try_get("description")?,
            image_ref: row.try_get("image_ref")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<StockEvent> {
        let kind: String = row.try_get("kind")?;
        let kind = StockEventKind::parse(&kind)
            .ok_or_else(|| LedgerError::Storage(format!("unknown event kind: {kind}")))?;
        let resulting: i64 = row.try_get("resulting_quantity")?;
        let resulting = u32::try_from(resulting).map_err(|_| {
            LedgerError::Storage(format!("resulting quantity out of range: {resulting}"))
        })?;

        Ok(StockEvent {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            item_id: ItemId::from_uuid(row.try_get::<Uuid, _>("item_id")?),
            kind,
            delta: row.try_get("delta")?,
            resulting_quantity: resulting,
            actor_id: row
                .try_get::<Option<Uuid>, _>("actor_id")?
                .map(ActorId::from_uuid),
            total_value: row
                .try_get::<Option<i64>, _>("total_value_cents")?
                .map(Money::from_cents),
            timestamp: row.try_get("recorded_at")?,
        })
    }
}

struct PostgresUnit {
    tx: Transaction<'static, Postgres>,
}

const ITEM_COLUMNS: &str =
    "id, name, category, unit_price_cents, quantity, description, image_ref, created_at, updated_at";

#[async_trait]
impl AtomicUnit for PostgresUnit {
    async fn lock_item(&mut self, item_id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
                tracing::debug!(%item_id, "row lock wait expired");
                LedgerError::LockTimeout(item_id)
            }
            _ => LedgerError::Database(e),
        })?;

        row.map(PostgresLedgerStore::row_to_item).transpose()
    }

    async fn insert_item(&mut self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name, category, unit_price_cents, quantity, description, image_ref, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price.cents())
        .bind(i64::from(item.quantity))
        .bind(&item.description)
        .bind(&item.image_ref)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                LedgerError::DuplicateItem(item.id)
            }
            _ => LedgerError::Database(e),
        })?;

        Ok(())
    }

    async fn write_item(&mut self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE items
            SET name = $2, category = $3, unit_price_cents = $4, quantity = $5,
                description = $6, image_ref = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.unit_price.cents())
        .bind(i64::from(item.quantity))
        .bind(&item.description)
        .bind(&item.image_ref)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn append_event(&mut self, event: &StockEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_events (id, item_id, kind, delta, resulting_quantity, actor_id, total_value_cents, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.item_id.as_uuid())
        .bind(event.kind.as_str())
        .bind(event.delta)
        .bind(i64::from(event.resulting_quantity))
        .bind(event.actor_id.map(|a| a.as_uuid()))
        .bind(event.total_value.map(|v| v.cents()))
        .bind(event.timestamp)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_item(&mut self, item_id: ItemId) -> Result<()> {
        // Events cascade via the foreign key.
        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn AtomicUnit>> {
        let mut tx = self.pool.begin().await?;

        // Bound the FOR UPDATE wait; expiry surfaces SQLSTATE 55P03.
        let stmt = format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        );
        sqlx::query(&stmt).execute(&mut *tx).await?;

        Ok(Box::new(PostgresUnit { tx }))
    }

    async fn fetch_item(&self, item_id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(item_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn list_items(&self) -> Result<Vec<Item>> {
        let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn query_items(&self, query: ItemQuery) -> Result<Vec<Item>> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.name_contains.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND LOWER(name) LIKE LOWER(${param_count})"));
        }
        if query.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }
        if query.min_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND unit_price_cents >= ${param_count}"));
        }
        if query.max_price.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND unit_price_cents <= ${param_count}"));
        }

        sql.push_str(" ORDER BY name");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut q = sqlx::query(&sql);
        if let Some(ref fragment) = query.name_contains {
            q = q.bind(format!("%{fragment}%"));
        }
        if let Some(ref category) = query.category {
            q = q.bind(category.clone());
        }
        if let Some(min) = query.min_price {
            q = q.bind(min.cents());
        }
        if let Some(max) = query.max_price {
            q = q.bind(max.cents());
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            q = q.bind(offset as i64);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn events_for_item(&self, item_id: ItemId) -> Result<EventStream> {
        use futures_util::stream;

        let rows = sqlx::query(
            r#"
            SELECT id, item_id, kind, delta, resulting_quantity, actor_id, total_value_cents, recorded_at
            FROM stock_events
            WHERE item_id = $1
            ORDER BY recorded_seq ASC
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let events: Vec<Result<StockEvent>> =
            rows.into_iter().map(Self::row_to_event).collect();
        Ok(Box::pin(stream::iter(events)))
    }
}
