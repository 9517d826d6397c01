use common::ItemId;
use thiserror::Error;

/// Errors that can occur when interacting with the stock ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The bounded wait for an item's row lock expired.
    #[error("timed out waiting for the row lock on item {0}")]
    LockTimeout(ItemId),

    /// An item with this ID already exists.
    #[error("duplicate item id: {0}")]
    DuplicateItem(ItemId),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The store failed in a backend-specific way (corrupt row, injected
    /// fault). The surrounding atomic unit is guaranteed aborted.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
