//! Engine error types.

use common::ItemId;
use stock_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur during engine operations.
///
/// `Validation` and `InsufficientStock` are definitive business outcomes:
/// the engine never retries them internally and no write happens. `Busy`
/// means the bounded lock wait was exhausted and the call is safe to retry.
/// `Storage` wraps a ledger failure; the surrounding atomic unit is
/// guaranteed aborted, so no partial state is ever observable.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input shape or range; the caller's fault, not retryable as-is.
    #[error("validation failed for {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// No item with this ID exists.
    #[error("item not found: {0}")]
    NotFound(ItemId),

    /// The purchase or adjustment would drive stock below zero.
    #[error(
        "insufficient stock for item {item_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        item_id: ItemId,
        available: u32,
        requested: u32,
    },

    /// Lock contention exhausted the bounded retry budget.
    #[error("item {0} is busy; retry later")]
    Busy(ItemId),

    /// The ledger store failed; the atomic unit was aborted.
    #[error("ledger store error: {0}")]
    Storage(#[from] LedgerError),
}

impl EngineError {
    /// True only for failures that are safe to retry unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy(_))
    }
}
