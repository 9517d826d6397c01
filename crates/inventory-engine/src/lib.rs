//! Inventory consistency engine for the sweet-shop stock ledger.
//!
//! The engine is the sole authority for changing an item's stock count. It
//! guarantees, for any interleaving of concurrent callers, that quantities
//! never go negative and that every committed stock change carries exactly
//! one audit event. The invariants live here, not in the callers.
//!
//! All mutation runs lock-then-check inside a single atomic unit obtained
//! from the [`stock_ledger`] store, so the engine works identically against
//! the in-memory store (tests) and PostgreSQL (production).

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;

pub use catalog::Catalog;
pub use config::EngineConfig;
pub use engine::{AuditReport, InventoryEngine, StockChange};
pub use error::EngineError;
