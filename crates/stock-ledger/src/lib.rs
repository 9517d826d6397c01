//! Stock ledger: durable item records plus an append-only log of stock
//! change events.
//!
//! The ledger exposes a minimal transactional contract ([`LedgerStore`] /
//! [`AtomicUnit`]) so the engine that enforces stock invariants stays
//! independent of the backing store. Two implementations are provided:
//! [`InMemoryLedgerStore`] for tests and [`PostgresLedgerStore`] for
//! production.

pub mod error;
pub mod event;
pub mod item;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{ActorId, ItemId, Money};
pub use error::{LedgerError, Result};
pub use event::{EventId, StockEvent, StockEventKind, replay_quantity, verify_running_totals};
pub use item::{Item, ItemPatch, NewItem};
pub use memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use query::ItemQuery;
pub use store::{AtomicUnit, EventStream, LedgerStore};
