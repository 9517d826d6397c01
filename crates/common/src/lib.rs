pub mod types;

pub use types::{ActorId, ItemId, Money};
