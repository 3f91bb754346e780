//! Shared identifiers and value types used by the cart and payment crates.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartId, CorrelationId, ItemId, OrderNumber};
