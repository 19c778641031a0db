//! Shared identifiers and value types used across the checkout workspace.

pub mod line;
pub mod money;
pub mod types;

pub use line::{CartLine, StockKey};
pub use money::Money;
pub use types::{IdempotencyKey, ItemId, OrderId, OwnerId, SizeId};
