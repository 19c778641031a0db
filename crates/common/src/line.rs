//! Cart lines and the stock row key they refer to.

use serde::{Deserialize, Serialize};

use crate::{ItemId, SizeId};

/// Composite key of a per-size stock row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub item_id: ItemId,
    pub size_id: SizeId,
}

impl StockKey {
    pub fn new(item_id: i64, size_id: i64) -> Self {
        Self {
            item_id: ItemId::new(item_id),
            size_id: SizeId::new(size_id),
        }
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {} / size {}", self.item_id, self.size_id)
    }
}

/// A pending selection: one item in one size, at some quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: ItemId,
    pub size_id: SizeId,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(item_id: i64, size_id: i64, quantity: u32) -> Self {
        Self {
            item_id: ItemId::new(item_id),
            size_id: SizeId::new(size_id),
            quantity,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey {
            item_id: self.item_id,
            size_id: self.size_id,
        }
    }
}
