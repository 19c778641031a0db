use common::{ItemId, Money, SizeId, StockKey};
use serde::{Deserialize, Serialize};

/// Category reference of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(i64);

impl CategoryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A purchasable catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub unit_price: Money,
    pub category_id: CategoryId,
}

impl CatalogItem {
    pub fn new(
        id: i64,
        name: impl Into<String>,
        unit_price: Money,
        category_id: CategoryId,
    ) -> Self {
        Self {
            id: ItemId::new(id),
            name: name.into(),
            unit_price,
            category_id,
        }
    }
}

/// Version token of a stock row, used for optimistic concurrency control.
///
/// Rows start at version 1 and every successful write bumps it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StockVersion(i64);

impl StockVersion {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version assigned to a freshly created row.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for StockVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quantity on hand for one item in one size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub key: StockKey,
    pub quantity: u32,
    pub version: StockVersion,
}

impl SizeStock {
    pub fn item_id(&self) -> ItemId {
        self.key.item_id
    }

    pub fn size_id(&self) -> SizeId {
        self.key.size_id
    }
}
