use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ItemId, Money, StockKey};
use tokio::sync::RwLock;

use crate::{CatalogItem, Result, SizeStock, StockStore, StockVersion, StoreError};

#[derive(Debug, Default)]
struct InMemoryStockState {
    items: HashMap<ItemId, CatalogItem>,
    stock: HashMap<StockKey, SizeStock>,
    /// Pending simulated writers per row: each one wins the next CAS on that row.
    injected_conflicts: HashMap<StockKey, u32>,
    unavailable: bool,
}

/// In-memory stock store.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// seeding helpers and fault injection for tests and the demo server.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    state: Arc<RwLock<InMemoryStockState>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a catalog item.
    pub async fn put_item(&self, item: CatalogItem) {
        self.state.write().await.items.insert(item.id, item);
    }

    /// Creates or overwrites a stock row, bumping its version.
    pub async fn set_stock(&self, key: StockKey, quantity: u32) {
        let mut state = self.state.write().await;
        let version = state
            .stock
            .get(&key)
            .map(|row| row.version.next())
            .unwrap_or_else(StockVersion::first);
        state.stock.insert(
            key,
            SizeStock {
                key,
                quantity,
                version,
            },
        );
    }

    /// Removes a stock row, as when an admin drops a size from an item.
    pub async fn remove_stock(&self, key: StockKey) {
        self.state.write().await.stock.remove(&key);
    }

    /// Changes the catalog price of an item.
    pub async fn set_price(&self, item_id: ItemId, unit_price: Money) {
        if let Some(item) = self.state.write().await.items.get_mut(&item_id) {
            item.unit_price = unit_price;
        }
    }

    /// Makes the next `times` compare-and-decrement calls on `key` lose to a
    /// simulated concurrent writer (the row version moves, quantity does not).
    pub async fn inject_conflicts(&self, key: StockKey, times: u32) {
        self.state
            .write()
            .await
            .injected_conflicts
            .insert(key, times);
    }

    /// Configures every call to fail as if the backend were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the current quantity of a row, if it exists.
    pub async fn quantity(&self, key: StockKey) -> Option<u32> {
        self.state.read().await.stock.get(&key).map(|row| row.quantity)
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("in-memory stock store is offline".to_string())
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.items.get(&item_id).cloned())
    }

    async fn get_stock(&self, key: StockKey) -> Result<Option<SizeStock>> {
        let state = self.state.read().await;
        if state.unavailable {
            return Err(unavailable());
        }
        Ok(state.stock.get(&key).copied())
    }

    async fn compare_and_decrement(
        &self,
        key: StockKey,
        expected: StockVersion,
        quantity: u32,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable());
        }

        if let Some(remaining) = state.injected_conflicts.get_mut(&key)
            && *remaining > 0
        {
            *remaining -= 1;
            if let Some(row) = state.stock.get_mut(&key) {
                row.version = row.version.next();
            }
            return Ok(false);
        }

        match state.stock.get_mut(&key) {
            Some(row) if row.version == expected && row.quantity >= quantity => {
                row.quantity -= quantity;
                row.version = row.version.next();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn increment(&self, key: StockKey, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.unavailable {
            return Err(unavailable());
        }

        match state.stock.get_mut(&key) {
            Some(row) => {
                row.quantity = row.quantity.saturating_add(quantity);
                row.version = row.version.next();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
