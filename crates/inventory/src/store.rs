use async_trait::async_trait;
use common::{ItemId, StockKey};

use crate::{CatalogItem, Result, SizeStock, StockVersion};

/// Catalog and stock storage consumed by the reservation engine.
///
/// Reads are plain lookups. The two writes are the only stock mutations
/// checkout performs; everything else (admin edits, bulk uploads) lives
/// outside this crate.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Looks up a catalog item. Returns None if it does not exist.
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>>;

    /// Reads the quantity and version of a stock row.
    async fn get_stock(&self, key: StockKey) -> Result<Option<SizeStock>>;

    /// Decrements a stock row by `quantity` if, and only if, its version
    /// still equals `expected` and enough units remain.
    ///
    /// Returns `false` when no row was updated (a conflict). On success the
    /// row's version is incremented.
    async fn compare_and_decrement(
        &self,
        key: StockKey,
        expected: StockVersion,
        quantity: u32,
    ) -> Result<bool>;

    /// Adds `quantity` units back to a stock row regardless of its version.
    ///
    /// Returns `false` if the row no longer exists.
    async fn increment(&self, key: StockKey, quantity: u32) -> Result<bool>;
}
