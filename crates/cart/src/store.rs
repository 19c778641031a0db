use async_trait::async_trait;
use common::{OwnerId, StockKey};

use crate::{Cart, Result};

/// Storage for per-owner carts.
///
/// Every mutation returns the cart as it stands afterwards.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Returns the owner's cart, or an empty one if none exists.
    async fn get(&self, owner_id: &OwnerId) -> Result<Cart>;

    /// Adds units to a line, creating it if needed.
    async fn add_line(&self, owner_id: &OwnerId, key: StockKey, quantity: u32) -> Result<Cart>;

    /// Replaces the quantity of an existing line.
    async fn update_quantity(
        &self,
        owner_id: &OwnerId,
        key: StockKey,
        quantity: u32,
    ) -> Result<Cart>;

    /// Removes a line.
    async fn remove_line(&self, owner_id: &OwnerId, key: StockKey) -> Result<Cart>;

    /// Drops every line of the owner's cart.
    async fn clear(&self, owner_id: &OwnerId) -> Result<()>;
}
