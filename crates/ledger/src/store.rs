use async_trait::async_trait;
use common::{IdempotencyKey, OrderId, OwnerId};

use crate::{NewOrder, Order, OrderStatus, Result};

/// Durable storage for committed orders.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Writes shipping details, the order and its lines as one unit.
    ///
    /// The new order is `Pending`. Fails with `DuplicateIdempotencyKey` if
    /// the owner already has an order under the same key.
    async fn create(&self, order: NewOrder) -> Result<Order>;

    /// Moves an order to `new_status` if the status machine allows it.
    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order>;

    /// Loads an order by id.
    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists an owner's orders, newest first.
    async fn list_for_user(&self, owner_id: &OwnerId) -> Result<Vec<Order>>;

    /// Finds the order an owner created under an idempotency key.
    async fn find_by_idempotency_key(
        &self,
        owner_id: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>>;
}
