use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{IdempotencyKey, OrderId, OwnerId};
use tokio::sync::RwLock;

use crate::{LedgerError, NewOrder, Order, OrderLedger, OrderStatus, Result};

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    /// Orders with their insertion sequence, used to break timestamp ties.
    orders: HashMap<OrderId, (u64, Order)>,
    idempotency: HashMap<(OwnerId, IdempotencyKey), OrderId>,
    next_sequence: u64,
    fail_on_create: bool,
}

/// In-memory order ledger.
///
/// Provides the same interface as the PostgreSQL implementation, plus
/// failure injection for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

impl InMemoryOrderLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `create` to fail with a storage error.
    pub async fn set_fail_on_create(&self, fail: bool) {
        self.state.write().await.fail_on_create = fail;
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderLedger for InMemoryOrderLedger {
    async fn create(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;

        if state.fail_on_create {
            return Err(LedgerError::Unavailable(
                "failed to write order".to_string(),
            ));
        }

        if let Some(key) = &order.idempotency_key
            && state
                .idempotency
                .contains_key(&(order.owner_id.clone(), key.clone()))
        {
            return Err(LedgerError::DuplicateIdempotencyKey {
                owner_id: order.owner_id,
                key: key.clone(),
            });
        }

        let order = order.into_order(OrderId::new(), Utc::now());
        if let Some(key) = &order.idempotency_key {
            state
                .idempotency
                .insert((order.owner_id.clone(), key.clone()), order.id);
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.orders.insert(order.id, (sequence, order.clone()));

        Ok(order)
    }

    async fn update_status(&self, order_id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let (_, order) = state
            .orders
            .get_mut(&order_id)
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        if !order.status.can_transition_to(new_status) {
            return Err(LedgerError::InvalidStatusTransition {
                from: order.status,
                to: new_status,
            });
        }

        order.status = new_status;
        Ok(order.clone())
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).map(|(_, order)| order.clone()))
    }

    async fn list_for_user(&self, owner_id: &OwnerId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<&(u64, Order)> = state
            .orders
            .values()
            .filter(|(_, order)| &order.owner_id == owner_id)
            .collect();
        orders.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b_seq.cmp(a_seq))
        });
        Ok(orders.into_iter().map(|(_, order)| order.clone()).collect())
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: &OwnerId,
        key: &IdempotencyKey,
    ) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .idempotency
            .get(&(owner_id.clone(), key.clone()))
            .and_then(|id| state.orders.get(id))
            .map(|(_, order)| order.clone()))
    }
}
