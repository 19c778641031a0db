use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OwnerId, StockKey};
use tokio::sync::RwLock;

use crate::{Cart, CartError, CartStore, Result};

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<OwnerId, Cart>,
    fail_on_clear: bool,
    unavailable: bool,
}

/// In-memory cart store keyed by owner.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartStore {
    /// Creates a new empty cart store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures `clear` to fail.
    pub async fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().await.fail_on_clear = fail;
    }

    /// Configures every call to fail as if the backend were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Returns the number of owners with a non-empty cart.
    pub async fn cart_count(&self) -> usize {
        self.state.read().await.carts.len()
    }
}

fn unavailable() -> CartError {
    CartError::Unavailable("in-memory cart store is offline".to_string())
}

impl InMemoryCartState {
    fn check(&self) -> Result<()> {
        if self.unavailable {
            return Err(unavailable());
        }
        Ok(())
    }

    /// Applies `f` to the owner's cart, storing the result only on success.
    fn mutate<F>(&mut self, owner_id: &OwnerId, f: F) -> Result<Cart>
    where
        F: FnOnce(&mut Cart) -> Result<()>,
    {
        self.check()?;

        let mut cart = self
            .carts
            .get(owner_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(owner_id.clone()));
        f(&mut cart)?;

        if cart.is_empty() {
            self.carts.remove(owner_id);
        } else {
            self.carts.insert(owner_id.clone(), cart.clone());
        }
        Ok(cart)
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get(&self, owner_id: &OwnerId) -> Result<Cart> {
        let state = self.state.read().await;
        state.check()?;
        Ok(state
            .carts
            .get(owner_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(owner_id.clone())))
    }

    async fn add_line(&self, owner_id: &OwnerId, key: StockKey, quantity: u32) -> Result<Cart> {
        self.state
            .write()
            .await
            .mutate(owner_id, |cart| cart.add(key, quantity).map(|_| ()))
    }

    async fn update_quantity(
        &self,
        owner_id: &OwnerId,
        key: StockKey,
        quantity: u32,
    ) -> Result<Cart> {
        self.state
            .write()
            .await
            .mutate(owner_id, |cart| cart.update_quantity(key, quantity))
    }

    async fn remove_line(&self, owner_id: &OwnerId, key: StockKey) -> Result<Cart> {
        self.state
            .write()
            .await
            .mutate(owner_id, |cart| cart.remove(key))
    }

    async fn clear(&self, owner_id: &OwnerId) -> Result<()> {
        let mut state = self.state.write().await;
        state.check()?;
        if state.fail_on_clear {
            return Err(CartError::Unavailable("failed to clear cart".to_string()));
        }
        state.carts.remove(owner_id);
        Ok(())
    }
}
