//! Cart endpoints.
//!
//! Adding or updating a line checks the catalog and current stock first.
//! The check is advisory: stock is only committed by checkout.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use cart::{Cart, CartError, CartStore};
use checkout::CheckoutError;
use common::{ItemId, OwnerId, SizeId, StockKey};
use inventory::StockStore;
use ledger::OrderLedger;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CartLineRequest {
    pub item_id: i64,
    pub size_id: i64,
    pub quantity: u32,
}

impl CartLineRequest {
    fn key(&self) -> StockKey {
        StockKey::new(self.item_id, self.size_id)
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub owner_id: String,
    pub lines: Vec<CartLineResponse>,
    pub total_quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    pub item_id: ItemId,
    pub size_id: SizeId,
    pub quantity: u32,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            owner_id: cart.owner_id().to_string(),
            lines: cart
                .lines()
                .into_iter()
                .map(|line| CartLineResponse {
                    item_id: line.item_id,
                    size_id: line.size_id,
                    quantity: line.quantity,
                })
                .collect(),
            total_quantity: cart.total_quantity(),
        }
    }
}

// -- Handlers --

/// GET /carts/{owner}: the owner's cart, empty if none exists.
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(owner): Path<String>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let cart = state.carts().get(&OwnerId::from(owner)).await?;
    Ok(Json(cart.into()))
}

/// POST /carts/{owner}/lines: add units of an item in a size.
#[tracing::instrument(skip(state))]
pub async fn add_line<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(owner): Path<String>,
    Json(req): Json<CartLineRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    reject_zero_quantity(req.quantity)?;

    let owner_id = OwnerId::from(owner);
    let key = req.key();
    let current = state.carts().get(&owner_id).await?;
    let resulting = current
        .quantity_of(key)
        .unwrap_or(0)
        .saturating_add(req.quantity);
    ensure_available(state.stock(), key, resulting).await?;

    let cart = state.carts().add_line(&owner_id, key, req.quantity).await?;
    tracing::info!(%owner_id, %key, quantity = req.quantity, "cart line added");
    Ok(Json(cart.into()))
}

/// PUT /carts/{owner}/lines: replace the quantity of an existing line.
#[tracing::instrument(skip(state))]
pub async fn update_line<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(owner): Path<String>,
    Json(req): Json<CartLineRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    reject_zero_quantity(req.quantity)?;

    let owner_id = OwnerId::from(owner);
    let key = req.key();
    let current = state.carts().get(&owner_id).await?;
    if current.quantity_of(key).is_none() {
        return Err(CartError::LineNotFound {
            item_id: key.item_id,
            size_id: key.size_id,
        }
        .into());
    }
    ensure_available(state.stock(), key, req.quantity).await?;

    let cart = state
        .carts()
        .update_quantity(&owner_id, key, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

/// DELETE /carts/{owner}/lines/{item}/{size}: remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_line<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path((owner, item_id, size_id)): Path<(String, i64, i64)>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let cart = state
        .carts()
        .remove_line(&OwnerId::from(owner), StockKey::new(item_id, size_id))
        .await?;
    Ok(Json(cart.into()))
}

fn reject_zero_quantity(quantity: u32) -> Result<(), ApiError> {
    if quantity == 0 {
        return Err(CartError::InvalidQuantity { quantity }.into());
    }
    Ok(())
}

/// Checks that the item exists and the size currently holds `requested` units.
async fn ensure_available<S: StockStore>(
    stock: &S,
    key: StockKey,
    requested: u32,
) -> Result<(), ApiError> {
    let unavailable = || CheckoutError::LineUnavailable {
        item_id: key.item_id,
        size_id: key.size_id,
    };

    if stock.get_item(key.item_id).await?.is_none() {
        return Err(unavailable().into());
    }
    let row = stock.get_stock(key).await?.ok_or_else(unavailable)?;

    if row.quantity < requested {
        return Err(CheckoutError::InsufficientStock {
            item_id: key.item_id,
            size_id: key.size_id,
            requested,
            available: row.quantity,
        }
        .into());
    }
    Ok(())
}
