//! Order lookup, status and capture endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ItemId, OrderId, OwnerId, SizeId};
use inventory::StockStore;
use ledger::{Order, OrderLedger, OrderStatus, ShippingDetails};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub owner_id: String,
    pub status: String,
    pub created_at: String,
    pub payment_method: String,
    pub payment_reference: String,
    pub shipping: ShippingDetails,
    pub lines: Vec<OrderLineResponse>,
    pub total_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderLineResponse {
    pub item_id: ItemId,
    pub size_id: SizeId,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let lines = order
            .lines
            .iter()
            .map(|line| OrderLineResponse {
                item_id: line.item_id,
                size_id: line.size_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total().cents(),
            })
            .collect();

        Self {
            id: order.id.to_string(),
            owner_id: order.owner_id.to_string(),
            status: order.status.to_string(),
            created_at: order.created_at.to_rfc3339(),
            payment_method: order.payment_method,
            payment_reference: order.payment_reference,
            shipping: order.shipping,
            lines,
            total_cents: order.total.cents(),
        }
    }
}

// -- Handlers --

/// GET /orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let order_id = parse_order_id(&id)?;

    let order = state
        .ledger()
        .get_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order.into()))
}

/// GET /owners/{owner}/orders: the owner's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_owner<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let orders = state.ledger().list_for_user(&OwnerId::from(owner)).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// PUT /orders/{id}/status: move an order along its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let order_id = parse_order_id(&id)?;
    let status: OrderStatus = req
        .status
        .parse()
        .map_err(|e: ledger::UnknownOrderStatus| ApiError::BadRequest(e.to_string()))?;

    let order = state.ledger().update_status(order_id, status).await?;
    tracing::info!(%order_id, status = %order.status, "order status updated");

    Ok(Json(order.into()))
}

/// POST /orders/{id}/capture: retry a capture deferred at checkout.
#[tracing::instrument(skip(state))]
pub async fn capture<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.checkout.capture_payment(order_id).await?;
    Ok(Json(order.into()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
