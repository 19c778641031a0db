//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use checkout::CheckoutRequest;
use inventory::StockStore;
use ledger::{OrderLedger, ShippingDetails};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the client's retry key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub owner_id: String,
    pub shipping: ShippingDetails,
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub status: String,
    pub total_cents: i64,
}

/// POST /checkout: turn the owner's cart into an order.
#[tracing::instrument(skip(state, headers, body))]
pub async fn place_order<S, L>(
    State(state): State<Arc<AppState<S, L>>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    if body.owner_id.trim().is_empty() {
        return Err(ApiError::BadRequest("owner_id must not be empty".to_string()));
    }

    let mut request = CheckoutRequest::new(body.owner_id, body.shipping, body.payment_method);
    if let Some(key) = idempotency_key(&headers)? {
        request = request.with_idempotency_key(key);
    }

    let order = state.checkout.checkout(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order.id.to_string(),
            status: order.status.to_string(),
            total_cents: order.total.cents(),
        }),
    ))
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be visible ASCII".to_string()))?
        .trim();

    if key.is_empty() {
        Ok(None)
    } else {
        Ok(Some(key.to_string()))
    }
}
