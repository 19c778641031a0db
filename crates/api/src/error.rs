//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cart::CartError;
use checkout::CheckoutError;
use common::{ItemId, SizeId};
use inventory::StoreError;
use ledger::LedgerError;
use serde::Serialize;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Checkout failure, or an advisory stock check reusing its taxonomy.
    Checkout(CheckoutError),
    /// Order ledger error.
    Ledger(LedgerError),
    /// Cart store error.
    Cart(CartError),
    /// Stock store error.
    Inventory(StoreError),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<SizeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u32>,
}

impl ErrorBody {
    fn new(error: impl Into<String>, code: &'static str, retryable: bool) -> Self {
        Self {
            error: error.into(),
            code,
            retryable,
            item_id: None,
            size_id: None,
            requested: None,
            available: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new(msg, "NOT_FOUND", false)),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(msg, "BAD_REQUEST", false),
            ),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Ledger(err) => ledger_error_to_response(err),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Inventory(err) => {
                tracing::error!(error = %err, "stock store error");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new("Inventory is temporarily unavailable", "INVENTORY_UNAVAILABLE", true),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, ErrorBody) {
    let status = match &err {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidRequest(_)
        | CheckoutError::InvalidShippingDetails(_)
        | CheckoutError::AmountTooLow { .. } => StatusCode::BAD_REQUEST,
        CheckoutError::LineUnavailable { .. }
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::ConcurrentModification { .. }
        | CheckoutError::OrderNotCapturable { .. } => StatusCode::CONFLICT,
        CheckoutError::PaymentFailed(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::OrderPersistenceFailed | CheckoutError::Interrupted => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        CheckoutError::CartUnavailable | CheckoutError::InventoryUnavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        CheckoutError::OrderNotFound(_) => StatusCode::NOT_FOUND,
    };

    let mut body = ErrorBody::new(err.to_string(), err.code(), err.is_retryable());
    match err {
        CheckoutError::LineUnavailable { item_id, size_id } => {
            body.item_id = Some(item_id);
            body.size_id = Some(size_id);
        }
        CheckoutError::InsufficientStock {
            item_id,
            size_id,
            requested,
            available,
        } => {
            body.item_id = Some(item_id);
            body.size_id = Some(size_id);
            body.requested = Some(requested);
            body.available = Some(available);
        }
        _ => {}
    }

    (status, body)
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, ErrorBody) {
    match &err {
        LedgerError::OrderNotFound(_) => (
            StatusCode::NOT_FOUND,
            ErrorBody::new(err.to_string(), "ORDER_NOT_FOUND", false),
        ),
        LedgerError::InvalidStatusTransition { .. } => (
            StatusCode::CONFLICT,
            ErrorBody::new(err.to_string(), "INVALID_STATUS_TRANSITION", false),
        ),
        LedgerError::DuplicateIdempotencyKey { .. } => (
            StatusCode::CONFLICT,
            ErrorBody::new(err.to_string(), "DUPLICATE_IDEMPOTENCY_KEY", false),
        ),
        LedgerError::Unavailable(_) => {
            tracing::error!(error = %err, "order ledger unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("Order ledger is temporarily unavailable", "LEDGER_UNAVAILABLE", true),
            )
        }
        LedgerError::Database(_) | LedgerError::Migration(_) | LedgerError::Corrupt(_) => {
            tracing::error!(error = %err, "order ledger error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody::new("Internal server error", "INTERNAL", false),
            )
        }
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, ErrorBody) {
    match &err {
        CartError::InvalidQuantity { .. } => (
            StatusCode::BAD_REQUEST,
            ErrorBody::new(err.to_string(), "INVALID_QUANTITY", false),
        ),
        CartError::LineNotFound { item_id, size_id } => {
            let mut body = ErrorBody::new(err.to_string(), "LINE_NOT_FOUND", false);
            body.item_id = Some(*item_id);
            body.size_id = Some(*size_id);
            (StatusCode::NOT_FOUND, body)
        }
        CartError::Unavailable(_) => {
            tracing::error!(error = %err, "cart store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody::new("Cart is temporarily unavailable", "CART_UNAVAILABLE", true),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Inventory(err)
    }
}
