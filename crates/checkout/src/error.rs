//! Checkout error types.

use common::{ItemId, Money, OrderId, SizeId};
use inventory::ReservationError;
use ledger::OrderStatus;
use thiserror::Error;

/// Every way a checkout can end without an order.
///
/// Messages never carry storage or gateway internals; those are logged where
/// the failure is observed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutError {
    /// The owner's cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// A request field is missing or too long.
    #[error("Invalid checkout request: {0}")]
    InvalidRequest(String),

    /// Shipping details failed validation.
    #[error("Invalid shipping details: {0}")]
    InvalidShippingDetails(String),

    /// The item or size no longer exists.
    #[error("Item {item_id} in size {size_id} is no longer available")]
    LineUnavailable { item_id: ItemId, size_id: SizeId },

    /// Not enough units on hand for one line; nothing was reserved.
    #[error(
        "Insufficient stock for item {item_id} size {size_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        item_id: ItemId,
        size_id: SizeId,
        requested: u32,
        available: u32,
    },

    /// Stock kept changing underneath the reservation.
    #[error("Stock was modified concurrently after {attempts} attempts, please retry")]
    ConcurrentModification { attempts: u32 },

    /// The order total is below what the payment processor accepts.
    #[error("Order total {total} is below the minimum chargeable amount {minimum}")]
    AmountTooLow { total: Money, minimum: Money },

    /// The payment processor declined, errored or timed out.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// The order could not be recorded.
    #[error("Order could not be saved")]
    OrderPersistenceFailed,

    /// No order with this id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order's status does not allow its payment to be captured.
    #[error("Order {order_id} is {status} and its payment cannot be captured")]
    OrderNotCapturable {
        order_id: OrderId,
        status: OrderStatus,
    },

    /// The cart could not be read.
    #[error("Cart is temporarily unavailable")]
    CartUnavailable,

    /// Stock could not be read or written.
    #[error("Inventory is temporarily unavailable")]
    InventoryUnavailable,

    /// The checkout task stopped before producing a result.
    #[error("Checkout was interrupted")]
    Interrupted,
}

impl CheckoutError {
    /// Returns true when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::ConcurrentModification { .. }
                | CheckoutError::CartUnavailable
                | CheckoutError::InventoryUnavailable
                | CheckoutError::Interrupted
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "EMPTY_CART",
            CheckoutError::InvalidRequest(_) => "INVALID_REQUEST",
            CheckoutError::InvalidShippingDetails(_) => "INVALID_SHIPPING_DETAILS",
            CheckoutError::LineUnavailable { .. } => "LINE_UNAVAILABLE",
            CheckoutError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CheckoutError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            CheckoutError::AmountTooLow { .. } => "AMOUNT_TOO_LOW",
            CheckoutError::PaymentFailed(_) => "PAYMENT_FAILED",
            CheckoutError::OrderPersistenceFailed => "ORDER_PERSISTENCE_FAILED",
            CheckoutError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            CheckoutError::OrderNotCapturable { .. } => "ORDER_NOT_CAPTURABLE",
            CheckoutError::CartUnavailable => "CART_UNAVAILABLE",
            CheckoutError::InventoryUnavailable => "INVENTORY_UNAVAILABLE",
            CheckoutError::Interrupted => "INTERRUPTED",
        }
    }
}

impl From<ReservationError> for CheckoutError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::EmptyReservation => CheckoutError::EmptyCart,
            ReservationError::InvalidQuantity { item_id, size_id }
            | ReservationError::LineUnavailable { item_id, size_id } => {
                CheckoutError::LineUnavailable { item_id, size_id }
            }
            ReservationError::InsufficientStock {
                item_id,
                size_id,
                requested,
                available,
            } => CheckoutError::InsufficientStock {
                item_id,
                size_id,
                requested,
                available,
            },
            ReservationError::ConcurrentModification { attempts } => {
                CheckoutError::ConcurrentModification { attempts }
            }
            ReservationError::Store(e) => {
                tracing::error!(error = %e, "stock store failed during reservation");
                CheckoutError::InventoryUnavailable
            }
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
