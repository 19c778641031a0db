use common::{IdempotencyKey, OrderId, OwnerId};
use thiserror::Error;

use crate::OrderStatus;

/// Errors that can occur when reading or writing the order ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No order with this id exists.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status change is not allowed from the current status.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An order with the same idempotency key already exists for this owner.
    #[error("Order with idempotency key {key} already exists for owner {owner_id}")]
    DuplicateIdempotencyKey {
        owner_id: OwnerId,
        key: IdempotencyKey,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The ledger backend could not be reached.
    #[error("Order ledger unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped back to the domain.
    #[error("Corrupt order row: {0}")]
    Corrupt(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
