use common::{ItemId, SizeId};
use thiserror::Error;

/// Errors raised by a stock store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The backend could not be reached.
    #[error("Stock store unavailable: {0}")]
    Unavailable(String),

    /// A stored value is outside the range the domain allows.
    #[error("Corrupt stock row: {0}")]
    Corrupt(String),
}

/// Errors that can occur while reserving or releasing stock.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// Nothing to reserve.
    #[error("Reservation requires at least one line")]
    EmptyReservation,

    /// A line asked for zero units.
    #[error("Invalid quantity for item {item_id} size {size_id}: must be at least 1")]
    InvalidQuantity { item_id: ItemId, size_id: SizeId },

    /// The item or its size no longer exists in the catalog.
    #[error("Item {item_id} in size {size_id} is no longer available")]
    LineUnavailable { item_id: ItemId, size_id: SizeId },

    /// Fewer units on hand than requested.
    #[error(
        "Insufficient stock for item {item_id} size {size_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        item_id: ItemId,
        size_id: SizeId,
        requested: u32,
        available: u32,
    },

    /// Competing writers kept changing the rows until the retry bound ran out.
    #[error("Stock was modified concurrently; gave up after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    /// The backing store failed.
    #[error("Stock store error: {0}")]
    Store(#[from] StoreError),
}

impl ReservationError {
    /// Returns true when retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReservationError::ConcurrentModification { .. } | ReservationError::Store(_)
        )
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
