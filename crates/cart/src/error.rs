use common::{ItemId, SizeId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be at least one.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// The cart has no line for this item and size.
    #[error("Cart has no line for item {item_id} size {size_id}")]
    LineNotFound { item_id: ItemId, size_id: SizeId },

    /// The cart backend could not be reached.
    #[error("Cart store unavailable: {0}")]
    Unavailable(String),
}

impl CartError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CartError::Unavailable(_))
    }
}

/// Convenience type alias for cart results.
pub type Result<T> = std::result::Result<T, CartError>;
