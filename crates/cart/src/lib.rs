//! Shopping carts for the checkout system.
//!
//! A cart belongs to exactly one owner and is passed explicitly through
//! every call; there is no ambient session state.

pub mod cart;
pub mod error;
pub mod memory;
pub mod store;

pub use cart::Cart;
pub use error::{CartError, Result};
pub use memory::InMemoryCartStore;
pub use store::CartStore;
