//! Order ledger for the checkout system.
//!
//! Orders are written once by a successful checkout and afterwards only
//! move through the status machine in [`OrderStatus`]. They are never
//! deleted.

pub mod error;
pub mod memory;
pub mod order;
pub mod postgres;
pub mod shipping;
pub mod status;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryOrderLedger;
pub use order::{NewOrder, Order, OrderLine};
pub use postgres::PostgresOrderLedger;
pub use shipping::{ShippingDetails, ShippingValidationError};
pub use status::{OrderStatus, UnknownOrderStatus};
pub use store::OrderLedger;
