//! Inventory for the checkout system.
//!
//! This crate owns the per-size stock rows and is the only place that
//! mutates them during checkout:
//! - [`StockStore`]: catalog lookups plus compare-and-decrement / add-back
//! - [`InMemoryStockStore`] and [`PostgresStockStore`] implementations
//! - [`ReservationEngine`]: validates a set of cart lines and reserves them
//!   all-or-nothing, retrying on version conflicts

pub mod error;
pub mod memory;
pub mod postgres;
pub mod reservation;
pub mod stock;
pub mod store;

pub use error::{ReservationError, Result, StoreError};
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use reservation::{DEFAULT_MAX_ATTEMPTS, Reservation, ReservationEngine, ReservedLine};
pub use stock::{CatalogItem, CategoryId, SizeStock, StockVersion};
pub use store::StockStore;
