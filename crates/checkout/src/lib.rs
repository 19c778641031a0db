//! Checkout for the shop.
//!
//! The [`CheckoutOrchestrator`] sequences one checkout as a single logical
//! unit of work:
//! 1. Reserve stock for the cart (all lines or none)
//! 2. Authorize the payment
//! 3. Record the order
//! 4. Capture the payment and clear the cart
//!
//! If a step after the reservation fails, the stock is released and any
//! authorization is voided before the error is returned.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod payment;
pub mod request;
pub mod steps;

pub use config::CheckoutConfig;
pub use error::{CheckoutError, Result};
pub use orchestrator::CheckoutOrchestrator;
pub use payment::{
    AuthorizationHandle, AuthorizationId, AuthorizationState, GatewayError,
    InMemoryPaymentGateway, PaymentGateway,
};
pub use request::CheckoutRequest;
