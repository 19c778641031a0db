use std::time::Duration;

use inventory::DEFAULT_MAX_ATTEMPTS;

/// Tunables of the checkout orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConfig {
    /// Reservation passes before a version conflict is surfaced.
    pub max_reservation_attempts: u32,
    /// Upper bound on each payment gateway call.
    pub payment_timeout: Duration,
    /// ISO currency code sent to the payment gateway.
    pub currency: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            max_reservation_attempts: DEFAULT_MAX_ATTEMPTS,
            payment_timeout: Duration::from_secs(10),
            currency: "eur".to_string(),
        }
    }
}
