use common::{IdempotencyKey, OwnerId};
use ledger::ShippingDetails;
use serde::{Deserialize, Serialize};

use crate::{CheckoutError, Result};

/// Longest accepted owner id, in characters.
pub const MAX_OWNER_ID_LEN: usize = 255;

/// Longest accepted payment method name, in characters.
pub const MAX_PAYMENT_METHOD_LEN: usize = 100;

/// Longest accepted idempotency key, in characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Input to a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub owner_id: OwnerId,
    pub shipping: ShippingDetails,
    pub payment_method: String,
    /// Retries carrying the same key return the order of the first success.
    #[serde(default)]
    pub idempotency_key: Option<IdempotencyKey>,
}

impl CheckoutRequest {
    pub fn new(
        owner_id: impl Into<OwnerId>,
        shipping: ShippingDetails,
        payment_method: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            shipping,
            payment_method: payment_method.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<IdempotencyKey>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Checks the fields the order record stores verbatim.
    ///
    /// Shipping details are validated separately.
    pub fn validate(&self) -> Result<()> {
        check_field("owner_id", self.owner_id.as_str(), MAX_OWNER_ID_LEN)?;
        check_field("payment_method", &self.payment_method, MAX_PAYMENT_METHOD_LEN)?;
        if let Some(key) = &self.idempotency_key {
            check_field("idempotency_key", key.as_str(), MAX_IDEMPOTENCY_KEY_LEN)?;
        }
        Ok(())
    }
}

fn check_field(field: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CheckoutError::InvalidRequest(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(CheckoutError::InvalidRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}
