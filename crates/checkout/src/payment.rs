//! Payment gateway trait and in-memory implementation.
//!
//! The gateway only ever places a hold on funds during checkout. Settlement
//! (`capture`) happens after the order is durably recorded, and a hold that
//! is no longer needed is released with `void`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Minimum chargeable amount of the in-memory gateway, in cents.
pub const DEFAULT_MINIMUM_CENTS: i64 = 50;

/// Identifier of a payment authorization, stored on the order as its payment reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorizationId(String);

impl AuthorizationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AuthorizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationHandle {
    pub id: AuthorizationId,
    /// Opaque token the client uses to confirm the payment with the processor.
    pub client_secret: String,
}

/// Errors reported by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The processor refused the request.
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The processor could not be reached.
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The authorization id is not known to the processor.
    #[error("Unknown authorization: {0}")]
    UnknownAuthorization(String),
}

/// Trait for payment processor operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Places a hold for `amount` in `currency`.
    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
    ) -> Result<AuthorizationHandle, GatewayError>;

    /// Settles a held authorization. Capturing an already captured
    /// authorization succeeds without effect.
    async fn capture(&self, authorization: &AuthorizationId) -> Result<(), GatewayError>;

    /// Releases a held authorization. Voiding an already voided
    /// authorization succeeds without effect.
    async fn void(&self, authorization: &AuthorizationId) -> Result<(), GatewayError>;

    /// Smallest amount the processor accepts.
    fn minimum_amount(&self) -> Money;
}

/// Lifecycle of an authorization held by [`InMemoryPaymentGateway`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationState {
    Authorized,
    Captured,
    Voided,
}

#[derive(Debug, Clone)]
struct AuthorizationRecord {
    amount: Money,
    currency: String,
    state: AuthorizationState,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    authorizations: HashMap<AuthorizationId, AuthorizationRecord>,
    next_id: u32,
    latency: Option<Duration>,
    fail_on_authorize: bool,
    fail_on_capture: bool,
    fail_on_void: bool,
}

/// In-memory payment gateway for tests and the demo server.
#[derive(Debug, Clone)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
    minimum: Money,
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self {
            state: Arc::default(),
            minimum: Money::from_cents(DEFAULT_MINIMUM_CENTS),
        }
    }
}

impl InMemoryPaymentGateway {
    /// Creates a gateway with the default minimum amount.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the minimum chargeable amount.
    pub fn with_minimum(mut self, minimum: Money) -> Self {
        self.minimum = minimum;
        self
    }

    /// Delays every `authorize` call, simulating a slow processor.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().await.latency = latency;
    }

    /// Configures `authorize` to decline.
    pub async fn set_fail_on_authorize(&self, fail: bool) {
        self.state.write().await.fail_on_authorize = fail;
    }

    /// Configures `capture` to fail as if the processor were unreachable.
    pub async fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().await.fail_on_capture = fail;
    }

    /// Configures `void` to fail as if the processor were unreachable.
    pub async fn set_fail_on_void(&self, fail: bool) {
        self.state.write().await.fail_on_void = fail;
    }

    /// Returns the state of an authorization, if it exists.
    pub async fn authorization_state(&self, id: &AuthorizationId) -> Option<AuthorizationState> {
        self.state
            .read()
            .await
            .authorizations
            .get(id)
            .map(|record| record.state)
    }

    /// Returns the held amount and currency of an authorization.
    pub async fn authorized_amount(&self, id: &AuthorizationId) -> Option<(Money, String)> {
        self.state
            .read()
            .await
            .authorizations
            .get(id)
            .map(|record| (record.amount, record.currency.clone()))
    }

    /// Returns the number of authorizations ever created.
    pub async fn authorization_count(&self) -> usize {
        self.state.read().await.authorizations.len()
    }

    /// Returns the number of authorizations currently in `state`.
    pub async fn count_in_state(&self, state: AuthorizationState) -> usize {
        self.state
            .read()
            .await
            .authorizations
            .values()
            .filter(|record| record.state == state)
            .count()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
    ) -> Result<AuthorizationHandle, GatewayError> {
        let latency = self.state.read().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.write().await;

        if state.fail_on_authorize {
            return Err(GatewayError::Declined("card declined".to_string()));
        }

        if amount < self.minimum {
            return Err(GatewayError::Declined(format!(
                "amount {amount} is below the minimum of {}",
                self.minimum
            )));
        }

        state.next_id += 1;
        let id = AuthorizationId::new(format!("auth_{:04}", state.next_id));
        let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());
        state.authorizations.insert(
            id.clone(),
            AuthorizationRecord {
                amount,
                currency: currency.to_string(),
                state: AuthorizationState::Authorized,
            },
        );

        Ok(AuthorizationHandle { id, client_secret })
    }

    async fn capture(&self, authorization: &AuthorizationId) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;

        if state.fail_on_capture {
            return Err(GatewayError::Unavailable("capture timed out".to_string()));
        }

        let record = state
            .authorizations
            .get_mut(authorization)
            .ok_or_else(|| GatewayError::UnknownAuthorization(authorization.to_string()))?;

        match record.state {
            AuthorizationState::Authorized => {
                record.state = AuthorizationState::Captured;
                Ok(())
            }
            AuthorizationState::Captured => Ok(()),
            AuthorizationState::Voided => Err(GatewayError::Declined(format!(
                "authorization {authorization} was voided"
            ))),
        }
    }

    async fn void(&self, authorization: &AuthorizationId) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;

        if state.fail_on_void {
            return Err(GatewayError::Unavailable("void timed out".to_string()));
        }

        let record = state
            .authorizations
            .get_mut(authorization)
            .ok_or_else(|| GatewayError::UnknownAuthorization(authorization.to_string()))?;

        match record.state {
            AuthorizationState::Authorized => {
                record.state = AuthorizationState::Voided;
                Ok(())
            }
            AuthorizationState::Voided => Ok(()),
            AuthorizationState::Captured => Err(GatewayError::Declined(format!(
                "authorization {authorization} was already captured"
            ))),
        }
    }

    fn minimum_amount(&self) -> Money {
        self.minimum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_authorize_capture() {
        let gateway = InMemoryPaymentGateway::new();
        let handle = gateway
            .authorize(Money::from_cents(12000), "eur")
            .await
            .unwrap();

        assert_eq!(handle.id.as_str(), "auth_0001");
        assert!(handle.client_secret.starts_with("auth_0001_secret_"));
        assert_eq!(
            gateway.authorized_amount(&handle.id).await,
            Some((Money::from_cents(12000), "eur".to_string()))
        );

        gateway.capture(&handle.id).await.unwrap();
        gateway.capture(&handle.id).await.unwrap();
        assert_eq!(
            gateway.authorization_state(&handle.id).await,
            Some(AuthorizationState::Captured)
        );

        assert!(matches!(
            gateway.void(&handle.id).await,
            Err(GatewayError::Declined(_))
        ));
    }

    #[tokio::test]
    async fn test_void_is_idempotent_and_blocks_capture() {
        let gateway = InMemoryPaymentGateway::new();
        let handle = gateway.authorize(Money::from_cents(500), "eur").await.unwrap();

        gateway.void(&handle.id).await.unwrap();
        gateway.void(&handle.id).await.unwrap();
        assert_eq!(gateway.count_in_state(AuthorizationState::Voided).await, 1);

        assert!(matches!(
            gateway.capture(&handle.id).await,
            Err(GatewayError::Declined(_))
        ));
    }

    #[tokio::test]
    async fn test_minimum_amount() {
        let gateway = InMemoryPaymentGateway::new();
        assert_eq!(gateway.minimum_amount(), Money::from_cents(50));

        let result = gateway.authorize(Money::from_cents(30), "eur").await;
        assert!(matches!(result, Err(GatewayError::Declined(_))));
        assert_eq!(gateway.authorization_count().await, 0);

        let gateway = InMemoryPaymentGateway::new().with_minimum(Money::from_cents(100));
        assert!(gateway.authorize(Money::from_cents(99), "eur").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_authorization() {
        let gateway = InMemoryPaymentGateway::new();
        let id = AuthorizationId::new("auth_9999");

        assert!(matches!(
            gateway.capture(&id).await,
            Err(GatewayError::UnknownAuthorization(_))
        ));
        assert!(matches!(
            gateway.void(&id).await,
            Err(GatewayError::UnknownAuthorization(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_authorize(true).await;
        assert!(gateway.authorize(Money::from_cents(1000), "eur").await.is_err());

        gateway.set_fail_on_authorize(false).await;
        let handle = gateway.authorize(Money::from_cents(1000), "eur").await.unwrap();

        gateway.set_fail_on_capture(true).await;
        assert!(matches!(
            gateway.capture(&handle.id).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert_eq!(
            gateway.authorization_state(&handle.id).await,
            Some(AuthorizationState::Authorized)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_latency(Some(Duration::from_secs(5))).await;

        let started = tokio::time::Instant::now();
        gateway.authorize(Money::from_cents(1000), "eur").await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
