//! Checkout orchestrator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use cart::CartStore;
use common::{IdempotencyKey, Money, OrderId, OwnerId};
use inventory::{Reservation, ReservationEngine, StockStore};
use ledger::{LedgerError, NewOrder, Order, OrderLedger, OrderLine, OrderStatus};
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::payment::{AuthorizationHandle, AuthorizationId, GatewayError, PaymentGateway};
use crate::{CheckoutConfig, CheckoutError, CheckoutRequest, Result, steps};

type KeyLocks = HashMap<(OwnerId, IdempotencyKey), Arc<Mutex<()>>>;

struct Services<S: StockStore, C, P, L> {
    reservations: ReservationEngine<S>,
    carts: C,
    payments: P,
    ledger: L,
    config: CheckoutConfig,
    /// One lock per idempotency key with a checkout in flight.
    in_flight: Mutex<KeyLocks>,
}

/// Turns a cart into a committed order.
///
/// A checkout runs these steps in order, and compensates the completed
/// ones when a later step fails:
/// 1. Reserve stock for every cart line (released on any later failure)
/// 2. Authorize the payment (voided if the order cannot be recorded)
/// 3. Record the order in the ledger
/// 4. Capture the payment and clear the cart; failures here are logged
///    and never undo the committed order
///
/// Each checkout runs on its own task, so dropping the caller's future
/// does not abandon a half-finished sequence.
pub struct CheckoutOrchestrator<S, C, P, L>
where
    S: StockStore,
    C: CartStore,
    P: PaymentGateway,
    L: OrderLedger,
{
    inner: Arc<Services<S, C, P, L>>,
}

impl<S, C, P, L> Clone for CheckoutOrchestrator<S, C, P, L>
where
    S: StockStore,
    C: CartStore,
    P: PaymentGateway,
    L: OrderLedger,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C, P, L> CheckoutOrchestrator<S, C, P, L>
where
    S: StockStore + 'static,
    C: CartStore + 'static,
    P: PaymentGateway + 'static,
    L: OrderLedger + 'static,
{
    /// Creates a new checkout orchestrator.
    pub fn new(stock: S, carts: C, payments: P, ledger: L, config: CheckoutConfig) -> Self {
        let reservations =
            ReservationEngine::new(stock).with_max_attempts(config.max_reservation_attempts);
        Self {
            inner: Arc::new(Services {
                reservations,
                carts,
                payments,
                ledger,
                config,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn reservations(&self) -> &ReservationEngine<S> {
        &self.inner.reservations
    }

    pub fn stock(&self) -> &S {
        self.inner.reservations.store()
    }

    pub fn carts(&self) -> &C {
        &self.inner.carts
    }

    pub fn payments(&self) -> &P {
        &self.inner.payments
    }

    pub fn ledger(&self) -> &L {
        &self.inner.ledger
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.inner.config
    }

    /// Checks out the owner's cart.
    ///
    /// Returns the committed order, or the existing order when the request
    /// repeats an idempotency key that already produced one.
    #[tracing::instrument(skip(self, request), fields(owner_id = %request.owner_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);

        let this = self.clone();
        let task = tokio::spawn(
            async move {
                let started = Instant::now();
                let result = this.run(request).await;
                record_outcome(&result, started);
                result
            }
            .instrument(tracing::Span::current()),
        );

        match task.await {
            Ok(result) => result,
            Err(e) => {
                metrics::counter!("checkout_failed", "reason" => CheckoutError::Interrupted.code())
                    .increment(1);
                tracing::error!(error = %e, "checkout task did not finish");
                Err(CheckoutError::Interrupted)
            }
        }
    }

    /// Captures the payment of a committed order.
    ///
    /// Used when capture failed right after the order was recorded. Capturing
    /// an already captured payment succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn capture_payment(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .inner
            .ledger
            .get_by_id(order_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to load order");
                CheckoutError::OrderPersistenceFailed
            })?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if order.status == OrderStatus::Cancelled {
            tracing::warn!(%order_id, "refusing to capture payment of a cancelled order");
            return Err(CheckoutError::OrderNotCapturable {
                order_id,
                status: order.status,
            });
        }

        let authorization = AuthorizationId::new(order.payment_reference.clone());
        let timeout = self.inner.config.payment_timeout;
        match tokio::time::timeout(timeout, self.inner.payments.capture(&authorization)).await {
            Ok(Ok(())) => {
                tracing::info!(%authorization, "payment captured");
                Ok(order)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, %authorization, "capture failed");
                Err(CheckoutError::PaymentFailed(describe_gateway_error(&e)))
            }
            Err(_) => {
                tracing::warn!(%authorization, "capture timed out");
                Err(CheckoutError::PaymentFailed(timeout_message(timeout)))
            }
        }
    }

    async fn run(&self, request: CheckoutRequest) -> Result<Order> {
        request.validate()?;

        let Some(key) = request.idempotency_key.clone() else {
            return self.place_order(&request).await;
        };

        let lock = self.key_lock(&request.owner_id, &key).await;
        let result = {
            let _guard = lock.lock().await;
            self.replay_or_place(&request, &key).await
        };
        drop(lock);
        self.forget_key_lock(&request.owner_id, &key).await;

        result
    }

    async fn replay_or_place(
        &self,
        request: &CheckoutRequest,
        key: &IdempotencyKey,
    ) -> Result<Order> {
        if let Some(order) = self.find_existing(&request.owner_id, key).await? {
            tracing::info!(order_id = %order.id, %key, "idempotency key already used, returning existing order");
            return Ok(order);
        }
        self.place_order(request).await
    }

    async fn place_order(&self, request: &CheckoutRequest) -> Result<Order> {
        request
            .shipping
            .validate()
            .map_err(|e| CheckoutError::InvalidShippingDetails(e.to_string()))?;

        // Step 1: load the cart
        tracing::info!(step = steps::STEP_LOAD_CART, "checkout step started");
        let cart = self
            .inner
            .carts
            .get(&request.owner_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, step = steps::STEP_LOAD_CART, "failed to load cart");
                CheckoutError::CartUnavailable
            })?;

        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Step 2: reserve stock; nothing to compensate if this fails
        tracing::info!(
            step = steps::STEP_RESERVE_INVENTORY,
            lines = cart.len(),
            "checkout step started"
        );
        let reservation = self.inner.reservations.reserve(&cart.lines()).await?;

        let total = reservation.total();
        let minimum = self.inner.payments.minimum_amount();
        if total < minimum {
            self.release(&reservation, steps::STEP_CHECK_AMOUNT)
                .await;
            return Err(CheckoutError::AmountTooLow { total, minimum });
        }

        // Step 3: authorize the payment
        tracing::info!(step = steps::STEP_AUTHORIZE_PAYMENT, %total, "checkout step started");
        let authorization = match self.authorize(total).await {
            Ok(handle) => handle,
            Err(reason) => {
                self.release(&reservation, steps::STEP_AUTHORIZE_PAYMENT)
                    .await;
                return Err(CheckoutError::PaymentFailed(reason));
            }
        };

        // Step 4: record the order with the prices captured at reservation
        tracing::info!(step = steps::STEP_PERSIST_ORDER, "checkout step started");
        let new_order = NewOrder {
            owner_id: request.owner_id.clone(),
            shipping: request.shipping.clone(),
            payment_method: request.payment_method.clone(),
            payment_reference: authorization.id.to_string(),
            total,
            lines: order_lines(&reservation),
            idempotency_key: request.idempotency_key.clone(),
        };

        let order = match self.inner.ledger.create(new_order).await {
            Ok(order) => order,
            Err(LedgerError::DuplicateIdempotencyKey { owner_id, key }) => {
                tracing::warn!(%key, "another checkout committed this idempotency key first");
                self.void(&authorization).await;
                self.release(&reservation, steps::STEP_PERSIST_ORDER).await;
                return self
                    .find_existing(&owner_id, &key)
                    .await?
                    .ok_or(CheckoutError::OrderPersistenceFailed);
            }
            Err(e) => {
                tracing::error!(error = %e, step = steps::STEP_PERSIST_ORDER, "failed to record order");
                self.void(&authorization).await;
                self.release(&reservation, steps::STEP_PERSIST_ORDER).await;
                return Err(CheckoutError::OrderPersistenceFailed);
            }
        };

        // Step 5: settle the payment; the order stands either way
        self.capture_after_commit(&order, &authorization).await;

        // Step 6: empty the cart
        if let Err(e) = self.inner.carts.clear(&request.owner_id).await {
            tracing::warn!(
                error = %e,
                step = steps::STEP_CLEAR_CART,
                order_id = %order.id,
                "failed to clear cart after checkout"
            );
        }

        Ok(order)
    }

    async fn authorize(&self, total: Money) -> std::result::Result<AuthorizationHandle, String> {
        let config = &self.inner.config;
        let authorize = self.inner.payments.authorize(total, &config.currency);

        match tokio::time::timeout(config.payment_timeout, authorize).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, step = steps::STEP_AUTHORIZE_PAYMENT, "authorization failed");
                Err(describe_gateway_error(&e))
            }
            Err(_) => {
                tracing::warn!(step = steps::STEP_AUTHORIZE_PAYMENT, "authorization timed out");
                Err(timeout_message(config.payment_timeout))
            }
        }
    }

    async fn capture_after_commit(&self, order: &Order, authorization: &AuthorizationHandle) {
        let timeout = self.inner.config.payment_timeout;
        let outcome =
            tokio::time::timeout(timeout, self.inner.payments.capture(&authorization.id)).await;

        let failure = match outcome {
            Ok(Ok(())) => {
                tracing::info!(step = steps::STEP_CAPTURE_PAYMENT, order_id = %order.id, "payment captured");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => timeout_message(timeout),
        };

        metrics::counter!("checkout_capture_deferred_total").increment(1);
        tracing::warn!(
            step = steps::STEP_CAPTURE_PAYMENT,
            order_id = %order.id,
            authorization = %authorization.id,
            error = %failure,
            "capture failed, authorization left in place for a later capture"
        );
    }

    async fn release(&self, reservation: &Reservation, step: &'static str) {
        metrics::counter!("checkout_compensations_total", "step" => step).increment(1);

        match self
            .inner
            .reservations
            .release(&reservation.to_cart_lines())
            .await
        {
            Ok(()) => tracing::info!(step, "reserved stock released"),
            Err(e) => tracing::error!(error = %e, step, "failed to release reserved stock"),
        }
    }

    async fn void(&self, authorization: &AuthorizationHandle) {
        let timeout = self.inner.config.payment_timeout;
        match tokio::time::timeout(timeout, self.inner.payments.void(&authorization.id)).await {
            Ok(Ok(())) => tracing::info!(authorization = %authorization.id, "authorization voided"),
            Ok(Err(e)) => {
                tracing::error!(error = %e, authorization = %authorization.id, "failed to void authorization")
            }
            Err(_) => {
                tracing::error!(authorization = %authorization.id, "timed out voiding authorization")
            }
        }
    }

    async fn find_existing(&self, owner_id: &OwnerId, key: &IdempotencyKey) -> Result<Option<Order>> {
        self.inner
            .ledger
            .find_by_idempotency_key(owner_id, key)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to look up idempotency key");
                CheckoutError::OrderPersistenceFailed
            })
    }

    async fn key_lock(&self, owner_id: &OwnerId, key: &IdempotencyKey) -> Arc<Mutex<()>> {
        let mut in_flight = self.inner.in_flight.lock().await;
        Arc::clone(
            in_flight
                .entry((owner_id.clone(), key.clone()))
                .or_default(),
        )
    }

    async fn forget_key_lock(&self, owner_id: &OwnerId, key: &IdempotencyKey) {
        let mut in_flight = self.inner.in_flight.lock().await;
        let entry = (owner_id.clone(), key.clone());
        if in_flight
            .get(&entry)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            in_flight.remove(&entry);
        }
    }
}

fn order_lines(reservation: &Reservation) -> Vec<OrderLine> {
    reservation
        .lines()
        .iter()
        .map(|line| OrderLine {
            item_id: line.item_id,
            size_id: line.size_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
        .collect()
}

fn record_outcome(result: &Result<Order>, started: Instant) {
    let duration = started.elapsed().as_secs_f64();
    metrics::histogram!("checkout_duration_seconds").record(duration);

    match result {
        Ok(order) => {
            metrics::counter!("checkout_completed").increment(1);
            tracing::info!(order_id = %order.id, total = %order.total, duration, "checkout completed");
        }
        Err(e) => {
            metrics::counter!("checkout_failed", "reason" => e.code()).increment(1);
            tracing::warn!(error = %e, duration, "checkout failed");
        }
    }
}

/// Caller-facing reason for a gateway failure.
fn describe_gateway_error(err: &GatewayError) -> String {
    match err {
        GatewayError::Declined(reason) => reason.clone(),
        GatewayError::Unavailable(_) => "payment processor unavailable".to_string(),
        GatewayError::UnknownAuthorization(_) => "payment authorization not found".to_string(),
    }
}

fn timeout_message(timeout: std::time::Duration) -> String {
    format!("payment processor did not answer within {}ms", timeout.as_millis())
}

#[cfg(test)]
mod tests {
    use cart::InMemoryCartStore;
    use common::{Money, StockKey};
    use inventory::{CatalogItem, CategoryId, InMemoryStockStore};
    use ledger::{InMemoryOrderLedger, ShippingDetails};

    use super::*;
    use crate::InMemoryPaymentGateway;

    async fn setup() -> CheckoutOrchestrator<
        InMemoryStockStore,
        InMemoryCartStore,
        InMemoryPaymentGateway,
        InMemoryOrderLedger,
    > {
        let stock = InMemoryStockStore::new();
        stock
            .put_item(CatalogItem::new(
                1,
                "Linen Shirt",
                Money::from_cents(6000),
                CategoryId::new(1),
            ))
            .await;
        stock.set_stock(StockKey::new(1, 2), 5).await;

        CheckoutOrchestrator::new(
            stock,
            InMemoryCartStore::new(),
            InMemoryPaymentGateway::new(),
            InMemoryOrderLedger::new(),
            CheckoutConfig::default(),
        )
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest::new(
            "alice",
            ShippingDetails {
                full_name: "Ana Souza".to_string(),
                address_line1: "Rua Augusta 100".to_string(),
                address_line2: None,
                city: "Lisboa".to_string(),
                state: "Lisboa".to_string(),
                postal_code: "1100-053".to_string(),
                country: "Portugal".to_string(),
                phone_number: "912 345 678".to_string(),
            },
            "card",
        )
    }

    #[tokio::test]
    async fn test_key_locks_are_dropped_after_checkout() {
        let orchestrator = setup().await;
        orchestrator
            .carts()
            .add_line(&OwnerId::new("alice"), StockKey::new(1, 2), 1)
            .await
            .unwrap();

        orchestrator
            .checkout(request().with_idempotency_key("k-1"))
            .await
            .unwrap();

        assert!(orchestrator.inner.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_checkout_can_be_retried_with_same_key() {
        let orchestrator = setup().await;
        orchestrator
            .carts()
            .add_line(&OwnerId::new("alice"), StockKey::new(1, 2), 1)
            .await
            .unwrap();
        orchestrator.payments().set_fail_on_authorize(true).await;

        let err = orchestrator
            .checkout(request().with_idempotency_key("k-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::PaymentFailed(_)));

        orchestrator.payments().set_fail_on_authorize(false).await;
        let order = orchestrator
            .checkout(request().with_idempotency_key("k-2"))
            .await
            .unwrap();
        assert_eq!(order.total, Money::from_cents(6000));
        assert_eq!(orchestrator.stock().quantity(StockKey::new(1, 2)).await, Some(4));
    }

    #[test]
    fn test_gateway_errors_are_described_without_internals() {
        assert_eq!(
            describe_gateway_error(&GatewayError::Declined("card declined".to_string())),
            "card declined"
        );
        assert_eq!(
            describe_gateway_error(&GatewayError::Unavailable("tcp reset on 10.0.0.7".to_string())),
            "payment processor unavailable"
        );
    }
}
