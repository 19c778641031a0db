//! Shared application state.

use cart::InMemoryCartStore;
use checkout::{CheckoutOrchestrator, InMemoryPaymentGateway};
use inventory::StockStore;
use ledger::OrderLedger;

/// Orchestrator wired with the in-process cart store and payment gateway.
pub type Orchestrator<S, L> = CheckoutOrchestrator<S, InMemoryCartStore, InMemoryPaymentGateway, L>;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    pub checkout: Orchestrator<S, L>,
}

impl<S, L> AppState<S, L>
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    pub fn new(checkout: Orchestrator<S, L>) -> Self {
        Self { checkout }
    }

    pub fn stock(&self) -> &S {
        self.checkout.stock()
    }

    pub fn carts(&self) -> &InMemoryCartStore {
        self.checkout.carts()
    }

    pub fn ledger(&self) -> &L {
        self.checkout.ledger()
    }
}
