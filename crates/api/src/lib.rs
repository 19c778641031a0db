//! HTTP API server for carts, checkout and orders.
//!
//! Wires the checkout orchestrator to axum routes, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use cart::InMemoryCartStore;
use checkout::{CheckoutConfig, CheckoutOrchestrator, InMemoryPaymentGateway};
use common::{Money, StockKey};
use inventory::{CatalogItem, CategoryId, InMemoryStockStore, PostgresStockStore, StockStore};
use ledger::{InMemoryOrderLedger, OrderLedger, PostgresOrderLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L>(state: Arc<AppState<S, L>>, metrics_handle: PrometheusHandle) -> Router
where
    S: StockStore + 'static,
    L: OrderLedger + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/carts/{owner}", get(routes::carts::get::<S, L>))
        .route(
            "/carts/{owner}/lines",
            post(routes::carts::add_line::<S, L>).put(routes::carts::update_line::<S, L>),
        )
        .route(
            "/carts/{owner}/lines/{item}/{size}",
            delete(routes::carts::remove_line::<S, L>),
        )
        .route("/checkout", post(routes::checkout::place_order::<S, L>))
        .route("/orders/{id}", get(routes::orders::get::<S, L>))
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<S, L>),
        )
        .route("/orders/{id}/capture", post(routes::orders::capture::<S, L>))
        .route(
            "/owners/{owner}/orders",
            get(routes::orders::list_for_owner::<S, L>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates in-memory application state seeded with the demo catalog.
pub async fn create_default_state(
    config: CheckoutConfig,
) -> Arc<AppState<InMemoryStockStore, InMemoryOrderLedger>> {
    let stock = InMemoryStockStore::new();
    seed_demo_catalog(&stock).await;

    let checkout = CheckoutOrchestrator::new(
        stock,
        InMemoryCartStore::new(),
        InMemoryPaymentGateway::new(),
        InMemoryOrderLedger::new(),
        config,
    );

    Arc::new(AppState::new(checkout))
}

/// Creates application state backed by PostgreSQL, running migrations first.
///
/// Carts and payment authorizations stay in process.
pub async fn create_postgres_state(
    pool: PgPool,
    config: CheckoutConfig,
) -> ledger::Result<Arc<AppState<PostgresStockStore, PostgresOrderLedger>>> {
    let ledger = PostgresOrderLedger::new(pool.clone());
    ledger.run_migrations().await?;

    let checkout = CheckoutOrchestrator::new(
        PostgresStockStore::new(pool),
        InMemoryCartStore::new(),
        InMemoryPaymentGateway::new(),
        ledger,
        config,
    );

    Ok(Arc::new(AppState::new(checkout)))
}

/// Demo catalog: (item, name, price in cents, [(size, quantity)]).
const DEMO_CATALOG: &[(i64, &str, i64, &[(i64, u32)])] = &[
    (1, "Linen Shirt", 6000, &[(1, 10), (2, 5), (3, 0)]),
    (2, "Canvas Tote", 1999, &[(1, 25)]),
    (3, "Spare Button", 30, &[(1, 100)]),
];

/// Loads the demo catalog into an in-memory stock store.
pub async fn seed_demo_catalog(stock: &InMemoryStockStore) {
    for &(item_id, name, price_cents, sizes) in DEMO_CATALOG {
        stock
            .put_item(CatalogItem::new(
                item_id,
                name,
                Money::from_cents(price_cents),
                CategoryId::new(1),
            ))
            .await;

        for &(size_id, quantity) in sizes {
            stock
                .set_stock(StockKey::new(item_id, size_id), quantity)
                .await;
        }
    }
}
