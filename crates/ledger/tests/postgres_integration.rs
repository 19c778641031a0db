//! PostgreSQL integration tests for the order ledger
//!
//! These tests use a shared PostgreSQL container and need Docker.
//! Run with:
//!
//! ```bash
//! cargo test -p ledger --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use common::{IdempotencyKey, ItemId, Money, OrderId, OwnerId, SizeId};
use ledger::{
    LedgerError, NewOrder, OrderLedger, OrderLine, OrderStatus, PostgresOrderLedger,
    ShippingDetails,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    _container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderLedger::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                _container: container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_ledger() -> PostgresOrderLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders, shipping_details CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PostgresOrderLedger::new(pool)
}

fn new_order(owner: &str, key: Option<&str>) -> NewOrder {
    NewOrder {
        owner_id: OwnerId::new(owner),
        shipping: ShippingDetails {
            full_name: "Ana Souza".to_string(),
            address_line1: "Rua Augusta 100".to_string(),
            address_line2: Some("3 Esq".to_string()),
            city: "Lisboa".to_string(),
            state: "Lisboa".to_string(),
            postal_code: "1100-053".to_string(),
            country: "Portugal".to_string(),
            phone_number: "+351 912 345 678".to_string(),
        },
        payment_method: "card".to_string(),
        payment_reference: "auth_0001".to_string(),
        total: Money::from_cents(13999),
        lines: vec![
            OrderLine {
                item_id: ItemId::new(1),
                size_id: SizeId::new(2),
                quantity: 2,
                unit_price: Money::from_cents(6000),
            },
            OrderLine {
                item_id: ItemId::new(4),
                size_id: SizeId::new(1),
                quantity: 1,
                unit_price: Money::from_cents(1999),
            },
        ],
        idempotency_key: key.map(IdempotencyKey::from),
    }
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn create_and_load_order_with_lines() {
    let ledger = get_test_ledger().await;

    let created = ledger.create(new_order("alice", None)).await.unwrap();
    assert_eq!(created.status, OrderStatus::Pending);

    let loaded = ledger.get_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(loaded.owner_id, OwnerId::new("alice"));
    assert_eq!(loaded.total, Money::from_cents(13999));
    assert_eq!(loaded.lines, created.lines);
    assert_eq!(loaded.shipping.address_line2.as_deref(), Some("3 Esq"));

    assert!(ledger.get_by_id(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn duplicate_idempotency_key_is_rejected_atomically() {
    let ledger = get_test_ledger().await;

    let first = ledger
        .create(new_order("alice", Some("retry-1")))
        .await
        .unwrap();
    let err = ledger
        .create(new_order("alice", Some("retry-1")))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::DuplicateIdempotencyKey { .. }));

    let found = ledger
        .find_by_idempotency_key(&OwnerId::new("alice"), &IdempotencyKey::new("retry-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);

    let shipping_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shipping_details")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(shipping_rows, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn status_transitions_are_enforced() {
    let ledger = get_test_ledger().await;
    let order = ledger.create(new_order("alice", None)).await.unwrap();

    ledger
        .update_status(order.id, OrderStatus::Processing)
        .await
        .unwrap();
    ledger
        .update_status(order.id, OrderStatus::Shipped)
        .await
        .unwrap();

    let err = ledger
        .update_status(order.id, OrderStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InvalidStatusTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Pending
        }
    ));

    let loaded = ledger.get_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Shipped);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn list_for_user_is_newest_first() {
    let ledger = get_test_ledger().await;

    let first = ledger.create(new_order("alice", None)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = ledger.create(new_order("alice", None)).await.unwrap();
    ledger.create(new_order("bob", None)).await.unwrap();

    let orders = ledger.list_for_user(&OwnerId::new("alice")).await.unwrap();
    let ids: Vec<OrderId> = orders.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
    assert_eq!(orders[0].lines.len(), 2);
}
