//! Integration tests for the API server.

use std::sync::Arc;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::CheckoutConfig;
use inventory::InMemoryStockStore;
use ledger::InMemoryOrderLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

type State = Arc<api::AppState<InMemoryStockStore, InMemoryOrderLedger>>;

async fn setup() -> (axum::Router, State) {
    let state = api::create_default_state(CheckoutConfig::default()).await;
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn shipping() -> Value {
    json!({
        "full_name": "Ana Souza",
        "address_line1": "Rua Augusta 100",
        "city": "Lisboa",
        "state": "Lisboa",
        "postal_code": "1100-053",
        "country": "Portugal",
        "phone_number": "+351 912 345 678"
    })
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn add_line(app: &axum::Router, owner: &str, item: i64, size: i64, qty: u32) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            &format!("/carts/{owner}/lines"),
            json!({ "item_id": item, "size_id": size, "quantity": qty }),
        ),
    )
    .await
}

async fn checkout(app: &axum::Router, owner: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/checkout",
            json!({ "owner_id": owner, "shipping": shipping(), "payment_method": "card" }),
        ),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, empty_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "api");
}

#[tokio::test]
async fn test_metrics_after_checkout() {
    let (app, _) = setup().await;
    add_line(&app, "metrics-owner", 2, 1, 1).await;
    let (status, _) = checkout(&app, "metrics-owner").await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("checkout_attempts_total"));
    assert!(text.contains("checkout_completed"));
}

#[tokio::test]
async fn test_cart_add_update_and_remove() {
    let (app, _) = setup().await;

    let (status, json) = add_line(&app, "alice", 1, 1, 2).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["owner_id"], "alice");
    assert_eq!(json["lines"][0]["quantity"], 2);

    let (_, json) = add_line(&app, "alice", 1, 1, 3).await;
    assert_eq!(json["lines"].as_array().unwrap().len(), 1);
    assert_eq!(json["lines"][0]["quantity"], 5);

    let (status, json) = send(
        &app,
        json_request(
            "PUT",
            "/carts/alice/lines",
            json!({ "item_id": 1, "size_id": 1, "quantity": 4 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quantity"], 4);

    let (status, json) = send(&app, empty_request("DELETE", "/carts/alice/lines/1/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["lines"].as_array().unwrap().is_empty());

    let (status, json) = send(&app, empty_request("GET", "/carts/alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_quantity"], 0);
}

#[tokio::test]
async fn test_cart_rejects_unknown_line() {
    let (app, _) = setup().await;

    let (status, json) = add_line(&app, "alice", 99, 1, 1).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "LINE_UNAVAILABLE");
    assert_eq!(json["item_id"], 99);
    assert_eq!(json["size_id"], 1);
}

#[tokio::test]
async fn test_cart_checks_resulting_quantity_against_stock() {
    let (app, _) = setup().await;

    let (status, _) = add_line(&app, "alice", 1, 2, 4).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = add_line(&app, "alice", 1, 2, 2).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INSUFFICIENT_STOCK");
    assert_eq!(json["requested"], 6);
    assert_eq!(json["available"], 5);
    assert_eq!(json["retryable"], false);

    let (status, json) = add_line(&app, "alice", 1, 3, 1).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["available"], 0);
}

#[tokio::test]
async fn test_cart_rejects_zero_quantity() {
    let (app, _) = setup().await;

    let (status, json) = add_line(&app, "alice", 1, 1, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_QUANTITY");

    add_line(&app, "alice", 1, 1, 1).await;
    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            "/carts/alice/lines",
            json!({ "item_id": 1, "size_id": 1, "quantity": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_of_missing_line_is_not_found() {
    let (app, _) = setup().await;

    let (status, json) = send(
        &app,
        json_request(
            "PUT",
            "/carts/alice/lines",
            json!({ "item_id": 2, "size_id": 1, "quantity": 1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "LINE_NOT_FOUND");
}

#[tokio::test]
async fn test_checkout_creates_order() {
    let (app, state) = setup().await;
    add_line(&app, "bob", 1, 1, 2).await;
    add_line(&app, "bob", 2, 1, 1).await;

    let (status, json) = checkout(&app, "bob").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["status"], "Pending");
    assert_eq!(json["total_cents"], 13999);

    let order_id = json["order_id"].as_str().unwrap().to_string();
    let (status, order) = send(&app, empty_request("GET", &format!("/orders/{order_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["owner_id"], "bob");
    assert_eq!(order["lines"].as_array().unwrap().len(), 2);
    assert_eq!(order["lines"][0]["unit_price_cents"], 6000);
    assert_eq!(order["lines"][0]["line_total_cents"], 12000);
    assert_eq!(order["shipping"]["city"], "Lisboa");

    let (status, orders) = send(&app, empty_request("GET", "/owners/bob/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["id"], order_id.as_str());

    // Stock committed, cart cleared
    assert_eq!(
        state.stock().quantity(common::StockKey::new(1, 1)).await,
        Some(8)
    );
    let (_, cart) = send(&app, empty_request("GET", "/carts/bob")).await;
    assert_eq!(cart["total_quantity"], 0);
}

#[tokio::test]
async fn test_checkout_with_empty_cart_is_rejected() {
    let (app, _) = setup().await;

    let (status, json) = checkout(&app, "nobody").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "EMPTY_CART");
}

#[tokio::test]
async fn test_checkout_below_minimum_amount_is_rejected() {
    let (app, state) = setup().await;
    add_line(&app, "carol", 3, 1, 1).await;

    let (status, json) = checkout(&app, "carol").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "AMOUNT_TOO_LOW");
    assert_eq!(
        state.stock().quantity(common::StockKey::new(3, 1)).await,
        Some(100)
    );
}

#[tokio::test]
async fn test_checkout_with_invalid_shipping_is_rejected() {
    let (app, _) = setup().await;
    add_line(&app, "dave", 2, 1, 1).await;

    let mut shipping = shipping();
    shipping["phone_number"] = json!("call me");
    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/checkout",
            json!({ "owner_id": "dave", "shipping": shipping, "payment_method": "card" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_SHIPPING_DETAILS");
}

#[tokio::test]
async fn test_idempotency_key_replays_the_same_order() {
    let (app, state) = setup().await;
    add_line(&app, "erin", 2, 1, 2).await;

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/checkout")
            .header("content-type", "application/json")
            .header("Idempotency-Key", "retry-1")
            .body(Body::from(
                json!({ "owner_id": "erin", "shipping": shipping(), "payment_method": "card" })
                    .to_string(),
            ))
            .unwrap()
    };

    let (status, first) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["order_id"], second["order_id"]);

    assert_eq!(state.ledger().order_count().await, 1);
    assert_eq!(
        state.stock().quantity(common::StockKey::new(2, 1)).await,
        Some(23)
    );
}

#[tokio::test]
async fn test_order_status_transitions() {
    let (app, _) = setup().await;
    add_line(&app, "frank", 2, 1, 1).await;
    let (_, created) = checkout(&app, "frank").await;
    let order_id = created["order_id"].as_str().unwrap().to_string();
    let uri = format!("/orders/{order_id}/status");

    let (status, json) = send(&app, json_request("PUT", &uri, json!({ "status": "Processing" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Processing");

    let (status, json) = send(&app, json_request("PUT", &uri, json!({ "status": "Pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_STATUS_TRANSITION");

    let (status, _) = send(&app, json_request("PUT", &uri, json!({ "status": "Lost" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
    let (app, _) = setup().await;
    let id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, empty_request("GET", &format!("/orders/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(&app, empty_request("POST", &format!("/orders/{id}/capture"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");

    let (status, json) = send(
        &app,
        json_request("PUT", &format!("/orders/{id}/status"), json!({ "status": "Cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_order_id_is_bad_request() {
    let (app, _) = setup().await;

    let (status, json) = send(&app, empty_request("GET", "/orders/not-a-uuid")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_capture_of_committed_order_succeeds() {
    let (app, _) = setup().await;
    add_line(&app, "gina", 2, 1, 1).await;
    let (_, created) = checkout(&app, "gina").await;
    let order_id = created["order_id"].as_str().unwrap().to_string();

    let (status, json) = send(&app, empty_request("POST", &format!("/orders/{order_id}/capture"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["id"], order_id.as_str());
}

#[tokio::test]
async fn test_capture_of_cancelled_order_is_conflict() {
    let (app, _) = setup().await;
    add_line(&app, "hana", 2, 1, 1).await;
    let (_, created) = checkout(&app, "hana").await;
    let order_id = created["order_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/orders/{order_id}/status"),
            json!({ "status": "Cancelled" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, empty_request("POST", &format!("/orders/{order_id}/capture"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "ORDER_NOT_CAPTURABLE");
}

#[tokio::test]
async fn test_overlong_idempotency_key_is_bad_request() {
    let (app, state) = setup().await;
    add_line(&app, "ivan", 2, 1, 1).await;

    let request = Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .header("Idempotency-Key", "k".repeat(300))
        .body(Body::from(
            json!({ "owner_id": "ivan", "shipping": shipping(), "payment_method": "card" })
                .to_string(),
        ))
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert_eq!(
        state.stock().quantity(common::StockKey::new(2, 1)).await,
        Some(25)
    );
    assert_eq!(state.ledger().order_count().await, 0);
}
