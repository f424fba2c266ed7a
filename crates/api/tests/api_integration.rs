//! Integration tests for the API server over the in-memory store.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::MemoryStore;
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

fn setup() -> axum::Router {
    let state = api::create_state(MemoryStore::new());
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(json) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_item(app: &axum::Router, name: &str, quantity: u32, price_cents: i64) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/items",
        Some(json!({
            "name": name,
            "unit_price_cents": price_cents,
            "quantity": quantity
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn create_order(app: &axum::Router, item_id: &str, quantity: u32) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/orders",
        Some(json!({
            "customer_name": "Ada Lovelace",
            "customer_email": "ada@example.com",
            "lines": [{ "item_id": item_id, "quantity": quantity }]
        })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_item_crud_flow() {
    let app = setup();
    let id = create_item(&app, "Widget", 10, 500).await;

    let (status, item) = send(&app, "GET", &format!("/items/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["name"], "Widget");
    assert_eq!(item["unit_price_cents"], 500);
    assert_eq!(item["quantity"], 10);
    assert_eq!(item["low_stock"], false);

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/items/{id}"),
        Some(json!({ "name": "Gadget", "unit_price_cents": 700 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Gadget");
    assert_eq!(updated["unit_price_cents"], 700);
    assert_eq!(updated["quantity"], 10);

    let (status, _) = send(&app, "DELETE", &format!("/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleted items no longer list, and a second delete is a 404.
    let (_, listed) = send(&app, "GET", "/items", None).await;
    assert_eq!(listed["pagination"]["total_count"], 0);
    let (status, _) = send(&app, "DELETE", &format!("/items/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_item_name_is_rejected() {
    let app = setup();
    create_item(&app, "Widget", 10, 500).await;

    let (status, body) = send(
        &app,
        "POST",
        "/items",
        Some(json!({ "name": "widget", "unit_price_cents": 100, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn test_order_flow_reserves_and_restores_stock() {
    let app = setup();
    let item_id = create_item(&app, "Widget", 10, 500).await;

    let (status, order) = create_order(&app, &item_id, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_amount_cents"], 1500);
    assert_eq!(order["lines"][0]["unit_price_cents"], 500);
    let order_id = order["id"].as_str().unwrap();

    let (_, item) = send(&app, "GET", &format!("/items/{item_id}"), None).await;
    assert_eq!(item["quantity"], 7);

    let (status, canceled) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(canceled["status"], "canceled");

    let (_, item) = send(&app, "GET", &format!("/items/{item_id}"), None).await;
    assert_eq!(item["quantity"], 10);

    // Second cancel conflicts and restocks nothing.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, item) = send(&app, "GET", &format!("/items/{item_id}"), None).await;
    assert_eq!(item["quantity"], 10);
}

#[tokio::test]
async fn test_insufficient_stock_conflicts() {
    let app = setup();
    let item_id = create_item(&app, "Widget", 2, 500).await;

    let (status, body) = create_order(&app, &item_id, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("insufficient stock"));

    let (_, item) = send(&app, "GET", &format!("/items/{item_id}"), None).await;
    assert_eq!(item["quantity"], 2);
}

#[tokio::test]
async fn test_confirm_then_cancel_conflicts() {
    let app = setup();
    let item_id = create_item(&app, "Widget", 10, 500).await;
    let (_, order) = create_order(&app, &item_id, 4).await;
    let order_id = order["id"].as_str().unwrap();

    let (status, confirmed) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/confirm"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, item) = send(&app, "GET", &format!("/items/{item_id}"), None).await;
    assert_eq!(item["quantity"], 6);
}

#[tokio::test]
async fn test_list_orders_with_status_filter() {
    let app = setup();
    let item_id = create_item(&app, "Widget", 10, 500).await;
    let (_, first) = create_order(&app, &item_id, 1).await;
    create_order(&app, &item_id, 1).await;
    let first_id = first["id"].as_str().unwrap();
    send(&app, "POST", &format!("/orders/{first_id}/confirm"), None).await;

    let (status, body) = send(&app, "GET", "/orders?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total_count"], 1);
    assert_eq!(body["orders"][0]["status"], "pending");

    let (status, body) = send(&app, "GET", "/orders?status=shipped", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn test_item_list_pagination_cursors() {
    let app = setup();
    for n in 0..12 {
        create_item(&app, &format!("Item {n:02}"), 10, 100).await;
    }

    let (status, body) = send(&app, "GET", "/items?limit=5&offset=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 5);
    assert_eq!(body["pagination"]["total_count"], 12);
    assert_eq!(body["pagination"]["next_cursor"], "10");
    assert_eq!(body["pagination"]["prev_cursor"], "0");
}

#[tokio::test]
async fn test_not_found_and_bad_id() {
    let app = setup();

    let fake = uuid::Uuid::new_v4();
    let (status, _) = send(&app, "GET", &format!("/orders/{fake}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &format!("/items/{fake}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_order_with_unknown_item_is_404() {
    let app = setup();
    let ghost = uuid::Uuid::new_v4().to_string();
    let (status, _) = create_order(&app, &ghost, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = setup();
    let item_id = create_item(&app, "Widget", 10, 500).await;
    create_order(&app, &item_id, 1).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_created_total"));
}
