mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use delivery_orders::build_router;
use delivery_orders::services::preconditions::TokenKind;
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::common::{ADMIN_KEY, TestApp, seed_product, setup_app, token};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_api_key(mut request: Request<Body>) -> Request<Body> {
    request.headers_mut().insert("x-api-key", ADMIN_KEY.parse().unwrap());
    request
}

async fn router_with_pizza() -> (TestApp, Router, i32) {
    let app = setup_app().await;
    let pizza = seed_product(&app.state.db, "Margherita", dec!(10.00), 5).await;
    let router = build_router(app.state.clone());
    (app, router, pizza.id)
}

fn order_body(product_id: i32, quantity: i32, total: &str) -> Value {
    json!({
        "customer_id": "chat-42",
        "customer_name": "  Dana\u{0000} Reyes ",
        "delivery_address": "1 Main St\nApt 4",
        "items": [{ "product_id": product_id, "quantity": quantity, "unit_price": "10.00" }],
        "total_amount": total,
        "location_token": token(TokenKind::Location),
        "inventory_token": token(TokenKind::Inventory),
        "payment_token": token(TokenKind::Payment),
    })
}

#[tokio::test]
async fn test_health() {
    let (_app, router, _) = router_with_pizza().await;
    let (status, body) = send(&router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_products_endpoints() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let (status, body) = send(&router, get("/api/products")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Margherita");
    assert_eq!(body[0]["price"], "10.00");

    let (status, _) = send(&router, get(&format!("/api/products/{}", pizza_id))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, get("/api/products/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn test_create_and_fetch_order() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let (status, order) = send(&router, post_json("/api/orders", order_body(pizza_id, 2, "20.00"))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["total_amount"], "20.00");
    assert_eq!(order["status"], "placed");
    assert_eq!(order["customer_name"], "Dana Reyes");
    assert_eq!(order["delivery_address"], "1 Main St Apt 4");

    let id = order["id"].as_str().unwrap();
    let (status, fetched) = send(&router, get(&format!("/api/orders/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["items"][0]["product_name"], "Margherita");

    let (status, body) = send(&router, get("/api/orders/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
}

#[tokio::test]
async fn test_order_error_mapping() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let (status, body) = send(&router, post_json("/api/orders", order_body(pizza_id, 2, "25.00"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "TOTAL_MISMATCH");

    let (status, body) = send(&router, post_json("/api/orders", order_body(pizza_id, 9, "90.00"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let mut missing = order_body(pizza_id, 1, "10.00");
    missing.as_object_mut().unwrap().remove("payment_token");
    let (status, body) = send(&router, post_json("/api/orders", missing)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PRECONDITION_MISSING");

    let mut malformed = order_body(pizza_id, 1, "10.00");
    malformed["location_token"] = json!("LOC_garbage");
    let (status, body) = send(&router, post_json("/api/orders", malformed)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "TOKEN_MALFORMED");

    let mut empty = order_body(pizza_id, 1, "10.00");
    empty["items"] = json!([]);
    let (status, body) = send(&router, post_json("/api/orders", empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_validate_token_endpoint() {
    let (_app, router, _) = router_with_pizza().await;

    let (status, body) = send(
        &router,
        post_json(
            "/api/preconditions/validate",
            json!({ "kind": "location", "token": token(TokenKind::Location) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (_, body) = send(
        &router,
        post_json(
            "/api/preconditions/validate",
            json!({ "kind": "payment", "token": token(TokenKind::Location) }),
        ),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["code"], "TOKEN_MALFORMED");
}

#[tokio::test]
async fn test_inventory_check_endpoint() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let (status, body) = send(
        &router,
        post_json(
            "/api/inventory/check",
            json!({ "items": [{ "product_id": pizza_id, "quantity": 2 }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    assert!(body["reservation_token"].as_str().unwrap().starts_with("INV_"));
}

#[tokio::test]
async fn test_admin_requires_credentials() {
    let (_app, router, _) = router_with_pizza().await;

    let (status, body) = send(&router, get("/api/admin/orders")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let mut request = get("/api/admin/orders");
    request.headers_mut().insert("x-api-key", "wrong".parse().unwrap());
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&router, with_api_key(get("/api/admin/orders"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_admin_session_flow_and_status_update() {
    let (app, router, pizza_id) = router_with_pizza().await;
    let (_, order) = send(&router, post_json("/api/orders", order_body(pizza_id, 1, "10.00"))).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, login) = send(
        &router,
        post_json("/api/admin/login", json!({ "api_key": ADMIN_KEY, "actor": "Alex" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session = login["session_token"].as_str().unwrap().to_string();

    let mut request = post_json(
        &format!("/api/admin/orders/{}/status", order_id),
        json!({ "status": "received", "notes": "On it" }),
    );
    request.headers_mut().insert("x-admin-session", session.parse().unwrap());
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous_status"], "placed");
    assert_eq!(body["order"]["status"], "received");
    assert_eq!(body["order"]["notes"][0]["author"], "Alex");
    assert_eq!(body["notification"]["delivered"], true);
    assert_eq!(app.dispatcher.sent().len(), 1);

    let request = with_api_key(post_json(
        &format!("/api/admin/orders/{}/status", order_id),
        json!({ "status": "delivered" }),
    ));
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let mut logout = post_json("/api/admin/logout", json!({}));
    logout.headers_mut().insert("x-admin-session", session.parse().unwrap());
    let (status, _) = send(&router, logout).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let mut request = get(&format!("/api/admin/orders/{}", order_id));
    request.headers_mut().insert("x-admin-session", session.parse().unwrap());
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_bulk_status_and_stats() {
    let (_app, router, pizza_id) = router_with_pizza().await;
    let mut ids = Vec::new();
    for _ in 0..2 {
        let (_, order) = send(&router, post_json("/api/orders", order_body(pizza_id, 1, "10.00"))).await;
        ids.push(order["id"].as_str().unwrap().to_string());
    }
    ids.push("missing-order".to_string());

    let (status, body) = send(
        &router,
        with_api_key(post_json(
            "/api/admin/orders/bulk-status",
            json!({ "order_ids": ids, "status": "received" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success_count"], 2);
    assert_eq!(body["failure_count"], 1);

    let (status, stats) = send(&router, with_api_key(get("/api/admin/stats"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_orders"], 2);
    assert_eq!(stats["by_status"]["received"], 2);
    assert_eq!(stats["total_value"], "20.00");
}

#[tokio::test]
async fn test_admin_set_stock() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/api/admin/products/{}/stock", pizza_id))
        .header("content-type", "application/json")
        .header("x-api-key", ADMIN_KEY)
        .body(Body::from(json!({ "stock": 40 }).to_string()))
        .unwrap();
    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 40);
}

#[tokio::test]
async fn test_payment_flow_over_http() {
    let (_app, router, pizza_id) = router_with_pizza().await;

    let (status, payment) = send(&router, post_json("/api/payments", json!({ "amount_usd": "10.00" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payment["status"], "pending");
    assert_eq!(payment["amount_points"], 500);
    let txn = payment["transaction_id"].as_str().unwrap().to_string();

    let mut body = order_body(pizza_id, 1, "10.00");
    body["payment_token"] = json!(txn);
    let (status, order) = send(&router, post_json("/api/orders", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, verified) = send(
        &router,
        post_json(&format!("/api/payments/{}/verify", txn), json!({ "external_payment_id": "ext-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], "verified");

    let (status, confirmed) = send(
        &router,
        post_json(&format!("/api/orders/{}/payment/confirm", order_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["payment_status"], "completed");

    let (status, body) = send(&router, post_json(&format!("/api/payments/{}/fail", txn), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_PAYMENT_TRANSITION");

    let (status, _) = send(&router, get("/api/payments/TXN_20260101_000000_00000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
