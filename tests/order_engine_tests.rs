mod common;

use chrono::{Duration, Utc};
use delivery_orders::entities::{consumed_tokens, order_items, orders};
use delivery_orders::models::order::{OrderStatus, PaymentStatus};
use delivery_orders::services::order_engine::OrderError;
use delivery_orders::services::preconditions::TokenKind;
use futures_util::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

use crate::common::{order_request, seed_product, seed_product_with, setup_app, stock_of, token_at};

#[tokio::test]
async fn test_create_order_round_trip() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    let mut request = order_request(vec![(pizza.id, 2, dec!(10.00))], dec!(20.00));
    request.notes = Some("Ring twice".to_string());

    let order = app.state.orders.create_order(request).await.unwrap();

    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.total_amount.to_string(), "20.00");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].product_name, "Margherita");
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[0].total_price, dec!(20.00));
    assert_eq!(order.notes.len(), 1);
    assert_eq!(order.notes[0].author, "customer");
    assert_eq!(order.notes[0].body, "Ring twice");

    assert_eq!(stock_of(db, pizza.id).await, 3);
    assert_eq!(consumed_tokens::Entity::find().count(db).await.unwrap(), 3);
}

#[tokio::test]
async fn test_total_mismatch_leaves_no_trace() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    let request = order_request(vec![(pizza.id, 2, dec!(10.00))], dec!(25.00));
    let err = app.state.orders.create_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::TotalMismatch { .. }));
    assert_eq!(err.to_string(), "Total mismatch: calculated 20.00, provided 25.00");
    assert_eq!(stock_of(db, pizza.id).await, 5);
    assert_eq!(orders::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(order_items::Entity::find().count(db).await.unwrap(), 0);
    // Token consumption rolled back with everything else
    assert_eq!(consumed_tokens::Entity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_total_within_one_cent_is_accepted() {
    let app = setup_app().await;
    let pizza = seed_product(&app.state.db, "Margherita", dec!(10.00), 5).await;

    let request = order_request(vec![(pizza.id, 2, dec!(10.00))], dec!(20.01));
    let order = app.state.orders.create_order(request).await.unwrap();
    // Stored total is the calculated one
    assert_eq!(order.total_amount, dec!(20.00));
}

#[tokio::test]
async fn test_catalog_price_wins_over_declared_price() {
    let app = setup_app().await;
    let pizza = seed_product(&app.state.db, "Margherita", dec!(12.00), 5).await;

    let request = order_request(vec![(pizza.id, 1, dec!(9.99))], dec!(12.00));
    let order = app.state.orders.create_order(request).await.unwrap();
    assert_eq!(order.items[0].unit_price, dec!(12.00));

    let request = order_request(vec![(pizza.id, 1, dec!(9.99))], dec!(9.99));
    let err = app.state.orders.create_order(request).await.unwrap_err();
    assert_eq!(err.code(), "TOTAL_MISMATCH");
}

#[tokio::test]
async fn test_insufficient_stock_names_quantities() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 1).await;

    let request = order_request(vec![(pizza.id, 3, dec!(10.00))], dec!(30.00));
    let err = app.state.orders.create_order(request).await.unwrap_err();

    match err {
        OrderError::InsufficientStock { available, requested, .. } => {
            assert_eq!(available, 1);
            assert_eq!(requested, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(stock_of(db, pizza.id).await, 1);
}

#[tokio::test]
async fn test_repeated_product_lines_are_aggregated_for_stock() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 3).await;

    // 2 + 2 exceeds the 3 on hand even though each line alone fits
    let request = order_request(
        vec![(pizza.id, 2, dec!(10.00)), (pizza.id, 2, dec!(10.00))],
        dec!(40.00),
    );
    let err = app.state.orders.create_order(request).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    assert_eq!(stock_of(db, pizza.id).await, 3);
}

#[tokio::test]
async fn test_unknown_and_inactive_products_rejected() {
    let app = setup_app().await;
    let db = &app.state.db;
    let retired = seed_product_with(db, "Retired Special", dec!(8.00), 10, false).await;

    let request = order_request(vec![(9999, 1, dec!(8.00))], dec!(8.00));
    let err = app.state.orders.create_order(request).await.unwrap_err();
    assert!(matches!(err, OrderError::ProductNotFound { product_id: 9999 }));

    let request = order_request(vec![(retired.id, 1, dec!(8.00))], dec!(8.00));
    let err = app.state.orders.create_order(request).await.unwrap_err();
    assert_eq!(err.code(), "PRODUCT_UNAVAILABLE");
    assert_eq!(stock_of(db, retired.id).await, 10);
}

#[tokio::test]
async fn test_failed_order_leaves_other_products_untouched() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;
    let soda = seed_product(db, "Soda", dec!(2.00), 0).await;

    let request = order_request(vec![(pizza.id, 2, dec!(10.00)), (soda.id, 1, dec!(2.00))], dec!(22.00));
    assert!(app.state.orders.create_order(request).await.is_err());

    assert_eq!(stock_of(db, pizza.id).await, 5);
    assert_eq!(stock_of(db, soda.id).await, 0);
}

#[tokio::test]
async fn test_missing_token_rejected_before_any_write() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    let mut request = order_request(vec![(pizza.id, 1, dec!(10.00))], dec!(10.00));
    request.location_token = None;
    let err = app.state.orders.create_order(request).await.unwrap_err();

    assert!(matches!(err, OrderError::MissingPrecondition { kind: TokenKind::Location }));
    assert!(err.to_string().contains("location verification"));
    assert_eq!(stock_of(db, pizza.id).await, 5);
}

#[tokio::test]
async fn test_expired_token_rejected_repeatably() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    let mut request = order_request(vec![(pizza.id, 1, dec!(10.00))], dec!(10.00));
    request.inventory_token = Some(token_at(TokenKind::Inventory, Utc::now() - Duration::minutes(61)));

    for _ in 0..2 {
        let err = app.state.orders.create_order(request.clone()).await.unwrap_err();
        assert_eq!(err.code(), "TOKEN_EXPIRED");
    }
    assert_eq!(stock_of(db, pizza.id).await, 5);
    assert_eq!(orders::Entity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_replayed_token_rejected() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    let first = order_request(vec![(pizza.id, 1, dec!(10.00))], dec!(10.00));
    let mut second = order_request(vec![(pizza.id, 1, dec!(10.00))], dec!(10.00));
    second.payment_token = first.payment_token.clone();

    app.state.orders.create_order(first).await.unwrap();
    let err = app.state.orders.create_order(second).await.unwrap_err();

    assert!(matches!(err, OrderError::TokenAlreadyUsed { kind: TokenKind::Payment }));
    assert_eq!(stock_of(db, pizza.id).await, 4);
    assert_eq!(orders::Entity::find().count(db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let app = setup_app().await;
    let db = &app.state.db;
    let pizza = seed_product(db, "Margherita", dec!(10.00), 5).await;

    // 8 customers each want 2 units of 5 in stock: at most 2 can succeed
    let attempts = (0..8).map(|_| {
        let engine = app.state.orders.clone();
        let request = order_request(vec![(pizza.id, 2, dec!(10.00))], dec!(20.00));
        async move { engine.create_order(request).await }
    });
    let results = join_all(attempts).await;

    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 2);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }
    assert_eq!(stock_of(db, pizza.id).await, 1);
    assert_eq!(orders::Entity::find().count(db).await.unwrap(), 2);
}
