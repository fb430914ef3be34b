#![allow(dead_code)]

use chrono::{DateTime, Utc};
use delivery_orders::config::AppConfig;
use delivery_orders::entities::products;
use delivery_orders::models::order::{CreateOrderRequest, OrderItemRequest};
use delivery_orders::services::notification::{NotificationDispatcher, RecordingDispatcher};
use delivery_orders::services::preconditions::{self, TokenKind};
use delivery_orders::AppState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, DbErr, EntityTrait, Set};
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const HASH_SECRET: &str = "test-payment-secret";

/// Set up a migrated in-memory SQLite database.
///
/// A single pooled connection keeps every query on the same in-memory
/// database; transactions are serialized as a consequence.
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);

    let db = Database::connect(options).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        max_order_total: dec!(1000000),
        notification_webhook_url: None,
        notification_timeout_secs: 5,
        admin_session_ttl_secs: 3600,
        payment_hash_secret: HASH_SECRET.to_string(),
        points_per_usd: dec!(50),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub dispatcher: Arc<RecordingDispatcher>,
}

pub async fn setup_app() -> TestApp {
    let db = setup_test_db().await.expect("Failed to set up test DB");
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let state = AppState::new(db, test_config(), dispatcher.clone() as Arc<dyn NotificationDispatcher>);
    TestApp { state, dispatcher }
}

pub async fn seed_product(db: &DatabaseConnection, name: &str, price: Decimal, stock: i32) -> products::Model {
    seed_product_with(db, name, price, stock, true).await
}

pub async fn seed_product_with(
    db: &DatabaseConnection,
    name: &str,
    price: Decimal,
    stock: i32,
    active: bool,
) -> products::Model {
    let now = Utc::now();
    products::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        stock: Set(stock),
        active: Set(active),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to seed product")
}

pub async fn stock_of(db: &DatabaseConnection, product_id: i32) -> i32 {
    products::Entity::find_by_id(product_id)
        .one(db)
        .await
        .expect("Failed to load product")
        .expect("Product missing")
        .stock
}

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

/// A fresh, unique token of `kind` stamped at `at`
pub fn token_at(kind: TokenKind, at: DateTime<Utc>) -> String {
    let seq = TOKEN_SEQ.fetch_add(1, Ordering::Relaxed);
    preconditions::issue(kind, at, &format!("test-{}", seq))
}

pub fn token(kind: TokenKind) -> String {
    token_at(kind, Utc::now())
}

/// An order request with fresh tokens
pub fn order_request(items: Vec<(i32, i32, Decimal)>, total: Decimal) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id: "chat-42".to_string(),
        customer_name: "Dana Reyes".to_string(),
        delivery_address: "1 Main St, Springfield".to_string(),
        phone: Some("+1 555 0100".to_string()),
        items: items
            .into_iter()
            .map(|(product_id, quantity, unit_price)| OrderItemRequest {
                product_id,
                quantity,
                unit_price,
            })
            .collect(),
        total_amount: total,
        notes: None,
        location_token: Some(token(TokenKind::Location)),
        inventory_token: Some(token(TokenKind::Inventory)),
        payment_token: Some(token(TokenKind::Payment)),
    }
}
