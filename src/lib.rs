// src/lib.rs

use axum::{
    Router,
    routing::{get, post, put},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use config::AppConfig;
use services::{
    admin::AdminService,
    catalog::CatalogService,
    notification::NotificationDispatcher,
    order_engine::OrderEngine,
    order_status::StatusService,
    payments::PaymentService,
    sessions::{MemorySessionStore, SessionStore},
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub orders: OrderEngine,
    pub status: StatusService,
    pub catalog: CatalogService,
    pub admin: AdminService,
    pub payments: PaymentService,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: AppConfig, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        let sessions = MemorySessionStore::new(Duration::from_secs(config.admin_session_ttl_secs));

        Self {
            orders: OrderEngine::new(db.clone(), config.max_order_total),
            status: StatusService::new(db.clone(), dispatcher),
            catalog: CatalogService::new(db.clone()),
            admin: AdminService::new(db.clone()),
            payments: PaymentService::new(db.clone(), config.payment_hash_secret.clone(), config.points_per_usd),
            sessions: Arc::new(sessions),
            config: Arc::new(config),
            db,
        }
    }
}

pub mod entities {
    pub mod prelude;
    pub mod consumed_tokens;
    pub mod order_items;
    pub mod order_notes;
    pub mod orders;
    pub mod payment_transactions;
    pub mod products;
}

pub mod services {
    pub mod admin;
    pub mod catalog;
    pub mod notification;
    pub mod order_engine;
    pub mod order_status;
    pub mod order_store;
    pub mod payments;
    pub mod preconditions;
    pub mod price_utils;
    pub mod sessions;
}

pub mod config;
pub mod handlers;
pub mod models;

pub fn build_router(state: AppState) -> Router {
    use handlers::{admin, health, orders, payments, preconditions, products};

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        // Catalog and pre-order steps
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/inventory/check", post(products::check_inventory))
        .route("/api/preconditions/validate", post(preconditions::validate_token))
        // Orders
        .route("/api/orders", post(orders::create_order))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/payment/confirm", post(orders::confirm_payment))
        // Payments
        .route("/api/payments", post(payments::create_payment))
        .route("/api/payments/{transaction_id}", get(payments::get_payment))
        .route("/api/payments/{transaction_id}/verify", post(payments::verify_payment))
        .route("/api/payments/{transaction_id}/fail", post(payments::fail_payment))
        .route("/api/payments/{transaction_id}/refund", post(payments::refund_payment))
        // Admin
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/logout", post(admin::logout))
        .route("/api/admin/orders", get(admin::list_orders))
        .route("/api/admin/orders/bulk-status", post(admin::bulk_update_status))
        .route("/api/admin/orders/{id}", get(admin::get_order_detail))
        .route("/api/admin/orders/{id}/status", post(admin::update_order_status))
        .route("/api/admin/stats", get(admin::get_statistics))
        .route("/api/admin/products/{id}/stock", put(admin::set_product_stock))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
