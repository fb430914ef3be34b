use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delivery_orders::config::AppConfig;
use delivery_orders::services::notification::{LogDispatcher, NotificationDispatcher, WebhookDispatcher};
use delivery_orders::{AppState, build_router};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,delivery_orders=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let dispatcher: Arc<dyn NotificationDispatcher> = match &config.notification_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Customer notifications go to webhook");
            Arc::new(
                WebhookDispatcher::new(url.clone(), config.notification_timeout_secs)
                    .expect("Failed to build notification client"),
            )
        }
        None => {
            tracing::warn!("NOTIFICATION_WEBHOOK_URL not set; notifications are only logged");
            Arc::new(LogDispatcher)
        }
    };

    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set; admin routes will refuse requests");
    }

    let bind_addr = config.bind_addr.clone();
    let app = build_router(AppState::new(db, config, dispatcher));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind listener");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
