//! Order Transaction Engine
//!
//! Creates an order in a single database transaction:
//!
//! 1. precondition tokens must be present and fresh
//! 2. product rows are locked (`SELECT ... FOR UPDATE`) in ascending id order
//! 3. stock, availability and totals are checked against the locked rows;
//!    the catalog price always wins over the caller's price
//! 4. order, items and customer note are inserted
//! 5. stock is decremented with a guarded conditional update
//! 6. the tokens are marked consumed so they cannot back a second order
//!
//! Any failure rolls back everything. The engine never retries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info, warn};

use crate::entities::{consumed_tokens, order_items, orders, prelude::*, products};
use crate::models::order::{CreateOrderRequest, OrderStatus, OrderView, PaymentStatus};
use crate::services::order_store::{self, CUSTOMER_ACTOR};
use crate::services::preconditions::{self, TokenKind, TokenRejection};
use crate::services::price_utils::{PRICE_TOLERANCE, line_total, money, within_tolerance};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Missing {kind} token: complete the {} step before creating an order", .kind.step())]
    MissingPrecondition { kind: TokenKind },
    #[error(transparent)]
    InvalidPrecondition(#[from] TokenRejection),
    #[error("The {kind} token has already been used for another order; repeat the {} step", .kind.step())]
    TokenAlreadyUsed { kind: TokenKind },
    #[error("{0}")]
    Validation(String),
    #[error("Product {product_id} not found")]
    ProductNotFound { product_id: i32 },
    #[error("Product '{name}' (id {product_id}) is not available")]
    ProductUnavailable { product_id: i32, name: String },
    #[error("Insufficient stock for '{name}' (id {product_id}): available {available}, requested {requested}")]
    InsufficientStock {
        product_id: i32,
        name: String,
        available: i32,
        requested: i64,
    },
    #[error("Total mismatch: calculated {calculated:.2}, provided {provided:.2}")]
    TotalMismatch { calculated: Decimal, provided: Decimal },
    #[error("Stock update for product {product_id} affected {rows} rows (expected 1); order aborted")]
    StockConsistency { product_id: i32, rows: u64 },
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl OrderError {
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::MissingPrecondition { .. } => "PRECONDITION_MISSING",
            OrderError::InvalidPrecondition(rejection) => rejection.code(),
            OrderError::TokenAlreadyUsed { .. } => "TOKEN_ALREADY_USED",
            OrderError::Validation(_) => "VALIDATION_ERROR",
            OrderError::ProductNotFound { .. } => "PRODUCT_NOT_FOUND",
            OrderError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            OrderError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            OrderError::TotalMismatch { .. } => "TOTAL_MISMATCH",
            OrderError::StockConsistency { .. } => "CONSISTENCY_ERROR",
            OrderError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Tokens that passed format and freshness checks
#[derive(Debug, Clone)]
pub struct VerifiedTokens {
    pub location: String,
    pub inventory: String,
    pub payment: String,
}

impl VerifiedTokens {
    fn iter(&self) -> [(TokenKind, &str); 3] {
        [
            (TokenKind::Location, self.location.as_str()),
            (TokenKind::Inventory, self.inventory.as_str()),
            (TokenKind::Payment, self.payment.as_str()),
        ]
    }
}

/// A request line priced from the locked catalog row
#[derive(Debug, Clone)]
struct PricedLine {
    product_id: i32,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

#[derive(Clone)]
pub struct OrderEngine {
    db: DatabaseConnection,
    max_order_total: Decimal,
}

impl OrderEngine {
    pub fn new(db: DatabaseConnection, max_order_total: Decimal) -> Self {
        Self { db, max_order_total }
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderView, OrderError> {
        self.create_order_at(request, Utc::now()).await
    }

    /// Create an order, judging token freshness against `now`
    pub async fn create_order_at(
        &self,
        request: CreateOrderRequest,
        now: DateTime<Utc>,
    ) -> Result<OrderView, OrderError> {
        let tokens = check_preconditions(&request, now)?;
        validate_request(&request, self.max_order_total)?;

        let order_id = uuid::Uuid::new_v4().to_string();
        let txn = self.db.begin().await?;

        match place_order(&txn, &order_id, &request, &tokens, now).await {
            Ok(order) => {
                txn.commit().await?;
                info!(
                    order_id = %order.id,
                    customer_id = %order.customer_id,
                    total = %order.total_amount,
                    items = order.items.len(),
                    "Order created"
                );
                Ok(order)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    error!(order_id = %order_id, error = %rollback_err, "Rollback failed");
                }
                warn!(
                    order_id = %order_id,
                    customer_id = %request.customer_id,
                    code = err.code(),
                    error = %err,
                    "Order creation rejected"
                );
                Err(err)
            }
        }
    }
}

/// Presence first for all three tokens, then format and freshness.
pub fn check_preconditions(request: &CreateOrderRequest, now: DateTime<Utc>) -> Result<VerifiedTokens, OrderError> {
    let present = |token: &Option<String>| {
        token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    let location = present(&request.location_token);
    let inventory = present(&request.inventory_token);
    let payment = present(&request.payment_token);

    let (Some(location), Some(inventory), Some(payment)) = (location.clone(), inventory.clone(), payment.clone())
    else {
        let kind = if location.is_none() {
            TokenKind::Location
        } else if inventory.is_none() {
            TokenKind::Inventory
        } else {
            TokenKind::Payment
        };
        return Err(OrderError::MissingPrecondition { kind });
    };

    preconditions::validate(TokenKind::Location, &location, now)?;
    preconditions::validate(TokenKind::Inventory, &inventory, now)?;
    preconditions::validate(TokenKind::Payment, &payment, now)?;

    Ok(VerifiedTokens {
        location,
        inventory,
        payment,
    })
}

/// Shape checks that need no database access
pub fn validate_request(request: &CreateOrderRequest, max_order_total: Decimal) -> Result<(), OrderError> {
    let invalid = |msg: String| Err(OrderError::Validation(msg));

    if request.customer_id.trim().is_empty() {
        return invalid("Customer id cannot be empty".to_string());
    }
    if request.customer_name.trim().is_empty() {
        return invalid("Customer name cannot be empty".to_string());
    }
    if request.delivery_address.trim().is_empty() {
        return invalid("Delivery address cannot be empty".to_string());
    }
    if request.items.is_empty() {
        return invalid("Order must contain at least one item".to_string());
    }

    for (index, item) in request.items.iter().enumerate() {
        let line = index + 1;
        if item.product_id <= 0 {
            return invalid(format!("Item {}: product id must be positive, got {}", line, item.product_id));
        }
        if item.quantity <= 0 {
            return invalid(format!("Item {}: quantity must be positive, got {}", line, item.quantity));
        }
        if item.unit_price <= Decimal::ZERO {
            return invalid(format!("Item {}: unit price must be positive, got {}", line, item.unit_price));
        }
    }

    if request.total_amount <= Decimal::ZERO {
        return invalid(format!("Order total must be positive, got {}", request.total_amount));
    }
    if request.total_amount > max_order_total {
        return invalid(format!(
            "Order total {} exceeds the maximum of {}",
            request.total_amount, max_order_total
        ));
    }

    Ok(())
}

/// Transaction body. The caller commits on `Ok` and rolls back on `Err`.
async fn place_order(
    txn: &DatabaseTransaction,
    order_id: &str,
    request: &CreateOrderRequest,
    tokens: &VerifiedTokens,
    now: DateTime<Utc>,
) -> Result<OrderView, OrderError> {
    consume_tokens(txn, order_id, tokens, now).await?;

    let locked = lock_products(txn, request).await?;
    let lines = price_lines(order_id, request, &locked)?;

    let calculated: Decimal = lines.iter().map(|l| l.total_price).sum();
    if !within_tolerance(calculated, request.total_amount) {
        return Err(OrderError::TotalMismatch {
            calculated: money(calculated),
            provided: money(request.total_amount),
        });
    }

    orders::ActiveModel {
        id: Set(order_id.to_string()),
        customer_id: Set(request.customer_id.trim().to_string()),
        customer_name: Set(request.customer_name.trim().to_string()),
        delivery_address: Set(request.delivery_address.trim().to_string()),
        phone: Set(request
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)),
        total_amount: Set(money(calculated)),
        status: Set(OrderStatus::Placed.as_str().to_string()),
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(txn)
    .await?;

    for line in &lines {
        order_items::ActiveModel {
            order_id: Set(order_id.to_string()),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            unit_price: Set(line.unit_price),
            total_price: Set(line.total_price),
            created_at: Set(now.into()),
            ..Default::default()
        }
        .insert(txn)
        .await?;
    }

    if let Some(note) = request.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        order_store::append_note(txn, order_id, CUSTOMER_ACTOR, note, now).await?;
    }

    for line in &lines {
        decrement_stock(txn, line.product_id, line.quantity, now).await?;
    }

    order_store::load_order(txn, order_id)
        .await?
        .ok_or_else(|| OrderError::Database(DbErr::RecordNotFound(format!("order {} vanished", order_id))))
}

/// Record each token as spent. A replayed token inserts nothing.
async fn consume_tokens(
    txn: &DatabaseTransaction,
    order_id: &str,
    tokens: &VerifiedTokens,
    now: DateTime<Utc>,
) -> Result<(), OrderError> {
    for (kind, token) in tokens.iter() {
        let inserted = ConsumedTokens::insert(consumed_tokens::ActiveModel {
            token: Set(token.to_string()),
            kind: Set(kind.as_str().to_string()),
            order_id: Set(order_id.to_string()),
            consumed_at: Set(now.into()),
        })
        .on_conflict(
            OnConflict::column(consumed_tokens::Column::Token)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

        if inserted == 0 {
            return Err(OrderError::TokenAlreadyUsed { kind });
        }
    }
    Ok(())
}

/// Lock every referenced product row, in ascending id order so concurrent
/// orders on overlapping products cannot deadlock.
async fn lock_products(
    txn: &DatabaseTransaction,
    request: &CreateOrderRequest,
) -> Result<HashMap<i32, products::Model>, OrderError> {
    let mut requested: BTreeMap<i32, i64> = BTreeMap::new();
    for item in &request.items {
        *requested.entry(item.product_id).or_insert(0) += i64::from(item.quantity);
    }

    let mut locked = HashMap::with_capacity(requested.len());
    for (&product_id, &quantity) in &requested {
        let product = Products::find_by_id(product_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(OrderError::ProductNotFound { product_id })?;

        if !product.active {
            return Err(OrderError::ProductUnavailable {
                product_id,
                name: product.name,
            });
        }

        if i64::from(product.stock) < quantity {
            return Err(OrderError::InsufficientStock {
                product_id,
                name: product.name,
                available: product.stock,
                requested: quantity,
            });
        }

        debug!(product_id, stock = product.stock, requested = quantity, "Product locked");
        locked.insert(product_id, product);
    }

    Ok(locked)
}

/// Price each request line from the locked catalog row.
fn price_lines(
    order_id: &str,
    request: &CreateOrderRequest,
    locked: &HashMap<i32, products::Model>,
) -> Result<Vec<PricedLine>, OrderError> {
    request
        .items
        .iter()
        .map(|item| {
            let product = locked
                .get(&item.product_id)
                .ok_or(OrderError::ProductNotFound {
                    product_id: item.product_id,
                })?;

            if (item.unit_price - product.price).abs() > PRICE_TOLERANCE {
                warn!(
                    order_id = %order_id,
                    product_id = item.product_id,
                    declared = %item.unit_price,
                    catalog = %product.price,
                    "Declared unit price differs from catalog price; using catalog price"
                );
            }

            let unit_price = money(product.price);
            Ok(PricedLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price,
                total_price: line_total(unit_price, item.quantity),
            })
        })
        .collect()
}

/// `UPDATE products SET stock = stock - q WHERE id = ? AND stock >= q`
async fn decrement_stock(
    txn: &DatabaseTransaction,
    product_id: i32,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<(), OrderError> {
    let result = Products::update_many()
        .col_expr(products::Column::Stock, Expr::col(products::Column::Stock).sub(quantity))
        .col_expr(products::Column::UpdatedAt, Expr::value(chrono::DateTime::<chrono::FixedOffset>::from(now)))
        .filter(products::Column::Id.eq(product_id))
        .filter(products::Column::Stock.gte(quantity))
        .exec(txn)
        .await?;

    if result.rows_affected != 1 {
        error!(
            product_id,
            quantity,
            rows_affected = result.rows_affected,
            "Guarded stock decrement did not affect exactly one row; aborting order"
        );
        return Err(OrderError::StockConsistency {
            product_id,
            rows: result.rows_affected,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::OrderItemRequest;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn request(now: DateTime<Utc>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: "chat-1".to_string(),
            customer_name: "Dana".to_string(),
            delivery_address: "1 Main St".to_string(),
            phone: None,
            items: vec![OrderItemRequest {
                product_id: 1,
                quantity: 2,
                unit_price: dec!(10.00),
            }],
            total_amount: dec!(20.00),
            notes: None,
            location_token: Some(preconditions::issue(TokenKind::Location, now, "a")),
            inventory_token: Some(preconditions::issue(TokenKind::Inventory, now, "b")),
            payment_token: Some(preconditions::issue(TokenKind::Payment, now, "c")),
        }
    }

    #[test]
    fn test_valid_request_passes_checks() {
        let now = Utc::now();
        let req = request(now);
        assert!(check_preconditions(&req, now).is_ok());
        assert!(validate_request(&req, dec!(1000000)).is_ok());
    }

    #[test]
    fn test_missing_token_is_distinct_from_invalid() {
        let now = Utc::now();
        let mut req = request(now);
        req.inventory_token = None;
        let err = check_preconditions(&req, now).unwrap_err();
        assert_eq!(err.code(), "PRECONDITION_MISSING");
        assert!(err.to_string().contains("inventory reservation"));

        let mut req = request(now);
        req.inventory_token = Some("INV_BADFORMAT".to_string());
        let err = check_preconditions(&req, now).unwrap_err();
        assert_eq!(err.code(), "TOKEN_MALFORMED");
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let now = Utc::now();
        let mut req = request(now);
        req.payment_token = Some("   ".to_string());
        assert!(matches!(
            check_preconditions(&req, now),
            Err(OrderError::MissingPrecondition { kind: TokenKind::Payment })
        ));
    }

    #[test]
    fn test_presence_checked_before_validity() {
        let now = Utc::now();
        let mut req = request(now);
        req.location_token = Some("LOC_BADFORMAT".to_string());
        req.payment_token = None;
        assert!(matches!(
            check_preconditions(&req, now),
            Err(OrderError::MissingPrecondition { kind: TokenKind::Payment })
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let mut req = request(now);
        req.location_token = Some(preconditions::issue(TokenKind::Location, now - Duration::hours(25), "a"));
        let err = check_preconditions(&req, now).unwrap_err();
        assert_eq!(err.code(), "TOKEN_EXPIRED");
    }

    #[test]
    fn test_validate_empty_items() {
        let mut req = request(Utc::now());
        req.items.clear();
        let err = validate_request(&req, dec!(1000000)).unwrap_err();
        assert_eq!(err.to_string(), "Order must contain at least one item");
    }

    #[test]
    fn test_validate_item_fields() {
        let mut req = request(Utc::now());
        req.items[0].quantity = 0;
        assert!(validate_request(&req, dec!(1000000)).is_err());

        let mut req = request(Utc::now());
        req.items[0].product_id = 0;
        assert!(validate_request(&req, dec!(1000000)).is_err());

        let mut req = request(Utc::now());
        req.items[0].unit_price = dec!(0);
        assert!(validate_request(&req, dec!(1000000)).is_err());
    }

    #[test]
    fn test_validate_total_bounds() {
        let mut req = request(Utc::now());
        req.total_amount = dec!(0);
        assert!(validate_request(&req, dec!(1000000)).is_err());

        let mut req = request(Utc::now());
        req.total_amount = dec!(1000000.01);
        let err = validate_request(&req, dec!(1000000)).unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum"));
    }

    #[test]
    fn test_validate_blank_customer_fields() {
        let mut req = request(Utc::now());
        req.delivery_address = "  ".to_string();
        assert!(validate_request(&req, dec!(1000000)).is_err());
    }

    #[test]
    fn test_total_mismatch_message() {
        let err = OrderError::TotalMismatch {
            calculated: dec!(20),
            provided: dec!(25.00),
        };
        assert_eq!(err.to_string(), "Total mismatch: calculated 20.00, provided 25.00");
    }

    async fn db_with_product(stock: i32) -> (DatabaseConnection, i32) {
        use migration::MigratorTrait;
        use sea_orm::{ConnectOptions, Database};

        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();

        let now = Utc::now();
        let product = products::ActiveModel {
            name: Set("Margherita".to_string()),
            description: Set(None),
            price: Set(dec!(10.00)),
            stock: Set(stock),
            active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        (db, product.id)
    }

    async fn stock(db: &DatabaseConnection, product_id: i32) -> i32 {
        Products::find_by_id(product_id).one(db).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_guarded_decrement_aborts_when_stock_is_short() {
        let (db, product_id) = db_with_product(2).await;

        let txn = db.begin().await.unwrap();
        let err = decrement_stock(&txn, product_id, 5, Utc::now()).await.unwrap_err();
        txn.rollback().await.unwrap();

        assert!(matches!(err, OrderError::StockConsistency { rows: 0, .. }));
        assert_eq!(err.code(), "CONSISTENCY_ERROR");
        assert_eq!(stock(&db, product_id).await, 2);
    }

    #[tokio::test]
    async fn test_guarded_decrement_on_missing_product() {
        let (db, _) = db_with_product(2).await;

        let txn = db.begin().await.unwrap();
        let err = decrement_stock(&txn, 4242, 1, Utc::now()).await.unwrap_err();
        txn.rollback().await.unwrap();

        assert!(matches!(err, OrderError::StockConsistency { product_id: 4242, rows: 0 }));
    }

    #[tokio::test]
    async fn test_guarded_decrement_takes_exact_stock() {
        let (db, product_id) = db_with_product(2).await;

        let txn = db.begin().await.unwrap();
        decrement_stock(&txn, product_id, 2, Utc::now()).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(stock(&db, product_id).await, 0);
    }

    #[test]
    fn test_insufficient_stock_message_names_quantities() {
        let err = OrderError::InsufficientStock {
            product_id: 3,
            name: "Pizza".to_string(),
            available: 1,
            requested: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("available 1"));
        assert!(msg.contains("requested 4"));
    }
}
