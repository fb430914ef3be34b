//! Product catalog reads, the pre-order inventory check and admin stock edits

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::entities::{prelude::*, products};
use crate::models::product::{
    InventoryCheckRequest, InventoryCheckResponse, InventoryLine, ProductListQuery, ProductView,
};
use crate::services::preconditions::{self, TokenKind};
use crate::services::price_utils::{line_total, money};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Product {0} not found")]
    ProductNotFound(i32),
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl CatalogError {
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            CatalogError::Validation(_) => "VALIDATION_ERROR",
            CatalogError::Database(_) => "DATABASE_ERROR",
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    db: DatabaseConnection,
}

impl CatalogService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list_products(&self, query: &ProductListQuery) -> Result<Vec<ProductView>, CatalogError> {
        let mut select = Products::find().order_by_asc(products::Column::Id);
        if !query.include_inactive {
            select = select.filter(products::Column::Active.eq(true));
        }

        let products = select.all(&self.db).await?;
        Ok(products.into_iter().map(ProductView::from).collect())
    }

    pub async fn get_product(&self, product_id: i32) -> Result<ProductView, CatalogError> {
        Products::find_by_id(product_id)
            .one(&self.db)
            .await?
            .map(ProductView::from)
            .ok_or(CatalogError::ProductNotFound(product_id))
    }

    pub async fn check_inventory(&self, request: &InventoryCheckRequest) -> Result<InventoryCheckResponse, CatalogError> {
        self.check_inventory_at(request, Utc::now()).await
    }

    /// Report availability per product without locking or reserving anything.
    /// An `INV_` token is issued only when every line can be fulfilled; the
    /// order transaction re-checks stock under lock regardless.
    pub async fn check_inventory_at(
        &self,
        request: &InventoryCheckRequest,
        now: DateTime<Utc>,
    ) -> Result<InventoryCheckResponse, CatalogError> {
        if request.items.is_empty() {
            return Err(CatalogError::Validation("At least one item is required".to_string()));
        }

        let mut requested: BTreeMap<i32, i32> = BTreeMap::new();
        for (index, item) in request.items.iter().enumerate() {
            if item.quantity <= 0 {
                return Err(CatalogError::Validation(format!(
                    "Item {}: quantity must be positive, got {}",
                    index + 1,
                    item.quantity
                )));
            }
            let entry = requested.entry(item.product_id).or_insert(0);
            *entry = entry.saturating_add(item.quantity);
        }

        let found: BTreeMap<i32, products::Model> = Products::find()
            .filter(products::Column::Id.is_in(requested.keys().copied()))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(requested.len());
        let mut estimated_total = Decimal::ZERO;

        for (&product_id, &quantity) in &requested {
            let line = match found.get(&product_id) {
                None => InventoryLine {
                    product_id,
                    name: None,
                    unit_price: None,
                    requested: quantity,
                    available: 0,
                    ok: false,
                    reason: Some("Product not found".to_string()),
                },
                Some(product) => {
                    let reason = if !product.active {
                        Some("Product is not available".to_string())
                    } else if product.stock < quantity {
                        Some(format!("Only {} in stock", product.stock))
                    } else {
                        None
                    };
                    let unit_price = money(product.price);
                    if reason.is_none() {
                        estimated_total += line_total(unit_price, quantity);
                    }
                    InventoryLine {
                        product_id,
                        name: Some(product.name.clone()),
                        unit_price: Some(unit_price),
                        requested: quantity,
                        available: product.stock,
                        ok: reason.is_none(),
                        reason,
                    }
                }
            };
            lines.push(line);
        }

        let available = lines.iter().all(|l| l.ok);
        // Tokens are single-use, so two checks of the same cart in the same
        // second must not share one
        let reservation_token = available.then(|| {
            let lines = requested
                .iter()
                .map(|(id, qty)| format!("{}x{}", id, qty))
                .collect::<Vec<_>>()
                .join(",");
            let material = format!("{}|{}", lines, uuid::Uuid::new_v4());
            preconditions::issue(TokenKind::Inventory, now, &material)
        });

        debug!(
            products = requested.len(),
            available,
            estimated_total = %estimated_total,
            "Inventory checked"
        );

        Ok(InventoryCheckResponse {
            available,
            items: lines,
            estimated_total: money(estimated_total),
            reservation_token,
        })
    }

    /// Overwrite a product's stock under the same row lock orders take
    pub async fn set_stock(&self, product_id: i32, stock: i32) -> Result<ProductView, CatalogError> {
        if stock < 0 {
            return Err(CatalogError::Validation(format!("Stock cannot be negative, got {}", stock)));
        }

        let txn = self.db.begin().await?;

        let Some(product) = Products::find_by_id(product_id).lock_exclusive().one(&txn).await? else {
            txn.rollback().await?;
            return Err(CatalogError::ProductNotFound(product_id));
        };

        let previous = product.stock;
        let mut active: products::ActiveModel = product.into();
        active.stock = Set(stock);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(product_id, previous, stock, "Product stock set");
        Ok(ProductView::from(updated))
    }
}
