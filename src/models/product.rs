//! Catalog and inventory-check models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::products;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub active: bool,
}

impl From<products::Model> for ProductView {
    fn from(model: products::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            price: crate::services::price_utils::money(model.price),
            stock: model.stock,
            active: model.active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductListQuery {
    /// Include inactive products (admin views)
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCheckItem {
    pub product_id: i32,
    pub quantity: i32,
}

/// Request to check availability before ordering (POST /api/inventory/check)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCheckRequest {
    pub items: Vec<InventoryCheckItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLine {
    pub product_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,
    pub requested: i32,
    pub available: i32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCheckResponse {
    /// True when every requested line can be fulfilled
    pub available: bool,
    pub items: Vec<InventoryLine>,
    /// Sum of quantity x catalog price over available lines
    pub estimated_total: Decimal,
    /// INV_ token, only issued when everything is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_token: Option<String>,
}

/// Admin stock-set (PUT /api/admin/products/{id}/stock)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStockRequest {
    pub stock: i32,
}
