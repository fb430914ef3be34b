//! Admin listing, detail and statistics models

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::order::{OrderStatus, OrderView, PaymentStatus};

/// Query params for GET /api/admin/orders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderListQuery {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Inclusive lower bound on created_at
    #[serde(default)]
    pub from: Option<DateTime<FixedOffset>>,
    /// Inclusive upper bound on created_at
    #[serde(default)]
    pub to: Option<DateTime<FixedOffset>>,
    /// Case-insensitive substring of the customer name
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderListEntry {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub item_count: u64,
    pub created_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderListEntry>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetailResponse {
    pub order: OrderView,
    /// Statuses the order may move to next; empty for terminal orders
    pub valid_next_statuses: Vec<OrderStatus>,
}

/// Query params for GET /api/admin/stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub from: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub to: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub by_status: BTreeMap<String, u64>,
    pub by_payment_status: BTreeMap<String, u64>,
    pub total_value: Decimal,
    pub average_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub api_key: String,
    /// Name recorded on notes written during the session
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub actor: String,
    pub expires_in_secs: u64,
}
