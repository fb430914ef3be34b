//! SeaORM Entity for payment transaction records
//!
//! `integrity_hash` covers every business field of the row and is checked on
//! each read.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    /// TXN_YYYYMMDD_HHMMSS_HASH8, doubles as the payment precondition token
    #[sea_orm(primary_key, auto_increment = false)]
    pub transaction_id: String,
    pub order_id: Option<String>,
    /// Id assigned by the payment provider
    pub external_payment_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount_usd: Decimal,
    /// Amount in the platform's point currency
    pub amount_points: i64,
    /// pending | verified | failed | refunded
    pub status: String,
    pub integrity_hash: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub metadata: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
