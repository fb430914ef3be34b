//! SeaORM Entity for orders

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// UUID v4 string
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Chat/user id of the customer, also the notification recipient
    pub customer_id: String,
    pub customer_name: String,
    pub delivery_address: String,
    pub phone: Option<String>,
    /// Sum of the item totals at creation time
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    /// placed | received | in_progress | out_for_delivery | delivered | cancelled
    pub status: String,
    /// pending | completed | failed
    pub payment_status: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_items::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_notes::Entity")]
    OrderNotes,
}

impl Related<super::order_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_notes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderNotes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
