//! Data-access helpers for orders, their items and note log
//!
//! Generic over `ConnectionTrait` so the same helpers run on a pooled
//! connection or inside an open transaction.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::collections::HashMap;

use crate::entities::{order_items, order_notes, orders, prelude::*, products};
use crate::models::order::{OrderItemView, OrderNoteView, OrderStatus, OrderView, PaymentStatus};
use crate::services::price_utils::money;

/// Author recorded on notes written without an explicit actor
pub const SYSTEM_ACTOR: &str = "system";

/// Author recorded on the note a customer leaves at checkout
pub const CUSTOMER_ACTOR: &str = "customer";

pub fn parse_status(order: &orders::Model) -> Result<OrderStatus, DbErr> {
    order
        .status
        .parse()
        .map_err(|e: String| DbErr::Type(format!("order {}: {}", order.id, e)))
}

pub fn parse_payment_status(order: &orders::Model) -> Result<PaymentStatus, DbErr> {
    order
        .payment_status
        .parse()
        .map_err(|e: String| DbErr::Type(format!("order {}: {}", order.id, e)))
}

/// Load an order with items (including product names) and notes
pub async fn load_order<C: ConnectionTrait>(db: &C, order_id: &str) -> Result<Option<OrderView>, DbErr> {
    let Some(order) = Orders::find_by_id(order_id.to_string()).one(db).await? else {
        return Ok(None);
    };

    let items = OrderItems::find()
        .filter(order_items::Column::OrderId.eq(order_id))
        .order_by_asc(order_items::Column::Id)
        .find_also_related(Products)
        .all(db)
        .await?;

    let notes = OrderNotes::find()
        .filter(order_notes::Column::OrderId.eq(order_id))
        .order_by_asc(order_notes::Column::CreatedAt)
        .order_by_asc(order_notes::Column::Id)
        .all(db)
        .await?;

    build_view(order, items, notes).map(Some)
}

/// Assemble an [`OrderView`] from rows already fetched
pub fn build_view(
    order: orders::Model,
    items: Vec<(order_items::Model, Option<products::Model>)>,
    notes: Vec<order_notes::Model>,
) -> Result<OrderView, DbErr> {
    let status = parse_status(&order)?;
    let payment_status = parse_payment_status(&order)?;

    let items = items
        .into_iter()
        .map(|(item, product)| OrderItemView {
            id: item.id,
            product_id: item.product_id,
            product_name: product
                .map(|p| p.name)
                .unwrap_or_else(|| format!("Product #{}", item.product_id)),
            quantity: item.quantity,
            unit_price: money(item.unit_price),
            total_price: money(item.total_price),
        })
        .collect();

    let notes = notes
        .into_iter()
        .map(|note| OrderNoteView {
            author: note.author,
            body: note.body,
            created_at: note.created_at,
        })
        .collect();

    Ok(OrderView {
        id: order.id,
        customer_id: order.customer_id,
        customer_name: order.customer_name,
        delivery_address: order.delivery_address,
        phone: order.phone,
        total_amount: money(order.total_amount),
        status,
        payment_status,
        items,
        notes,
        created_at: order.created_at,
        updated_at: order.updated_at,
    })
}

/// Append an entry to an order's note log. Entries are never rewritten.
pub async fn append_note<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
    author: &str,
    body: &str,
    at: DateTime<Utc>,
) -> Result<order_notes::Model, DbErr> {
    order_notes::ActiveModel {
        order_id: Set(order_id.to_string()),
        author: Set(author.to_string()),
        body: Set(body.to_string()),
        created_at: Set(at.into()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Count line items per order for a page of orders
pub async fn item_counts<C: ConnectionTrait>(db: &C, order_ids: &[String]) -> Result<HashMap<String, u64>, DbErr> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let items = OrderItems::find()
        .filter(order_items::Column::OrderId.is_in(order_ids.iter().cloned()))
        .all(db)
        .await?;

    let mut counts: HashMap<String, u64> = HashMap::new();
    for item in items {
        *counts.entry(item.order_id).or_insert(0) += 1;
    }
    Ok(counts)
}

/// Set an order's payment status
pub async fn set_payment_status<C: ConnectionTrait>(
    db: &C,
    order_id: &str,
    payment_status: PaymentStatus,
    at: DateTime<Utc>,
) -> Result<bool, DbErr> {
    let Some(order) = Orders::find_by_id(order_id.to_string()).one(db).await? else {
        return Ok(false);
    };

    let mut active: orders::ActiveModel = order.into();
    active.payment_status = Set(payment_status.as_str().to_string());
    active.updated_at = Set(at.into());
    active.update(db).await?;
    Ok(true)
}
