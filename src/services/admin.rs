//! Read-side queries for the operator console

use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
    sea_query::{Expr, Func, LikeExpr},
};
use std::collections::BTreeMap;

use crate::entities::{orders, prelude::*};
use crate::models::admin::{
    OrderDetailResponse, OrderListEntry, OrderListQuery, OrderListResponse, OrderStatistics, StatsQuery,
};
use crate::models::order::{OrderStatus, PaymentStatus};
use crate::services::order_store;
use crate::services::price_utils::money;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Clone)]
pub struct AdminService {
    db: DatabaseConnection,
}

impl AdminService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Newest orders first, filtered and paginated
    pub async fn list_orders(&self, query: &OrderListQuery) -> Result<OrderListResponse, DbErr> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut condition = Condition::all();
        if let Some(status) = query.status {
            condition = condition.add(orders::Column::Status.eq(status.as_str()));
        }
        if let Some(from) = query.from {
            condition = condition.add(orders::Column::CreatedAt.gte(from));
        }
        if let Some(to) = query.to {
            condition = condition.add(orders::Column::CreatedAt.lte(to));
        }
        if let Some(customer) = query.customer.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let pattern = format!("%{}%", escape_like(&customer.to_lowercase()));
            condition = condition.add(
                Expr::expr(Func::lower(Expr::col(orders::Column::CustomerName)))
                    .like(LikeExpr::new(pattern).escape('\\')),
            );
        }

        let select = Orders::find().filter(condition);
        let total = select.clone().count(&self.db).await?;

        let page = select
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.db)
            .await?;

        let ids: Vec<String> = page.iter().map(|o| o.id.clone()).collect();
        let counts = order_store::item_counts(&self.db, &ids).await?;

        let orders = page
            .into_iter()
            .map(|order| {
                let status = order_store::parse_status(&order)?;
                let payment_status = order_store::parse_payment_status(&order)?;
                Ok(OrderListEntry {
                    item_count: counts.get(&order.id).copied().unwrap_or(0),
                    id: order.id,
                    customer_id: order.customer_id,
                    customer_name: order.customer_name,
                    total_amount: money(order.total_amount),
                    status,
                    payment_status,
                    created_at: order.created_at,
                })
            })
            .collect::<Result<Vec<_>, DbErr>>()?;

        Ok(OrderListResponse {
            orders,
            total,
            limit,
            offset,
        })
    }

    pub async fn order_detail(&self, order_id: &str) -> Result<Option<OrderDetailResponse>, DbErr> {
        let Some(order) = order_store::load_order(&self.db, order_id).await? else {
            return Ok(None);
        };

        Ok(Some(OrderDetailResponse {
            valid_next_statuses: order.status.next_statuses().to_vec(),
            order,
        }))
    }

    /// Counts per status and payment status plus order value, optionally
    /// restricted to a creation-time window
    pub async fn statistics(&self, query: &StatsQuery) -> Result<OrderStatistics, DbErr> {
        let mut window = Condition::all();
        if let Some(from) = query.from {
            window = window.add(orders::Column::CreatedAt.gte(from));
        }
        if let Some(to) = query.to {
            window = window.add(orders::Column::CreatedAt.lte(to));
        }

        let groups: Vec<(String, String, i64)> = Orders::find()
            .select_only()
            .column(orders::Column::Status)
            .column(orders::Column::PaymentStatus)
            .column_as(Expr::col(orders::Column::Id).count(), "orders")
            .filter(window.clone())
            .group_by(orders::Column::Status)
            .group_by(orders::Column::PaymentStatus)
            .into_tuple()
            .all(&self.db)
            .await?;

        // SQLite's SUM over decimals yields a float; amounts are summed as Decimal
        let amounts: Vec<Decimal> = Orders::find()
            .select_only()
            .column(orders::Column::TotalAmount)
            .filter(window)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut by_status: BTreeMap<String, u64> =
            OrderStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut by_payment_status: BTreeMap<String, u64> =
            PaymentStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();
        let mut total_orders: u64 = 0;

        for (status, payment_status, count) in groups {
            let count = u64::try_from(count).unwrap_or(0);
            *by_status.entry(status).or_insert(0) += count;
            *by_payment_status.entry(payment_status).or_insert(0) += count;
            total_orders += count;
        }

        let total_value: Decimal = amounts.into_iter().sum();
        let average_value = if total_orders == 0 {
            Decimal::ZERO
        } else {
            total_value / Decimal::from(total_orders)
        };

        Ok(OrderStatistics {
            total_orders,
            by_status,
            by_payment_status,
            total_value: money(total_value),
            average_value: money(average_value),
        })
    }
}

/// Escape `LIKE` wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("dana"), "dana");
        assert_eq!(escape_like("100%_off"), "100\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
