//! Status Transition Engine
//!
//! Moves orders through the status table in [`OrderStatus::next_statuses`],
//! appends an attributed note for every change and notifies the customer.
//! Notification is best effort: a failed dispatch is reported next to the
//! committed status change, never rolled into it.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::entities::{orders, prelude::*};
use crate::models::order::{
    BulkStatusResponse, BulkStatusResult, NotificationReport, OrderStatus, OrderView, StatusUpdateResponse,
};
use crate::services::notification::{NotificationDispatcher, format_notification};
use crate::services::order_store::{self, SYSTEM_ACTOR};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Order {0} not found")]
    OrderNotFound(String),
    #[error("Invalid transition from {from} to {to}. Valid next statuses: {}", format_statuses(.allowed))]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        allowed: Vec<OrderStatus>,
    },
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl StatusError {
    pub fn code(&self) -> &'static str {
        match self {
            StatusError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            StatusError::InvalidTransition { .. } => "INVALID_TRANSITION",
            StatusError::Database(_) => "DATABASE_ERROR",
        }
    }
}

fn format_statuses(statuses: &[OrderStatus]) -> String {
    if statuses.is_empty() {
        "none (terminal status)".to_string()
    } else {
        statuses.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    }
}

#[derive(Clone)]
pub struct StatusService {
    db: DatabaseConnection,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl StatusService {
    pub fn new(db: DatabaseConnection, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { db, dispatcher }
    }

    pub async fn update_status(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> Result<StatusUpdateResponse, StatusError> {
        self.update_status_at(order_id, new_status, notes, actor, Utc::now()).await
    }

    pub async fn update_status_at(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        notes: Option<&str>,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StatusUpdateResponse, StatusError> {
        let actor = actor.map(str::trim).filter(|a| !a.is_empty()).unwrap_or(SYSTEM_ACTOR);
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let (previous_status, order) = self.persist_transition(order_id, new_status, notes, actor, now).await?;

        info!(
            order_id = %order_id,
            from = %previous_status,
            to = %new_status,
            actor = %actor,
            "Order status updated"
        );

        let notification = self.notify(&order, new_status, notes).await;

        Ok(StatusUpdateResponse {
            order,
            previous_status,
            notification,
        })
    }

    /// Apply one status to many orders. Each id succeeds or fails on its own.
    pub async fn bulk_update_status(
        &self,
        order_ids: &[String],
        new_status: OrderStatus,
        notes: Option<&str>,
        actor: Option<&str>,
    ) -> BulkStatusResponse {
        let mut results = Vec::with_capacity(order_ids.len());

        for order_id in order_ids {
            let result = match self.update_status(order_id, new_status, notes, actor).await {
                Ok(update) => BulkStatusResult {
                    order_id: order_id.clone(),
                    success: true,
                    previous_status: Some(update.previous_status),
                    error: None,
                    notification: Some(update.notification),
                },
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "Bulk status update skipped order");
                    BulkStatusResult {
                        order_id: order_id.clone(),
                        success: false,
                        previous_status: None,
                        error: Some(e.to_string()),
                        notification: None,
                    }
                }
            };
            results.push(result);
        }

        let success_count = results.iter().filter(|r| r.success).count();
        BulkStatusResponse {
            success_count,
            failure_count: results.len() - success_count,
            results,
        }
    }

    /// Read, check and write the new status plus its note in one transaction
    async fn persist_transition(
        &self,
        order_id: &str,
        new_status: OrderStatus,
        notes: Option<&str>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(OrderStatus, OrderView), StatusError> {
        let txn = self.db.begin().await?;

        match apply_transition(&txn, order_id, new_status, notes, actor, now).await {
            Ok(result) => {
                txn.commit().await?;
                Ok(result)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }

    async fn notify(&self, order: &OrderView, status: OrderStatus, custom_message: Option<&str>) -> NotificationReport {
        let message = format_notification(order, status, custom_message);
        match self.dispatcher.dispatch(&message).await {
            Ok(()) => NotificationReport {
                delivered: true,
                error: None,
            },
            Err(e) => {
                warn!(
                    order_id = %order.id,
                    status = %status,
                    error = %e,
                    "Status updated but customer notification failed"
                );
                NotificationReport {
                    delivered: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

async fn apply_transition(
    txn: &DatabaseTransaction,
    order_id: &str,
    new_status: OrderStatus,
    notes: Option<&str>,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<(OrderStatus, OrderView), StatusError> {
    let order = Orders::find_by_id(order_id.to_string())
        .one(txn)
        .await?
        .ok_or_else(|| StatusError::OrderNotFound(order_id.to_string()))?;

    let current = order_store::parse_status(&order)?;
    if !current.can_transition_to(new_status) {
        return Err(StatusError::InvalidTransition {
            from: current,
            to: new_status,
            allowed: current.next_statuses().to_vec(),
        });
    }

    let mut active: orders::ActiveModel = order.into();
    active.status = Set(new_status.as_str().to_string());
    active.updated_at = Set(now.into());
    active.update(txn).await?;

    let mut body = format!("Status changed from {} to {}", current, new_status);
    if let Some(notes) = notes {
        body.push_str(": ");
        body.push_str(notes);
    }
    order_store::append_note(txn, order_id, actor, &body, now).await?;

    let view = order_store::load_order(txn, order_id)
        .await?
        .ok_or_else(|| StatusError::OrderNotFound(order_id.to_string()))?;

    Ok((current, view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_names_alternatives() {
        let err = StatusError::InvalidTransition {
            from: OrderStatus::Placed,
            to: OrderStatus::Delivered,
            allowed: OrderStatus::Placed.next_statuses().to_vec(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition from placed to delivered. Valid next statuses: received, cancelled"
        );
    }

    #[test]
    fn test_terminal_transition_message() {
        let err = StatusError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::InProgress,
            allowed: vec![],
        };
        assert!(err.to_string().ends_with("none (terminal status)"));
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }
}
