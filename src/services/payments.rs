//! Payment transaction records
//!
//! An invoice is opened before checkout; its transaction id is the `TXN_`
//! token the order must present. Every record carries a keyed SHA-256 over its
//! business fields, checked before any read or mutation and resealed on write.
//! Records link to orders through `consumed_tokens`: the order transaction
//! spends the `TXN_` token and payment outcomes follow that link.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait, Unchanged,
};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::entities::{consumed_tokens, payment_transactions, prelude::*};
use crate::models::order::{OrderView, PaymentStatus};
use crate::models::payment::{CreatePaymentRequest, PaymentRecordStatus, PaymentView};
use crate::services::order_store;
use crate::services::preconditions::{self, TokenKind};
use crate::services::price_utils::{canonical, money, points_for_usd};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment transaction {0} not found")]
    NotFound(String),
    #[error("Order {0} not found")]
    OrderNotFound(String),
    #[error("Order {0} has no payment token on record")]
    OrderNotLinked(String),
    #[error("{0}")]
    Validation(String),
    #[error("Payment {transaction_id} cannot move from {from} to {to}")]
    InvalidTransition {
        transaction_id: String,
        from: PaymentRecordStatus,
        to: PaymentRecordStatus,
    },
    #[error("Payment {0} failed its integrity check")]
    IntegrityViolation(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::NotFound(_) => "PAYMENT_NOT_FOUND",
            PaymentError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            PaymentError::OrderNotLinked(_) => "PAYMENT_NOT_LINKED",
            PaymentError::Validation(_) => "VALIDATION_ERROR",
            PaymentError::InvalidTransition { .. } => "INVALID_PAYMENT_TRANSITION",
            PaymentError::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            PaymentError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Keyed hash over every business field of a record
pub fn integrity_hash(secret: &str, record: &payment_transactions::Model) -> String {
    let metadata = record
        .metadata
        .as_ref()
        .map(|m| m.to_string())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    for part in [
        secret,
        record.transaction_id.as_str(),
        record.order_id.as_deref().unwrap_or(""),
        record.external_payment_id.as_deref().unwrap_or(""),
        &canonical(record.amount_usd),
        &record.amount_points.to_string(),
        record.status.as_str(),
        &metadata,
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    hex::encode(hasher.finalize())
}

fn to_view(record: payment_transactions::Model) -> Result<PaymentView, DbErr> {
    let status = record
        .status
        .parse()
        .map_err(|e: String| DbErr::Type(format!("payment {}: {}", record.transaction_id, e)))?;

    Ok(PaymentView {
        transaction_id: record.transaction_id,
        order_id: record.order_id,
        external_payment_id: record.external_payment_id,
        amount_usd: money(record.amount_usd),
        amount_points: record.amount_points,
        status,
        metadata: record.metadata,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

#[derive(Clone)]
pub struct PaymentService {
    db: DatabaseConnection,
    secret: String,
    points_per_usd: Decimal,
}

impl PaymentService {
    pub fn new(db: DatabaseConnection, secret: String, points_per_usd: Decimal) -> Self {
        Self {
            db,
            secret,
            points_per_usd,
        }
    }

    /// Open a pending invoice and hand back its `TXN_` transaction id
    pub async fn create_invoice(&self, request: &CreatePaymentRequest) -> Result<PaymentView, PaymentError> {
        if request.amount_usd <= Decimal::ZERO {
            return Err(PaymentError::Validation(format!(
                "Payment amount must be positive, got {}",
                request.amount_usd
            )));
        }

        let now = Utc::now();
        let amount_usd = money(request.amount_usd);
        let transaction_id = preconditions::issue(TokenKind::Payment, now, &uuid::Uuid::new_v4().to_string());

        let mut record = payment_transactions::Model {
            transaction_id: transaction_id.clone(),
            order_id: None,
            external_payment_id: request
                .external_payment_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            amount_usd,
            amount_points: points_for_usd(amount_usd, self.points_per_usd),
            status: PaymentRecordStatus::Pending.as_str().to_string(),
            integrity_hash: String::new(),
            metadata: request.metadata.clone(),
            created_at: now.into(),
            updated_at: now.into(),
        };
        record.integrity_hash = integrity_hash(&self.secret, &record);

        let active: payment_transactions::ActiveModel = record.into();
        let inserted = active.insert(&self.db).await?;

        info!(
            transaction_id = %transaction_id,
            amount_usd = %amount_usd,
            amount_points = inserted.amount_points,
            "Payment invoice created"
        );
        Ok(to_view(inserted)?)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<PaymentView, PaymentError> {
        let record = self.load_verified(&self.db, transaction_id, false).await?;
        Ok(to_view(record)?)
    }

    /// pending → verified; the order that spent this token becomes `completed`
    pub async fn verify(
        &self,
        transaction_id: &str,
        external_payment_id: Option<&str>,
    ) -> Result<PaymentView, PaymentError> {
        let external = external_payment_id.map(str::trim).filter(|id| !id.is_empty());
        self.transition(transaction_id, PaymentRecordStatus::Verified, external).await
    }

    /// pending → failed; the order that spent this token becomes `failed`
    pub async fn fail(&self, transaction_id: &str, reason: Option<&str>) -> Result<PaymentView, PaymentError> {
        let view = self.transition(transaction_id, PaymentRecordStatus::Failed, None).await?;
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            warn!(transaction_id = %transaction_id, reason = %reason, "Payment marked failed");
        }
        Ok(view)
    }

    /// verified → refunded. The order's payment status is left as is.
    pub async fn refund(&self, transaction_id: &str) -> Result<PaymentView, PaymentError> {
        self.transition(transaction_id, PaymentRecordStatus::Refunded, None).await
    }

    /// Pull the outcome of the payment an order was placed with onto the order
    pub async fn confirm_order_payment(&self, order_id: &str) -> Result<OrderView, PaymentError> {
        let txn = self.db.begin().await?;
        match self.sync_order(&txn, order_id).await {
            Ok(order) => {
                txn.commit().await?;
                Ok(order)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }

    async fn sync_order(&self, txn: &DatabaseTransaction, order_id: &str) -> Result<OrderView, PaymentError> {
        if Orders::find_by_id(order_id.to_string()).one(txn).await?.is_none() {
            return Err(PaymentError::OrderNotFound(order_id.to_string()));
        }

        let token = ConsumedTokens::find()
            .filter(consumed_tokens::Column::OrderId.eq(order_id))
            .filter(consumed_tokens::Column::Kind.eq(TokenKind::Payment.as_str()))
            .one(txn)
            .await?
            .ok_or_else(|| PaymentError::OrderNotLinked(order_id.to_string()))?;

        let mut record = self.load_verified(txn, &token.token, true).await?;
        let status: PaymentRecordStatus = record
            .status
            .parse()
            .map_err(|e: String| DbErr::Type(format!("payment {}: {}", record.transaction_id, e)))?;

        if record.order_id.as_deref() != Some(order_id) {
            record.order_id = Some(order_id.to_string());
            self.reseal(txn, record).await?;
        }

        if let Some(payment_status) = order_payment_status(status) {
            order_store::set_payment_status(txn, order_id, payment_status, Utc::now()).await?;
        }

        order_store::load_order(txn, order_id)
            .await?
            .ok_or_else(|| PaymentError::OrderNotFound(order_id.to_string()))
    }

    async fn transition(
        &self,
        transaction_id: &str,
        to: PaymentRecordStatus,
        external_payment_id: Option<&str>,
    ) -> Result<PaymentView, PaymentError> {
        let txn = self.db.begin().await?;
        match self.apply_transition(&txn, transaction_id, to, external_payment_id).await {
            Ok(view) => {
                txn.commit().await?;
                info!(transaction_id = %transaction_id, status = %to, "Payment status updated");
                Ok(view)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }

    async fn apply_transition(
        &self,
        txn: &DatabaseTransaction,
        transaction_id: &str,
        to: PaymentRecordStatus,
        external_payment_id: Option<&str>,
    ) -> Result<PaymentView, PaymentError> {
        let mut record = self.load_verified(txn, transaction_id, true).await?;
        let from: PaymentRecordStatus = record
            .status
            .parse()
            .map_err(|e: String| DbErr::Type(format!("payment {}: {}", transaction_id, e)))?;

        if !from.can_transition_to(to) {
            return Err(PaymentError::InvalidTransition {
                transaction_id: transaction_id.to_string(),
                from,
                to,
            });
        }

        let linked_order = ConsumedTokens::find_by_id(transaction_id.to_string())
            .one(txn)
            .await?
            .map(|t| t.order_id);

        record.status = to.as_str().to_string();
        if let Some(external) = external_payment_id {
            record.external_payment_id = Some(external.to_string());
        }
        if linked_order.is_some() {
            record.order_id = linked_order.clone();
        }
        let updated = self.reseal(txn, record).await?;

        if let (Some(order_id), Some(payment_status)) = (linked_order, order_payment_status(to)) {
            order_store::set_payment_status(txn, &order_id, payment_status, Utc::now()).await?;
            info!(order_id = %order_id, payment_status = %payment_status, "Order payment status synced");
        }

        Ok(to_view(updated)?)
    }

    /// Load a record and check its hash. `lock` takes the row for update.
    async fn load_verified<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: &str,
        lock: bool,
    ) -> Result<payment_transactions::Model, PaymentError> {
        let mut select = PaymentTransactions::find_by_id(transaction_id.to_string());
        if lock {
            select = select.lock_exclusive();
        }
        let record = select
            .one(db)
            .await?
            .ok_or_else(|| PaymentError::NotFound(transaction_id.to_string()))?;

        if integrity_hash(&self.secret, &record) != record.integrity_hash {
            error!(transaction_id = %transaction_id, "Payment record integrity hash mismatch");
            return Err(PaymentError::IntegrityViolation(transaction_id.to_string()));
        }
        Ok(record)
    }

    async fn reseal(
        &self,
        txn: &DatabaseTransaction,
        mut record: payment_transactions::Model,
    ) -> Result<payment_transactions::Model, DbErr> {
        record.updated_at = Utc::now().into();
        let hash = integrity_hash(&self.secret, &record);

        payment_transactions::ActiveModel {
            transaction_id: Unchanged(record.transaction_id),
            order_id: Set(record.order_id),
            external_payment_id: Set(record.external_payment_id),
            status: Set(record.status),
            integrity_hash: Set(hash),
            updated_at: Set(record.updated_at),
            ..Default::default()
        }
        .update(txn)
        .await
    }
}

/// Order-level payment status implied by a record status
fn order_payment_status(status: PaymentRecordStatus) -> Option<PaymentStatus> {
    match status {
        PaymentRecordStatus::Verified => Some(PaymentStatus::Completed),
        PaymentRecordStatus::Failed => Some(PaymentStatus::Failed),
        PaymentRecordStatus::Pending | PaymentRecordStatus::Refunded => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use rust_decimal_macros::dec;

    fn record() -> payment_transactions::Model {
        let ts = DateTime::parse_from_rfc3339("2026-10-17T12:00:00+00:00").unwrap();
        payment_transactions::Model {
            transaction_id: "TXN_20261017_120000_ABCDEF12".to_string(),
            order_id: None,
            external_payment_id: Some("ext-1".to_string()),
            amount_usd: dec!(12.50),
            amount_points: 625,
            status: "pending".to_string(),
            integrity_hash: String::new(),
            metadata: Some(serde_json::json!({"channel": "chat"})),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_hash_is_stable_across_decimal_scale() {
        let a = record();
        let mut b = record();
        b.amount_usd = dec!(12.5);
        assert_eq!(integrity_hash("s3cret", &a), integrity_hash("s3cret", &b));
        assert_eq!(integrity_hash("s3cret", &a).len(), 64);
    }

    #[test]
    fn test_hash_covers_business_fields() {
        let base = integrity_hash("s3cret", &record());

        let mut tampered = record();
        tampered.status = "verified".to_string();
        assert_ne!(integrity_hash("s3cret", &tampered), base);

        let mut tampered = record();
        tampered.amount_points = 1;
        assert_ne!(integrity_hash("s3cret", &tampered), base);

        let mut tampered = record();
        tampered.order_id = Some("x".to_string());
        assert_ne!(integrity_hash("s3cret", &tampered), base);

        assert_ne!(integrity_hash("other", &record()), base);
    }

    #[test]
    fn test_order_payment_status_mapping() {
        assert_eq!(order_payment_status(PaymentRecordStatus::Verified), Some(PaymentStatus::Completed));
        assert_eq!(order_payment_status(PaymentRecordStatus::Failed), Some(PaymentStatus::Failed));
        assert_eq!(order_payment_status(PaymentRecordStatus::Refunded), None);
    }
}
