//! Payment transaction record models

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Pending,
    Verified,
    Failed,
    Refunded,
}

impl PaymentRecordStatus {
    pub const ALL: [PaymentRecordStatus; 4] = [
        PaymentRecordStatus::Pending,
        PaymentRecordStatus::Verified,
        PaymentRecordStatus::Failed,
        PaymentRecordStatus::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Verified => "verified",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        }
    }

    pub fn can_transition_to(self, next: PaymentRecordStatus) -> bool {
        matches!(
            (self, next),
            (PaymentRecordStatus::Pending, PaymentRecordStatus::Verified)
                | (PaymentRecordStatus::Pending, PaymentRecordStatus::Failed)
                | (PaymentRecordStatus::Verified, PaymentRecordStatus::Refunded)
        )
    }
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentRecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentRecordStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown payment record status '{}'", s))
    }
}

/// Request to open an invoice (POST /api/payments)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount_usd: Decimal,
    #[serde(default)]
    pub external_payment_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub external_payment_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailPaymentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub transaction_id: String,
    pub order_id: Option<String>,
    pub external_payment_id: Option<String>,
    pub amount_usd: Decimal,
    pub amount_points: i64,
    pub status: PaymentRecordStatus,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_record_transitions() {
        use PaymentRecordStatus::*;
        assert!(Pending.can_transition_to(Verified));
        assert!(Pending.can_transition_to(Failed));
        assert!(Verified.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Verified));
        assert!(!Refunded.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Refunded));
    }
}
