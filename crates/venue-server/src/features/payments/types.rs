//! Payment read model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venue_common::Money;

use crate::db::payments::{PaymentRow, PaymentStatus};
use crate::db::DbResult;
use crate::features::reservations::ReservationView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentView {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount_cents: i64,
    /// Display form, e.g. `$150.00`
    pub amount: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentView {
    pub fn new(row: PaymentRow) -> DbResult<Self> {
        let status = row.status()?;
        Ok(Self {
            id: row.id,
            reservation_id: row.reservation_id,
            amount_cents: row.amount_cents,
            amount: Money::from_cents(row.amount_cents).to_string(),
            status,
            payment_ref: row.payment_ref,
            failure_reason: row.failure_reason,
            refund_ref: row.refund_ref,
            refunded_at: row.refunded_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Where a capture stands once the request returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    /// Charged and the reservation is confirmed
    Confirmed,
    /// The processor has not answered yet; the hold stays pending
    Processing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub outcome: PaymentOutcome,
    pub payment: PaymentView,
    pub reservation: ReservationView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_formats_amount() {
        let row = PaymentRow {
            id: Uuid::new_v4(),
            reservation_id: Uuid::new_v4(),
            amount_cents: 15_000,
            idempotency_key: "key".to_string(),
            payment_ref: None,
            status: "processing".to_string(),
            failure_reason: None,
            refund_ref: None,
            refunded_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let view = PaymentView::new(row).unwrap();
        assert_eq!(view.amount, "$150.00");
        assert_eq!(view.status, PaymentStatus::Processing);

        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["status"], "processing");
        assert!(value.get("payment_ref").is_none());
        assert!(value.get("refund_ref").is_none());
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(serde_json::to_value(PaymentOutcome::Confirmed).unwrap(), "confirmed");
        assert_eq!(serde_json::to_value(PaymentOutcome::Processing).unwrap(), "processing");
    }
}
