//! Refund payment command
//!
//! Returns a succeeded charge to the customer once its reservation is
//! cancelled. The processor call is keyed by `refund-{payment_id}`, so a
//! retried refund never returns the money twice. Settlement and cancellation
//! call [`refund_charge`] on their own after committing.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{Money, ReservationStatus};

use crate::audit::{self, AuditAction, CreateAuditEntry, ResourceType};
use crate::config::BookingConfig;
use crate::db::{
    self,
    payments::{PaymentRow, PaymentStatus},
    DbError,
};
use crate::features::payments::types::PaymentView;
use crate::processor::{PaymentProcessor, ProcessorError, RefundRequest, RefundStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundPaymentCommand {
    pub payment_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum RefundPaymentError {
    #[error("Payment '{0}' not found")]
    NotFound(Uuid),

    #[error("Payment is {status}; only succeeded payments can be refunded")]
    NotRefundable { payment_id: Uuid, status: PaymentStatus },

    #[error("Reservation '{0}' is still active; cancel it before refunding")]
    ReservationActive(Uuid),

    #[error("Refund of payment '{payment_id}' declined: {reason}")]
    Declined { payment_id: Uuid, reason: String },

    #[error("Refund of payment '{0}' timed out")]
    Timeout(Uuid),

    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<PaymentView, RefundPaymentError>> for RefundPaymentCommand {}

impl crate::cqrs::middleware::Command for RefundPaymentCommand {}

/// Processor idempotency key for refunding `payment_id`
pub fn refund_key(payment_id: Uuid) -> String {
    format!("refund-{payment_id}")
}

#[tracing::instrument(
    skip(pool, booking, processor, command),
    fields(payment_id = %command.payment_id, processor = processor.name())
)]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    command: RefundPaymentCommand,
) -> Result<PaymentView, RefundPaymentError> {
    let payment = db::payments::fetch(&pool, command.payment_id)
        .await?
        .ok_or(RefundPaymentError::NotFound(command.payment_id))?;

    match payment.status()? {
        PaymentStatus::Refunded => return Ok(PaymentView::new(payment)?),
        PaymentStatus::Succeeded => {},
        status => {
            return Err(RefundPaymentError::NotRefundable {
                payment_id: payment.id,
                status,
            })
        },
    }

    let reservation = db::reservations::fetch(&pool, payment.reservation_id)
        .await?
        .ok_or_else(|| {
            DbError::corrupt(
                "payments",
                format!("payment {} references missing reservation {}", payment.id, payment.reservation_id),
            )
        })?;
    // Cancelled is terminal, so the check cannot go stale
    if reservation.status()? != ReservationStatus::Cancelled {
        return Err(RefundPaymentError::ReservationActive(reservation.id));
    }

    let refunded = refund_charge(&pool, booking, processor, &payment).await?;
    Ok(PaymentView::new(refunded)?)
}

/// Ask the processor to return `payment` and record the refund.
///
/// `payment` must be succeeded. Returns the stored row, which a concurrent
/// refund of the same charge may have written first.
pub(crate) async fn refund_charge(
    pool: &PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    payment: &PaymentRow,
) -> Result<PaymentRow, RefundPaymentError> {
    let payment_ref = payment
        .payment_ref
        .clone()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| {
            DbError::corrupt("payments", format!("succeeded payment {} has no payment_ref", payment.id))
        })?;

    let request = RefundRequest {
        payment_ref,
        amount: Money::from_cents(payment.amount_cents),
        idempotency_key: refund_key(payment.id),
    };

    let status = tokio::time::timeout(booking.payment_timeout(), processor.refund(&request))
        .await
        .map_err(|_| RefundPaymentError::Timeout(payment.id))??;

    let refund_ref = match status {
        RefundStatus::Refunded { refund_ref } => refund_ref,
        RefundStatus::Declined { reason } => {
            tracing::warn!(payment_id = %payment.id, reason = %reason, "Refund declined");
            return Err(RefundPaymentError::Declined {
                payment_id: payment.id,
                reason,
            });
        },
    };

    let mut tx = pool.begin().await?;
    let Some(refunded) = db::payments::mark_refunded(&mut *tx, payment.id, &refund_ref).await? else {
        tx.commit().await?;
        return db::payments::fetch(pool, payment.id)
            .await?
            .ok_or(RefundPaymentError::NotFound(payment.id));
    };

    audit::record_in_tx(
        &mut tx,
        CreateAuditEntry::new(AuditAction::Refund, ResourceType::Payment)
            .resource_id(payment.id)
            .changes(serde_json::json!({ "from": "succeeded", "to": "refunded" }))
            .metadata(serde_json::json!({
                "source": "lifecycle",
                "reservation_id": payment.reservation_id,
                "refund_ref": refund_ref,
            })),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        refund_ref = %refund_ref,
        amount_cents = payment.amount_cents,
        "Payment refunded"
    );

    Ok(refunded)
}
