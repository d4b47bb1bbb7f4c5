//! Capture payment command
//!
//! Charges the customer for a pending, unexpired hold. The `payments` row is
//! committed in `processing` before the processor is called; that row is the
//! at-most-once guard and its id is the processor idempotency key.

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{Money, ReservationStatus, Transition, TransitionError};

use crate::audit::AuditAction;
use crate::config::BookingConfig;
use crate::db::{self, reservations::EXPIRED_REASON, DbError};
use crate::features::payments::settle::{self, SettlementError};
use crate::features::payments::types::PaymentResult;
use crate::features::shared::error_helpers::map_unique_violation;
use crate::processor::{CaptureRequest, PaymentProcessor};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturePaymentCommand {
    pub reservation_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum CapturePaymentError {
    #[error("Reservation '{0}' not found")]
    NotFound(Uuid),

    #[error("Reservation is {0}; only pending reservations can be paid")]
    NotPending(ReservationStatus),

    #[error("Hold on reservation '{0}' has expired")]
    HoldExpired(Uuid),

    #[error("A payment for reservation '{0}' is already being processed")]
    PaymentInProgress(Uuid),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<PaymentResult, CapturePaymentError>> for CapturePaymentCommand {}

impl crate::cqrs::middleware::Command for CapturePaymentCommand {}

#[tracing::instrument(
    skip(pool, booking, processor, command),
    fields(reservation_id = %command.reservation_id, processor = processor.name())
)]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    command: CapturePaymentCommand,
) -> Result<PaymentResult, CapturePaymentError> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let row = db::reservations::fetch_for_update(&mut tx, command.reservation_id)
        .await?
        .ok_or(CapturePaymentError::NotFound(command.reservation_id))?;

    let status = row.status()?;
    let context = row.transition_context(booking.cancellation_notice(), now)?;
    match status.apply(&Transition::Expire, &context) {
        Ok(expired) => {
            db::reservations::record_transition(
                &mut tx,
                &row,
                expired,
                AuditAction::Expire,
                Some(EXPIRED_REASON),
                now,
            )
            .await?;
            tx.commit().await?;
            return Err(CapturePaymentError::HoldExpired(row.id));
        },
        Err(TransitionError::HoldStillActive) => {},
        Err(_) => return Err(CapturePaymentError::NotPending(status)),
    }

    let payment = db::payments::insert_processing(&mut tx, row.id, row.total_price_cents)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                CapturePaymentError::PaymentInProgress(row.id),
                CapturePaymentError::Database,
            )
        })?;

    tx.commit().await?;

    tracing::info!(payment_id = %payment.id, amount_cents = payment.amount_cents, "Capturing payment");

    let request = CaptureRequest {
        amount: Money::from_cents(payment.amount_cents),
        reservation_id: row.id,
        idempotency_key: payment.idempotency_key.clone(),
    };
    let reply = tokio::time::timeout(booking.payment_timeout(), processor.capture(&request)).await;

    Ok(settle::resolve(&pool, booking, processor, payment, reply).await?)
}
