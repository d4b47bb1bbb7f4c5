//! Applying a processor answer to the local payment and reservation rows
//!
//! Shared by the capture and late-confirmation paths. A successful charge
//! re-takes the space lock, then the reservation lock, and confirms inside one
//! transaction. Status changes go through the reservation lifecycle. If the
//! hold ran out or the slot went to someone else while the processor was
//! working, the payment is recorded as succeeded, the reservation cancelled,
//! and the charge refunded once the transaction has committed.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::error::Elapsed;
use uuid::Uuid;
use venue_common::{BookingPolicy, ReservationStatus, Schedule, Transition, TransitionError};

use super::commands::refund::refund_charge;
use super::types::{PaymentOutcome, PaymentResult, PaymentView};
use crate::audit::AuditAction;
use crate::config::BookingConfig;
use crate::db::{
    self,
    payments::{PaymentRow, PaymentStatus},
    reservations::EXPIRED_REASON,
    DbError,
};
use crate::features::reservations::types::fetch_detail;
use crate::processor::{CaptureStatus, PaymentProcessor, ProcessorError};

/// Stored on reservations that lost their slot before the charge settled
pub const SLOT_TAKEN_REASON: &str = "slot taken before payment settled";

/// Reason stored on a payment the processor has never heard of
pub const UNKNOWN_CAPTURE_REASON: &str = "processor has no record of this capture";

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("Payment declined: {reason}")]
    Declined { payment_id: Uuid, reason: String },

    #[error("Hold on reservation '{reservation_id}' expired before the payment settled")]
    HoldExpired {
        reservation_id: Uuid,
        payment_id: Uuid,
        payment_ref: String,
        /// Whether the charge was returned automatically
        refunded: bool,
    },

    #[error("Slot of reservation '{reservation_id}' was taken by '{conflicting_reservation_id}' before the payment settled")]
    SlotTaken {
        reservation_id: Uuid,
        conflicting_reservation_id: Uuid,
        payment_id: Uuid,
        payment_ref: String,
        refunded: bool,
    },

    #[error("Reservation '{reservation_id}' was cancelled after payment '{payment_id}'")]
    ReservationCancelled {
        reservation_id: Uuid,
        payment_id: Uuid,
        refunded: bool,
    },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Apply whatever the processor said (or failed to say in time) to `payment`
pub(crate) async fn resolve(
    pool: &PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    payment: PaymentRow,
    reply: Result<Result<CaptureStatus, ProcessorError>, Elapsed>,
) -> Result<PaymentResult, SettlementError> {
    let status = match reply {
        Ok(Ok(status)) => status,
        Ok(Err(ProcessorError::UnknownCapture(key))) => {
            tracing::warn!(payment_id = %payment.id, key = %key, "Processor does not know capture");
            db::payments::mark_failed(pool, payment.id, UNKNOWN_CAPTURE_REASON).await?;
            return Err(SettlementError::Declined {
                payment_id: payment.id,
                reason: UNKNOWN_CAPTURE_REASON.to_string(),
            });
        },
        Ok(Err(e)) => {
            // The charge may or may not have happened; leave it for confirmation
            tracing::warn!(payment_id = %payment.id, error = %e, "Capture outcome unknown");
            CaptureStatus::Processing
        },
        Err(_) => {
            tracing::warn!(
                payment_id = %payment.id,
                timeout_secs = booking.payment_timeout_secs,
                "Capture timed out; payment left processing"
            );
            CaptureStatus::Processing
        },
    };

    match status {
        CaptureStatus::Processing => {
            current_result(pool, PaymentOutcome::Processing, payment).await
        },
        CaptureStatus::Declined { reason } => {
            db::payments::mark_failed(pool, payment.id, &reason).await?;
            tracing::info!(payment_id = %payment.id, reason = %reason, "Payment declined");
            Err(SettlementError::Declined {
                payment_id: payment.id,
                reason,
            })
        },
        CaptureStatus::Succeeded { payment_ref } => {
            settle_success(pool, booking, processor, payment, &payment_ref, Utc::now()).await
        },
    }
}

/// Report a payment that already settled, from whatever the reservation became
pub(crate) async fn settled_result(
    pool: &PgPool,
    payment: PaymentRow,
) -> Result<PaymentResult, SettlementError> {
    let reservation = db::reservations::fetch(pool, payment.reservation_id)
        .await?
        .ok_or_else(|| missing_reservation(&payment))?;

    match reservation.status()? {
        ReservationStatus::Confirmed => current_result(pool, PaymentOutcome::Confirmed, payment).await,
        _ => Err(SettlementError::ReservationCancelled {
            reservation_id: reservation.id,
            payment_id: payment.id,
            refunded: payment.status()? == PaymentStatus::Refunded,
        }),
    }
}

async fn settle_success(
    pool: &PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    payment: PaymentRow,
    payment_ref: &str,
    now: DateTime<Utc>,
) -> Result<PaymentResult, SettlementError> {
    let space_id = db::reservations::fetch(pool, payment.reservation_id)
        .await?
        .ok_or_else(|| missing_reservation(&payment))?
        .space_id;

    let mut tx = pool.begin().await?;

    db::reservations::lock_space(&mut tx, space_id).await?;
    let row = db::reservations::fetch_for_update(&mut tx, payment.reservation_id)
        .await?
        .ok_or_else(|| missing_reservation(&payment))?;

    let Some(payment) = db::payments::mark_succeeded(&mut tx, payment.id, payment_ref).await? else {
        // A concurrent confirmation got here first
        tx.commit().await?;
        let settled = db::payments::fetch(pool, payment.id)
            .await?
            .ok_or(DbError::Sqlx(sqlx::Error::RowNotFound))?;
        return settled_result(pool, settled).await;
    };

    let status = row.status()?;
    let context = row.transition_context(booking.cancellation_notice(), now)?;

    // Only expiry moves a pending row while its capture is in flight
    let released = match status.apply(&Transition::Expire, &context) {
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
            true
        },
        Err(TransitionError::HoldStillActive) => false,
        Err(_) => true,
    };
    if released {
        tx.commit().await?;
        tracing::warn!(reservation_id = %row.id, %status, payment_ref, "Charge settled after hold was released");
        let refunded = refund_unapplied(pool, booking, processor, &payment).await;
        return Err(SettlementError::HoldExpired {
            reservation_id: row.id,
            payment_id: payment.id,
            payment_ref: payment_ref.to_string(),
            refunded,
        });
    }

    let confirmed = status.apply(
        &Transition::Confirm {
            payment_ref: payment_ref.to_string(),
        },
        &context,
    )?;

    // Only confirmed reservations can take a slot away from a live hold
    let confirmed_only = BookingPolicy {
        pending_blocks: false,
        ..booking.policy()
    };
    let window = row.window()?;
    let schedule = Schedule::new(db::reservations::load_overlapping(&mut tx, space_id, &window).await?)
        .without(row.id);
    if let Some(conflict) = schedule.first_conflict(&window, &confirmed_only, now) {
        let conflicting_reservation_id = conflict.id;
        let cancelled = status.apply(&Transition::Cancel, &context)?;
        db::reservations::record_transition(
            &mut tx,
            &row,
            cancelled,
            AuditAction::Cancel,
            Some(SLOT_TAKEN_REASON),
            now,
        )
        .await?;
        tx.commit().await?;
        tracing::warn!(
            reservation_id = %row.id,
            conflicting = %conflicting_reservation_id,
            payment_ref,
            "Charge settled after slot was taken"
        );
        let refunded = refund_unapplied(pool, booking, processor, &payment).await;
        return Err(SettlementError::SlotTaken {
            reservation_id: row.id,
            conflicting_reservation_id,
            payment_id: payment.id,
            payment_ref: payment_ref.to_string(),
            refunded,
        });
    }

    db::reservations::confirm(&mut tx, &row, confirmed, payment_ref).await?;
    let detail = fetch_detail(&mut *tx, row.id)
        .await?
        .ok_or_else(|| missing_reservation(&payment))?;

    tx.commit().await?;

    tracing::info!(reservation_id = %row.id, payment_ref, "Reservation confirmed");

    Ok(PaymentResult {
        outcome: PaymentOutcome::Confirmed,
        payment: PaymentView::new(payment)?,
        reservation: detail.into_view(now)?,
    })
}

/// Return a charge that could not be applied to its reservation. A failed
/// refund leaves the payment succeeded for `POST /payments/:id/refund`.
async fn refund_unapplied(
    pool: &PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    payment: &PaymentRow,
) -> bool {
    match refund_charge(pool, booking, processor, payment).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(payment_id = %payment.id, error = %e, "Refund of unapplied charge failed");
            false
        },
    }
}

async fn current_result(
    pool: &PgPool,
    outcome: PaymentOutcome,
    payment: PaymentRow,
) -> Result<PaymentResult, SettlementError> {
    let detail = fetch_detail(pool, payment.reservation_id)
        .await?
        .ok_or_else(|| missing_reservation(&payment))?;

    Ok(PaymentResult {
        outcome,
        payment: PaymentView::new(payment)?,
        reservation: detail.into_view(Utc::now())?,
    })
}

fn missing_reservation(payment: &PaymentRow) -> DbError {
    DbError::corrupt(
        "payments",
        format!("payment {} references missing reservation {}", payment.id, payment.reservation_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};
    use crate::processor::MockPaymentProcessor;

    async fn processing(pool: &PgPool, hold: &TestReservation) -> sqlx::Result<PaymentRow> {
        let mut conn = pool.acquire().await?;
        db::payments::insert_processing(&mut conn, hold.id, hold.total_price_cents).await
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_blank_payment_ref_does_not_confirm(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Lisa Chen").insert(&pool).await?;
        let space = TestSpace::new("Kitchen Facility").insert(&pool).await?;
        let hold = TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;
        let payment = processing(&pool, &hold).await?;

        let reply = Ok(Ok(CaptureStatus::Succeeded {
            payment_ref: "  ".to_string(),
        }));
        let result = resolve(
            &pool,
            &BookingConfig::default(),
            &MockPaymentProcessor::new(),
            payment.clone(),
            reply,
        )
        .await;
        assert!(matches!(
            result,
            Err(SettlementError::Transition(TransitionError::MissingPaymentRef))
        ));

        let row = db::reservations::fetch(&pool, hold.id).await.unwrap().unwrap();
        assert_eq!(row.status, "pending");
        let stored = db::payments::fetch(&pool, payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "processing");
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_charge_for_a_taken_slot_is_refunded(pool: PgPool) -> sqlx::Result<()> {
        let emily = TestUser::new("Emily Rodriguez").insert(&pool).await?;
        let david = TestUser::new("David Thompson").insert(&pool).await?;
        let space = TestSpace::new("Outdoor Pavilion").insert(&pool).await?;
        let hold = TestReservation::new(&emily, &space, at(10), at(12)).insert(&pool).await?;
        let winner = TestReservation::new(&david, &space, at(11), at(13))
            .confirmed("ch_winner")
            .insert(&pool)
            .await?;
        let payment = processing(&pool, &hold).await?;

        let processor = MockPaymentProcessor::new();
        let charged = processor
            .capture(&crate::processor::CaptureRequest {
                amount: venue_common::Money::from_cents(payment.amount_cents),
                reservation_id: hold.id,
                idempotency_key: payment.idempotency_key.clone(),
            })
            .await
            .unwrap();

        let result = resolve(
            &pool,
            &BookingConfig::default(),
            &processor,
            payment.clone(),
            Ok(Ok(charged)),
        )
        .await;
        match result {
            Err(SettlementError::SlotTaken {
                reservation_id,
                conflicting_reservation_id,
                payment_id,
                refunded,
                ..
            }) => {
                assert_eq!(reservation_id, hold.id);
                assert_eq!(conflicting_reservation_id, winner.id);
                assert_eq!(payment_id, payment.id);
                assert!(refunded);
            },
            other => panic!("expected SlotTaken, got {other:?}"),
        }

        let row = db::reservations::fetch(&pool, hold.id).await.unwrap().unwrap();
        assert_eq!(row.status, "cancelled");
        assert_eq!(row.cancellation_reason.as_deref(), Some(SLOT_TAKEN_REASON));
        let stored = db::payments::fetch(&pool, payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "refunded");
        assert_eq!(processor.refund_count(), 1);
        Ok(())
    }
}
