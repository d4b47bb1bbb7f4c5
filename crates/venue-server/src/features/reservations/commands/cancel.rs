//! Cancel reservation command
//!
//! Pending holds can always be cancelled. Confirmed reservations can be
//! cancelled only while the start is at least the configured notice away,
//! and their charge is refunded once the cancellation has committed. A
//! refund that fails is logged and left for `POST /payments/:id/refund`.

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{ReservationStatus, Transition, TransitionError};

use crate::audit::AuditAction;
use crate::config::BookingConfig;
use crate::db::{self, DbError};
use crate::features::payments::commands::refund::refund_charge;
use crate::features::reservations::types::{fetch_detail, ReservationView};
use crate::processor::PaymentProcessor;

/// Matches the width of `reservations.cancellation_reason`
pub const MAX_REASON_LENGTH: usize = 50;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelReservationCommand {
    /// Set from the path
    #[serde(skip)]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CancelReservationError {
    #[error("Cancellation reason must be at most {MAX_REASON_LENGTH} characters")]
    ReasonTooLong,

    #[error("Reservation '{0}' not found")]
    NotFound(Uuid),

    #[error(transparent)]
    NotCancellable(#[from] TransitionError),

    #[error("A payment for reservation '{0}' is being processed")]
    PaymentInProgress(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ReservationView, CancelReservationError>> for CancelReservationCommand {}

impl crate::cqrs::middleware::Command for CancelReservationCommand {}

impl CancelReservationCommand {
    pub fn validate(&self) -> Result<(), CancelReservationError> {
        if self
            .reason
            .as_deref()
            .is_some_and(|r| r.trim().chars().count() > MAX_REASON_LENGTH)
        {
            return Err(CancelReservationError::ReasonTooLong);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, booking, processor, command), fields(reservation_id = %command.id))]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    command: CancelReservationCommand,
) -> Result<ReservationView, CancelReservationError> {
    command.validate()?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let row = db::reservations::fetch_for_update(&mut tx, command.id)
        .await?
        .ok_or(CancelReservationError::NotFound(command.id))?;

    let status = row.status()?;
    let context = row.transition_context(booking.cancellation_notice(), now)?;
    let next = status.apply(&Transition::Cancel, &context)?;

    let charge = match status {
        ReservationStatus::Pending => {
            if db::payments::has_processing(&mut tx, row.id).await? {
                return Err(CancelReservationError::PaymentInProgress(row.id));
            }
            None
        },
        _ => db::payments::fetch_succeeded_for_update(&mut tx, row.id).await?,
    };

    let reason = command
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty());

    db::reservations::record_transition(&mut tx, &row, next, AuditAction::Cancel, reason, now)
        .await?;

    let detail = fetch_detail(&mut *tx, row.id)
        .await?
        .ok_or(CancelReservationError::NotFound(row.id))?;

    tx.commit().await?;

    tracing::info!(from = %status, "Reservation cancelled");

    if let Some(payment) = charge {
        if let Err(e) = refund_charge(&pool, booking, processor, &payment).await {
            tracing::error!(payment_id = %payment.id, error = %e, "Refund after cancellation failed");
        }
    }

    Ok(detail.into_view(now)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};
    use crate::processor::{CaptureStatus, MockPaymentProcessor};
    use chrono::Duration;

    #[test]
    fn test_reason_length() {
        let cmd = CancelReservationCommand {
            id: Uuid::new_v4(),
            reason: Some("x".repeat(51)),
        };
        assert!(matches!(cmd.validate(), Err(CancelReservationError::ReasonTooLong)));

        let cmd = CancelReservationCommand {
            id: Uuid::new_v4(),
            reason: Some("Change of plans".to_string()),
        };
        assert!(cmd.validate().is_ok());
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_cancel_pending_then_again_conflicts(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Michael Davis").insert(&pool).await?;
        let space = TestSpace::new("Outdoor Pavilion").insert(&pool).await?;
        let held = TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;
        let booking = BookingConfig::default();

        let processor = MockPaymentProcessor::new();

        let cancelled = handle(
            pool.clone(),
            &booking,
            &processor,
            CancelReservationCommand {
                id: held.id,
                reason: Some("Change of plans".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("Change of plans"));
        assert!(cancelled.cancelled_at.is_some());

        let again = handle(
            pool.clone(),
            &booking,
            &processor,
            CancelReservationCommand {
                id: held.id,
                reason: None,
            },
        )
        .await;
        assert!(matches!(
            again,
            Err(CancelReservationError::NotCancellable(TransitionError::NotAllowed { .. }))
        ));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_confirmed_inside_notice_window(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Emily Rodriguez").insert(&pool).await?;
        let space = TestSpace::new("Softball Field").insert(&pool).await?;
        let soon = Utc::now() + Duration::hours(3);
        let confirmed = TestReservation::new(&user, &space, soon, soon + Duration::hours(2))
            .confirmed("ch_soon")
            .insert(&pool)
            .await?;

        let result = handle(
            pool.clone(),
            &BookingConfig::default(),
            &MockPaymentProcessor::new(),
            CancelReservationCommand {
                id: confirmed.id,
                reason: None,
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(CancelReservationError::NotCancellable(
                TransitionError::NoticeWindowPassed { notice_hours: 24 }
            ))
        ));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_cancelling_confirmed_refunds_the_charge(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Sarah Johnson").insert(&pool).await?;
        let space = TestSpace::new("Main Fellowship Hall").insert(&pool).await?;
        let confirmed = TestReservation::new(&user, &space, at(10), at(12))
            .confirmed("ch_hall")
            .insert(&pool)
            .await?;

        let mut conn = pool.acquire().await?;
        let payment =
            db::payments::insert_processing(&mut conn, confirmed.id, confirmed.total_price_cents).await?;
        db::payments::mark_succeeded(&mut conn, payment.id, "ch_hall").await.unwrap();
        drop(conn);

        let processor = MockPaymentProcessor::new();
        processor.record_capture(
            &payment.idempotency_key,
            CaptureStatus::Succeeded {
                payment_ref: "ch_hall".to_string(),
            },
        );

        let cancelled = handle(
            pool.clone(),
            &BookingConfig::default(),
            &processor,
            CancelReservationCommand {
                id: confirmed.id,
                reason: Some("Event postponed".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let stored = db::payments::fetch(&pool, payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "refunded");
        assert_eq!(processor.refund_count(), 1);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_failed_refund_still_cancels(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("David Thompson").insert(&pool).await?;
        let space = TestSpace::new("Conference Room").insert(&pool).await?;
        let confirmed = TestReservation::new(&user, &space, at(14), at(15))
            .confirmed("ch_room")
            .insert(&pool)
            .await?;

        let mut conn = pool.acquire().await?;
        let payment =
            db::payments::insert_processing(&mut conn, confirmed.id, confirmed.total_price_cents).await?;
        db::payments::mark_succeeded(&mut conn, payment.id, "ch_room").await.unwrap();
        drop(conn);

        // The processor never saw this charge, so the refund is refused
        let processor = MockPaymentProcessor::new();
        let cancelled = handle(
            pool.clone(),
            &BookingConfig::default(),
            &processor,
            CancelReservationCommand {
                id: confirmed.id,
                reason: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let stored = db::payments::fetch(&pool, payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "succeeded");
        assert_eq!(processor.refund_count(), 0);
        Ok(())
    }
}
