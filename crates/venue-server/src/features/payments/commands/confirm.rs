//! Confirm payment command
//!
//! Resolves a capture that was left `processing` (timeout or unreachable
//! processor) by asking the processor for the outcome under the same
//! idempotency key. Confirming an already settled payment reports it again.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::BookingConfig;
use crate::db::{self, payments::PaymentStatus, DbError};
use crate::features::payments::settle::{self, SettlementError};
use crate::features::payments::types::PaymentResult;
use crate::processor::PaymentProcessor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmPaymentCommand {
    pub payment_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmPaymentError {
    #[error("Payment '{0}' not found")]
    NotFound(Uuid),

    #[error("Payment '{0}' already failed; start a new capture")]
    AlreadyFailed(Uuid),

    #[error(transparent)]
    Settlement(#[from] SettlementError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<PaymentResult, ConfirmPaymentError>> for ConfirmPaymentCommand {}

impl crate::cqrs::middleware::Command for ConfirmPaymentCommand {}

#[tracing::instrument(
    skip(pool, booking, processor, command),
    fields(payment_id = %command.payment_id, processor = processor.name())
)]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    processor: &dyn PaymentProcessor,
    command: ConfirmPaymentCommand,
) -> Result<PaymentResult, ConfirmPaymentError> {
    let payment = db::payments::fetch(&pool, command.payment_id)
        .await?
        .ok_or(ConfirmPaymentError::NotFound(command.payment_id))?;

    match payment.status()? {
        PaymentStatus::Failed => return Err(ConfirmPaymentError::AlreadyFailed(payment.id)),
        PaymentStatus::Succeeded | PaymentStatus::Refunded => {
            return Ok(settle::settled_result(&pool, payment).await?)
        },
        PaymentStatus::Processing => {},
    }

    let reply = tokio::time::timeout(
        booking.payment_timeout(),
        processor.retrieve(&payment.idempotency_key),
    )
    .await;

    Ok(settle::resolve(&pool, booking, processor, payment, reply).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::payments::commands::capture::{self, CapturePaymentCommand};
    use crate::features::payments::types::PaymentOutcome;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};
    use crate::processor::{CaptureRequest, MockPaymentProcessor};
    use std::time::Duration;
    use venue_common::{Money, ReservationStatus};

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_late_confirmation_after_timeout(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Lisa Chen").insert(&pool).await?;
        let space = TestSpace::new("Kitchen Facility").insert(&pool).await?;
        let hold = TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;

        let booking = BookingConfig {
            payment_timeout_secs: 1,
            ..BookingConfig::default()
        };
        let slow = MockPaymentProcessor::new().latency(Duration::from_secs(3));
        let pending = capture::handle(
            pool.clone(),
            &booking,
            &slow,
            CapturePaymentCommand {
                reservation_id: hold.id,
            },
        )
        .await
        .unwrap();
        assert_eq!(pending.outcome, PaymentOutcome::Processing);

        // The processor finished the charge on its side after the timeout
        let settled = MockPaymentProcessor::new();
        settled
            .capture(&CaptureRequest {
                amount: Money::from_cents(pending.payment.amount_cents),
                reservation_id: hold.id,
                idempotency_key: pending.payment.id.to_string(),
            })
            .await
            .unwrap();

        let command = ConfirmPaymentCommand {
            payment_id: pending.payment.id,
        };
        let confirmed = handle(pool.clone(), &booking, &settled, command.clone())
            .await
            .unwrap();
        assert_eq!(confirmed.outcome, PaymentOutcome::Confirmed);
        assert_eq!(confirmed.reservation.status, ReservationStatus::Confirmed);

        let replay = handle(pool.clone(), &booking, &settled, command).await.unwrap();
        assert_eq!(replay.outcome, PaymentOutcome::Confirmed);
        assert_eq!(replay.payment.payment_ref, confirmed.payment.payment_ref);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_unknown_capture_fails_payment(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Sarah Johnson").insert(&pool).await?;
        let space = TestSpace::new("Main Fellowship Hall").insert(&pool).await?;
        let hold = TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;

        let mut conn = pool.acquire().await?;
        let payment = db::payments::insert_processing(&mut conn, hold.id, hold.total_price_cents).await?;
        drop(conn);

        let booking = BookingConfig::default();
        let processor = MockPaymentProcessor::new();
        let result = handle(
            pool.clone(),
            &booking,
            &processor,
            ConfirmPaymentCommand {
                payment_id: payment.id,
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(ConfirmPaymentError::Settlement(SettlementError::Declined { .. }))
        ));

        let again = handle(
            pool.clone(),
            &booking,
            &processor,
            ConfirmPaymentCommand {
                payment_id: payment.id,
            },
        )
        .await;
        assert!(matches!(again, Err(ConfirmPaymentError::AlreadyFailed(_))));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_charge_after_expiry_is_refunded(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("David Thompson").insert(&pool).await?;
        let space = TestSpace::new("Outdoor Pavilion").insert(&pool).await?;
        let hold = TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;

        let mut conn = pool.acquire().await?;
        let payment = db::payments::insert_processing(&mut conn, hold.id, hold.total_price_cents).await?;
        drop(conn);

        // The hold runs out while the processor is still working
        sqlx::query("UPDATE reservations SET expires_at = NOW() - INTERVAL '1 minute' WHERE id = $1")
            .bind(hold.id)
            .execute(&pool)
            .await?;

        let processor = MockPaymentProcessor::new();
        processor
            .capture(&CaptureRequest {
                amount: Money::from_cents(payment.amount_cents),
                reservation_id: hold.id,
                idempotency_key: payment.idempotency_key.clone(),
            })
            .await
            .unwrap();

        let command = ConfirmPaymentCommand {
            payment_id: payment.id,
        };
        let result = handle(pool.clone(), &BookingConfig::default(), &processor, command.clone()).await;

        match result {
            Err(ConfirmPaymentError::Settlement(SettlementError::HoldExpired {
                reservation_id,
                payment_ref,
                refunded,
                ..
            })) => {
                assert_eq!(reservation_id, hold.id);
                assert!(payment_ref.starts_with("mock_"));
                assert!(refunded);
            },
            other => panic!("expected HoldExpired, got {other:?}"),
        }

        let row = db::reservations::fetch(&pool, hold.id).await.unwrap().unwrap();
        assert_eq!(row.status, "cancelled");
        let settled = db::payments::fetch(&pool, payment.id).await.unwrap().unwrap();
        assert_eq!(settled.status, "refunded");
        assert!(settled.refund_ref.is_some());
        assert_eq!(processor.refund_count(), 1);

        // Asking again reports the cancellation without a second refund
        let replay = handle(pool.clone(), &BookingConfig::default(), &processor, command).await;
        assert!(matches!(
            replay,
            Err(ConfirmPaymentError::Settlement(SettlementError::ReservationCancelled {
                refunded: true,
                ..
            }))
        ));
        assert_eq!(processor.refund_count(), 1);
        Ok(())
    }
}
