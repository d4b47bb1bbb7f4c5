//! Reschedule a pending reservation
//!
//! Re-runs admission for the new window with the reservation itself left out
//! of the schedule, then recomputes the price. The hold expiry is kept, so
//! rescheduling cannot be used to extend a hold.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{BookingPolicy, Money, Rejection, ReservationStatus, Schedule, TimeWindow};

use crate::config::BookingConfig;
use crate::db::{
    self,
    reservations::{ReservationRow, RESERVATION_COLUMNS},
    DbError,
};
use crate::features::reservations::types::{fetch_detail, ReservationView};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleReservationCommand {
    /// Set from the path
    #[serde(skip)]
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Keeps the current attendee count when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum RescheduleReservationError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Reservation '{0}' not found")]
    NotFound(Uuid),

    #[error("Only pending reservations can be rescheduled; this one is {0}")]
    NotPending(ReservationStatus),

    #[error("The hold on reservation '{0}' has expired")]
    HoldExpired(Uuid),

    #[error("A payment for reservation '{0}' is being processed")]
    PaymentInProgress(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ReservationView, RescheduleReservationError>> for RescheduleReservationCommand {}

impl crate::cqrs::middleware::Command for RescheduleReservationCommand {}

impl RescheduleReservationCommand {
    pub fn validate(
        &self,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, RescheduleReservationError> {
        let window = policy.validate_window(self.start_time, self.end_time, now)?;
        if let Some(attendees) = self.attendees.filter(|a| *a <= 0) {
            return Err(Rejection::InvalidAttendees(attendees).into());
        }
        Ok(window)
    }
}

#[tracing::instrument(skip(pool, booking, command), fields(reservation_id = %command.id))]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    command: RescheduleReservationCommand,
) -> Result<ReservationView, RescheduleReservationError> {
    let now = Utc::now();
    let policy = booking.policy();
    let window = command.validate(&policy, now)?;

    // The space id is needed before the lock can be taken
    let space_id = db::reservations::fetch(&pool, command.id)
        .await?
        .ok_or(RescheduleReservationError::NotFound(command.id))?
        .space_id;

    let mut tx = pool.begin().await?;

    let space = db::reservations::lock_space(&mut tx, space_id)
        .await?
        .ok_or(RescheduleReservationError::NotFound(command.id))?;
    let current = db::reservations::fetch_for_update(&mut tx, command.id)
        .await?
        .ok_or(RescheduleReservationError::NotFound(command.id))?;

    let status = current.status()?;
    if status != ReservationStatus::Pending {
        return Err(RescheduleReservationError::NotPending(status));
    }
    if !db::reservations::expire_holds(&mut tx, &[current.id], now).await?.is_empty() {
        tx.commit().await?;
        return Err(RescheduleReservationError::HoldExpired(current.id));
    }

    if db::payments::has_processing(&mut tx, current.id).await? {
        return Err(RescheduleReservationError::PaymentInProgress(current.id));
    }

    let schedule = Schedule::new(db::reservations::load_overlapping(&mut tx, space.id, &window).await?)
        .without(current.id);
    db::reservations::expire_holds(&mut tx, &schedule.expired_holds(now), now).await?;

    let attendees = command.attendees.or(current.attendees);
    schedule.check_admission(&window, attendees, space.capacity, &policy, now)?;

    let total = Money::from_cents(space.price_per_hour_cents).for_window(&window);

    let sql = format!(
        r#"
        UPDATE reservations
        SET start_time = $2, end_time = $3, attendees = $4, total_price_cents = $5
        WHERE id = $1
        RETURNING {RESERVATION_COLUMNS}
        "#
    );
    let updated = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(current.id)
        .bind(window.start())
        .bind(window.end())
        .bind(attendees)
        .bind(total.cents())
        .fetch_one(&mut *tx)
        .await?;

    let detail = fetch_detail(&mut *tx, updated.id)
        .await?
        .ok_or(RescheduleReservationError::NotFound(updated.id))?;

    tx.commit().await?;

    tracing::info!(
        from = %current.window()?,
        to = %window,
        total_cents = updated.total_price_cents,
        "Reservation rescheduled"
    );

    Ok(detail.into_view(now)?)
}
