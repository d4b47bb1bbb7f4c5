//! Create reservation command (admission)
//!
//! Admission runs in one transaction holding the space row lock:
//!
//! 1. lock the space (`FOR UPDATE`), serializing admissions for that space
//! 2. load the non-cancelled reservations overlapping the window
//! 3. cancel the pending holds among them that have aged out
//! 4. run the pure admission check from `venue_common::schedule`
//! 5. insert the new `pending` row with its hold expiry
//!
//! The total price is derived here from the space's hourly rate; any price a
//! client sends is ignored.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{BookingPolicy, Money, Rejection, Schedule, TimeWindow};

use crate::config::BookingConfig;
use crate::db::{
    self,
    reservations::{ReservationRow, RESERVATION_COLUMNS},
    DbError,
};
use crate::features::reservations::types::ReservationView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationCommand {
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateReservationError {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("Space '{0}' not found")]
    SpaceNotFound(Uuid),

    #[error("User '{0}' not found")]
    UserNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ReservationView, CreateReservationError>> for CreateReservationCommand {}

impl crate::cqrs::middleware::Command for CreateReservationCommand {}

impl CreateReservationCommand {
    /// Checks that need no stored data: window shape, start, duration, attendees
    pub fn validate(
        &self,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, CreateReservationError> {
        let window = policy.validate_window(self.start_time, self.end_time, now)?;
        if let Some(attendees) = self.attendees.filter(|a| *a <= 0) {
            return Err(Rejection::InvalidAttendees(attendees).into());
        }
        Ok(window)
    }
}

#[tracing::instrument(
    skip(pool, booking, command),
    fields(space_id = %command.space_id, user_id = %command.user_id)
)]
pub async fn handle(
    pool: PgPool,
    booking: &BookingConfig,
    command: CreateReservationCommand,
) -> Result<ReservationView, CreateReservationError> {
    let now = Utc::now();
    let policy = booking.policy();
    let window = command.validate(&policy, now)?;

    let mut tx = pool.begin().await?;

    let space = db::reservations::lock_space(&mut tx, command.space_id)
        .await?
        .ok_or(CreateReservationError::SpaceNotFound(command.space_id))?;

    let user_name: String = sqlx::query_scalar("SELECT full_name FROM users WHERE id = $1")
        .bind(command.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CreateReservationError::UserNotFound(command.user_id))?;

    let schedule = Schedule::new(db::reservations::load_overlapping(&mut tx, space.id, &window).await?);
    db::reservations::expire_holds(&mut tx, &schedule.expired_holds(now), now).await?;

    if let Err(rejection) =
        schedule.check_admission(&window, command.attendees, space.capacity, &policy, now)
    {
        tracing::info!(reason = %rejection, "Reservation rejected");
        return Err(rejection.into());
    }

    let total = Money::from_cents(space.price_per_hour_cents).for_window(&window);

    let sql = format!(
        r#"
        INSERT INTO reservations
            (user_id, space_id, start_time, end_time, attendees, total_price_cents, status, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
        RETURNING {RESERVATION_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(command.user_id)
        .bind(space.id)
        .bind(window.start())
        .bind(window.end())
        .bind(command.attendees)
        .bind(total.cents())
        .bind(policy.hold_expiry(now))
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        reservation_id = %row.id,
        total_cents = row.total_price_cents,
        "Reservation admitted as pending hold"
    );

    Ok(ReservationView::new(row, space.name, user_name, now)?)
}
