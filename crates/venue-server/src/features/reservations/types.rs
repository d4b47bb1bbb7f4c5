//! Reservation read model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use venue_common::{lifecycle::is_completed, Money, ReservationStatus, WizardStep};

use sqlx::PgExecutor;

use crate::db::{reservations::ReservationRow, DbResult};

/// A reservation row joined with the names a client shows next to it.
/// Expects `r` = reservations, `s` = rental_spaces, `u` = users.
pub(crate) const DETAIL_SELECT: &str = "SELECT r.*, s.name AS space_name, u.full_name AS user_name \
     FROM reservations r \
     JOIN rental_spaces s ON s.id = r.space_id \
     JOIN users u ON u.id = r.user_id";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ReservationDetailRow {
    #[sqlx(flatten)]
    pub reservation: ReservationRow,
    pub space_name: String,
    pub user_name: String,
}

impl ReservationDetailRow {
    pub fn into_view(self, now: DateTime<Utc>) -> DbResult<ReservationView> {
        ReservationView::new(self.reservation, self.space_name, self.user_name, now)
    }
}

/// Load one reservation with its space and user names
pub(crate) async fn fetch_detail<'e, E>(executor: E, id: Uuid) -> sqlx::Result<Option<ReservationDetailRow>>
where
    E: PgExecutor<'e>,
{
    let sql = format!("{DETAIL_SELECT} WHERE r.id = $1");
    sqlx::query_as::<_, ReservationDetailRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub space_name: String,
    pub user_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<i32>,
    pub total_price_cents: i64,
    /// Display form of the total, e.g. `$150.00`
    pub total_price: String,
    pub status: ReservationStatus,
    /// Confirmed and the window has passed
    pub is_completed: bool,
    /// Where the booking wizard resumes for this reservation
    pub booking_step: WizardStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationView {
    pub fn new(
        row: ReservationRow,
        space_name: String,
        user_name: String,
        now: DateTime<Utc>,
    ) -> DbResult<Self> {
        let status = row.status()?;
        let window = row.window()?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            space_id: row.space_id,
            space_name,
            user_name,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: window.duration_minutes(),
            attendees: row.attendees,
            total_price_cents: row.total_price_cents,
            total_price: Money::from_cents(row.total_price_cents).to_string(),
            status,
            is_completed: is_completed(status, &window, now),
            booking_step: WizardStep::resume_from(status),
            expires_at: row.expires_at,
            payment_ref: row.payment_ref,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
