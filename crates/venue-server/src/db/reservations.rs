//! Reservation storage shared by the reservation, payment, and sweeper paths
//!
//! Lock order is always space row first, then reservation rows. Admission
//! takes the space lock before reading the schedule, so two requests for the
//! same space serialize while requests for different spaces do not.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use venue_common::{
    ExistingBooking, ReservationStatus, TimeWindow, Transition, TransitionContext,
};

use super::{DbError, DbResult};
use crate::audit::{self, AuditAction, CreateAuditEntry};

/// Reason stored on reservations cancelled because their hold ran out
pub const EXPIRED_REASON: &str = "hold expired";

pub(crate) const RESERVATION_COLUMNS: &str = "id, user_id, space_id, start_time, end_time, \
     attendees, total_price_cents, status, expires_at, payment_ref, \
     cancelled_at, cancellation_reason, created_at, updated_at";

/// A row of `reservations`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReservationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attendees: Option<i32>,
    pub total_price_cents: i64,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_ref: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationRow {
    pub fn status(&self) -> DbResult<ReservationStatus> {
        self.status
            .parse()
            .map_err(|e| DbError::corrupt("reservations", e))
    }

    pub fn window(&self) -> DbResult<TimeWindow> {
        TimeWindow::new(self.start_time, self.end_time)
            .map_err(|e| DbError::corrupt("reservations", e))
    }

    /// Guard inputs for a status change of this row at `now`
    pub fn transition_context(
        &self,
        cancellation_notice: Duration,
        now: DateTime<Utc>,
    ) -> DbResult<TransitionContext> {
        Ok(TransitionContext {
            window: self.window()?,
            expires_at: self.expires_at,
            cancellation_notice,
            now,
        })
    }

    pub fn as_booking(&self) -> DbResult<ExistingBooking> {
        Ok(ExistingBooking {
            id: self.id,
            window: self.window()?,
            status: self.status()?,
            expires_at: self.expires_at,
        })
    }
}

/// The columns of `rental_spaces` that admission needs
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedSpace {
    pub id: Uuid,
    pub name: String,
    pub price_per_hour_cents: i64,
    pub capacity: i32,
}

/// Take the per-space admission lock. `None` if the space does not exist.
pub async fn lock_space(conn: &mut PgConnection, space_id: Uuid) -> DbResult<Option<LockedSpace>> {
    let space = sqlx::query_as::<_, LockedSpace>(
        "SELECT id, name, price_per_hour_cents, capacity FROM rental_spaces WHERE id = $1 FOR UPDATE",
    )
    .bind(space_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(space)
}

/// Non-cancelled reservations of `space_id` overlapping `window`
pub async fn load_overlapping(
    conn: &mut PgConnection,
    space_id: Uuid,
    window: &TimeWindow,
) -> DbResult<Vec<ExistingBooking>> {
    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations \
         WHERE space_id = $1 AND status <> 'cancelled' \
           AND start_time < $3 AND end_time > $2 \
         ORDER BY start_time"
    );

    let rows = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(space_id)
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(ReservationRow::as_booking).collect()
}

/// Reservations of `space_id` in `[from, to)` that are not cancelled, for availability views
pub async fn list_active_in_range(
    pool: &PgPool,
    space_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> DbResult<Vec<ExistingBooking>> {
    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations \
         WHERE space_id = $1 AND status <> 'cancelled' \
           AND start_time < $3 AND end_time > $2 \
         ORDER BY start_time"
    );

    let rows = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(space_id)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;

    rows.iter().map(ReservationRow::as_booking).collect()
}

pub async fn fetch(pool: &PgPool, id: Uuid) -> DbResult<Option<ReservationRow>> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
    Ok(sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?)
}

/// Lock one reservation row. Callers that also need the space lock take it first.
pub async fn fetch_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> DbResult<Option<ReservationRow>> {
    let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE");
    Ok(sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Cancel pending holds in `ids` whose expiry has passed, with an audit entry
/// per row. Rows the `Expire` transition refuses (confirmed, cancelled, or
/// given a fresh hold meanwhile) are left alone.
pub async fn expire_holds(
    conn: &mut PgConnection,
    ids: &[Uuid],
    now: DateTime<Utc>,
) -> DbResult<Vec<Uuid>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    let mut expired = Vec::new();
    for row in &rows {
        // The notice period only guards cancelling confirmed rows
        let context = row.transition_context(Duration::zero(), now)?;
        let Ok(next) = row.status()?.apply(&Transition::Expire, &context) else {
            continue;
        };
        record_transition(conn, row, next, AuditAction::Expire, Some(EXPIRED_REASON), now).await?;
        expired.push(row.id);
    }

    if !expired.is_empty() {
        tracing::info!(count = expired.len(), "Expired stale reservation holds");
    }

    Ok(expired)
}

/// Expire up to `limit` stale holds across all spaces.
///
/// Rows locked by an in-flight admission or capture are skipped and picked
/// up on a later pass.
pub async fn expire_due_holds(pool: &PgPool, now: DateTime<Utc>, limit: i64) -> DbResult<usize> {
    let mut tx = pool.begin().await?;

    let due: Vec<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM reservations
        WHERE status = 'pending' AND expires_at <= $1
        ORDER BY expires_at
        LIMIT $2
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(&mut *tx)
    .await?;

    let expired = expire_holds(&mut tx, &due, now).await?;
    tx.commit().await?;

    Ok(expired.len())
}

/// Write a status change and its audit entry on the caller's transaction
pub async fn record_transition(
    conn: &mut PgConnection,
    row: &ReservationRow,
    to: ReservationStatus,
    action: AuditAction,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> DbResult<ReservationRow> {
    let sql = format!(
        r#"
        UPDATE reservations
        SET status = $2,
            cancelled_at = CASE WHEN $2 = 'cancelled' THEN $3 ELSE cancelled_at END,
            cancellation_reason = CASE WHEN $2 = 'cancelled' THEN $4 ELSE cancellation_reason END
        WHERE id = $1
        RETURNING {RESERVATION_COLUMNS}
        "#
    );

    let updated = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(row.id)
        .bind(to.as_str())
        .bind(now)
        .bind(reason)
        .fetch_one(&mut *conn)
        .await?;

    audit::record_in_tx(
        &mut *conn,
        CreateAuditEntry::transition(action, row.id, &row.status, to.as_str(), reason)
            .user_id(Some(row.user_id)),
    )
    .await?;

    Ok(updated)
}

/// Store the status produced by a `Confirm` transition together with the
/// processor reference, on the caller's transaction
pub async fn confirm(
    conn: &mut PgConnection,
    row: &ReservationRow,
    to: ReservationStatus,
    payment_ref: &str,
) -> DbResult<ReservationRow> {
    let sql = format!(
        r#"
        UPDATE reservations
        SET status = $3, payment_ref = $2, expires_at = NULL
        WHERE id = $1
        RETURNING {RESERVATION_COLUMNS}
        "#
    );

    let updated = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(row.id)
        .bind(payment_ref)
        .bind(to.as_str())
        .fetch_one(&mut *conn)
        .await?;

    audit::record_in_tx(
        &mut *conn,
        CreateAuditEntry::transition(AuditAction::Confirm, row.id, &row.status, to.as_str(), None)
        .user_id(Some(row.user_id))
        .metadata(serde_json::json!({ "source": "lifecycle", "payment_ref": payment_ref })),
    )
    .await?;

    Ok(updated)
}
