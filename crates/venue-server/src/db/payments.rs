//! Payment attempts recorded around processor captures
//!
//! A row is written in `processing` before the processor is called, so the
//! partial unique index on `(reservation_id) WHERE status IN ('processing',
//! 'succeeded')` admits at most one live capture per reservation. Rows move
//! `processing -> succeeded | failed`, and `succeeded -> refunded` once the
//! processor has returned the charge. No other rewrite happens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use super::{DbError, DbResult};

pub(crate) const PAYMENT_COLUMNS: &str = "id, reservation_id, amount_cents, idempotency_key, \
     payment_ref, status, failure_reason, refund_ref, refunded_at, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Processing,
    Succeeded,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

/// A row of `payments`
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount_cents: i64,
    pub idempotency_key: String,
    pub payment_ref: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub refund_ref: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRow {
    pub fn status(&self) -> DbResult<PaymentStatus> {
        self.status
            .parse()
            .map_err(|e| DbError::corrupt("payments", e))
    }
}

/// Record a capture attempt before calling the processor.
///
/// The row id doubles as the processor idempotency key. Fails with a unique
/// violation while another attempt for the reservation is live.
pub async fn insert_processing(
    conn: &mut PgConnection,
    reservation_id: Uuid,
    amount_cents: i64,
) -> sqlx::Result<PaymentRow> {
    let id = Uuid::new_v4();
    let sql = format!(
        r#"
        INSERT INTO payments (id, reservation_id, amount_cents, idempotency_key, status)
        VALUES ($1, $2, $3, $4, 'processing')
        RETURNING {PAYMENT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id)
        .bind(reservation_id)
        .bind(amount_cents)
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await
}

pub async fn fetch<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> DbResult<Option<PaymentRow>> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?)
}

/// All attempts for a reservation, newest first
pub async fn list_for_reservation<'e, E: PgExecutor<'e>>(
    executor: E,
    reservation_id: Uuid,
) -> DbResult<Vec<PaymentRow>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reservation_id = $1 ORDER BY created_at DESC"
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(reservation_id)
        .fetch_all(executor)
        .await?)
}

/// The charge still held for a reservation, locked for the caller's transaction
pub async fn fetch_succeeded_for_update(
    conn: &mut PgConnection,
    reservation_id: Uuid,
) -> DbResult<Option<PaymentRow>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments \
         WHERE reservation_id = $1 AND status = 'succeeded' FOR UPDATE"
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(reservation_id)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Payments still `processing` that were created at or before `cutoff`, oldest first
pub async fn list_stale_processing<'e, E: PgExecutor<'e>>(
    executor: E,
    cutoff: DateTime<Utc>,
    limit: i64,
) -> DbResult<Vec<PaymentRow>> {
    let sql = format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments \
         WHERE status = 'processing' AND created_at <= $1 \
         ORDER BY created_at LIMIT $2"
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(executor)
        .await?)
}

/// Whether a capture for the reservation has not settled yet
pub async fn has_processing(conn: &mut PgConnection, reservation_id: Uuid) -> DbResult<bool> {
    let exists = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE reservation_id = $1 AND status = 'processing')",
    )
    .bind(reservation_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(exists)
}

/// Settle a processing row as succeeded. `None` if it was already settled.
pub async fn mark_succeeded(
    conn: &mut PgConnection,
    id: Uuid,
    payment_ref: &str,
) -> DbResult<Option<PaymentRow>> {
    let sql = format!(
        r#"
        UPDATE payments SET status = 'succeeded', payment_ref = $2
        WHERE id = $1 AND status = 'processing'
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id)
        .bind(payment_ref)
        .fetch_optional(&mut *conn)
        .await?)
}

/// Settle a processing row as failed. `None` if it was already settled.
pub async fn mark_failed<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    reason: &str,
) -> DbResult<Option<PaymentRow>> {
    let sql = format!(
        r#"
        UPDATE payments SET status = 'failed', failure_reason = $2
        WHERE id = $1 AND status = 'processing'
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id)
        .bind(reason)
        .fetch_optional(executor)
        .await?)
}

/// Record that the processor returned a succeeded charge. `None` if the row
/// was not succeeded, which includes an earlier refund.
pub async fn mark_refunded<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    refund_ref: &str,
) -> DbResult<Option<PaymentRow>> {
    let sql = format!(
        r#"
        UPDATE payments SET status = 'refunded', refund_ref = $2, refunded_at = NOW()
        WHERE id = $1 AND status = 'succeeded'
        RETURNING {PAYMENT_COLUMNS}
        "#
    );
    Ok(sqlx::query_as::<_, PaymentRow>(&sql)
        .bind(id)
        .bind(refund_ref)
        .fetch_optional(executor)
        .await?)
}
