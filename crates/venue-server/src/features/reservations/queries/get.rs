use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::DbError;
use crate::features::reservations::types::{fetch_detail, ReservationView};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetReservationQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetReservationError {
    #[error("Reservation '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ReservationView, GetReservationError>> for GetReservationQuery {}

impl crate::cqrs::middleware::Query for GetReservationQuery {}

#[tracing::instrument(skip(pool), fields(reservation_id = %query.id))]
pub async fn handle(
    pool: PgPool,
    query: GetReservationQuery,
) -> Result<ReservationView, GetReservationError> {
    let detail = fetch_detail(&pool, query.id)
        .await?
        .ok_or(GetReservationError::NotFound(query.id))?;

    Ok(detail.into_view(Utc::now())?)
}
