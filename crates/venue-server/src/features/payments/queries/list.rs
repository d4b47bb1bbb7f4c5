use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{self, DbError};
use crate::features::payments::types::PaymentView;

/// Every capture attempt for a reservation, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPaymentsQuery {
    pub reservation_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ListPaymentsError {
    #[error("Reservation '{0}' not found")]
    ReservationNotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<Vec<PaymentView>, ListPaymentsError>> for ListPaymentsQuery {}

impl crate::cqrs::middleware::Query for ListPaymentsQuery {}

#[tracing::instrument(skip(pool), fields(reservation_id = %query.reservation_id))]
pub async fn handle(
    pool: PgPool,
    query: ListPaymentsQuery,
) -> Result<Vec<PaymentView>, ListPaymentsError> {
    if db::reservations::fetch(&pool, query.reservation_id).await?.is_none() {
        return Err(ListPaymentsError::ReservationNotFound(query.reservation_id));
    }

    let rows = db::payments::list_for_reservation(&pool, query.reservation_id).await?;
    Ok(rows
        .into_iter()
        .map(PaymentView::new)
        .collect::<Result<Vec<_>, _>>()?)
}
