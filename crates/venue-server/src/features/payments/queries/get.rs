use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{self, DbError};
use crate::features::payments::types::PaymentView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPaymentQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetPaymentError {
    #[error("Payment '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<PaymentView, GetPaymentError>> for GetPaymentQuery {}

impl crate::cqrs::middleware::Query for GetPaymentQuery {}

#[tracing::instrument(skip(pool), fields(payment_id = %query.id))]
pub async fn handle(pool: PgPool, query: GetPaymentQuery) -> Result<PaymentView, GetPaymentError> {
    let row = db::payments::fetch(&pool, query.id)
        .await?
        .ok_or(GetPaymentError::NotFound(query.id))?;
    Ok(PaymentView::new(row)?)
}
