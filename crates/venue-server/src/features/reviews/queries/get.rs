use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::reviews::types::{ReviewItem, REVIEW_JOINS, REVIEW_SELECT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetReviewQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetReviewError {
    #[error("Review '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ReviewItem, GetReviewError>> for GetReviewQuery {}

impl crate::cqrs::middleware::Query for GetReviewQuery {}

#[tracing::instrument(skip(pool), fields(review_id = %query.id))]
pub async fn handle(pool: PgPool, query: GetReviewQuery) -> Result<ReviewItem, GetReviewError> {
    let sql = format!("SELECT {REVIEW_SELECT} FROM reviews v {REVIEW_JOINS} WHERE v.id = $1");

    sqlx::query_as::<_, ReviewItem>(&sql)
        .bind(query.id)
        .fetch_optional(&pool)
        .await?
        .ok_or(GetReviewError::NotFound(query.id))
}
