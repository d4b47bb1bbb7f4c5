use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReviewCommand {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReviewResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteReviewError {
    #[error("Review '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<DeleteReviewResponse, DeleteReviewError>> for DeleteReviewCommand {}

impl crate::cqrs::middleware::Command for DeleteReviewCommand {}

#[tracing::instrument(skip(pool), fields(review_id = %command.id))]
pub async fn handle(
    pool: PgPool,
    command: DeleteReviewCommand,
) -> Result<DeleteReviewResponse, DeleteReviewError> {
    let deleted: Option<Uuid> = sqlx::query_scalar("DELETE FROM reviews WHERE id = $1 RETURNING id")
        .bind(command.id)
        .fetch_optional(&pool)
        .await?;

    match deleted {
        Some(id) => Ok(DeleteReviewResponse { id, deleted: true }),
        None => Err(DeleteReviewError::NotFound(command.id)),
    }
}
