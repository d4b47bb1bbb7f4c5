use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::reviews::types::{ReviewItem, REVIEW_JOINS, REVIEW_SELECT};
use crate::features::shared::validation::{
    validate_rating, validate_text, RatingValidationError, TextValidationError, MAX_TEXT_LENGTH,
};

/// Change the rating and/or comment of an existing review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReviewCommand {
    /// Set from the path
    #[serde(skip)]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateReviewError {
    #[error("At least one of rating or comment must be provided")]
    NoFieldsToUpdate,
    #[error(transparent)]
    RatingValidation(#[from] RatingValidationError),
    #[error(transparent)]
    CommentValidation(#[from] TextValidationError),
    #[error("Review '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ReviewItem, UpdateReviewError>> for UpdateReviewCommand {}

impl crate::cqrs::middleware::Command for UpdateReviewCommand {}

impl UpdateReviewCommand {
    pub fn validate(&self) -> Result<(), UpdateReviewError> {
        if self.rating.is_none() && self.comment.is_none() {
            return Err(UpdateReviewError::NoFieldsToUpdate);
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        validate_text(self.comment.as_deref(), "comment", MAX_TEXT_LENGTH)?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(review_id = %command.id))]
pub async fn handle(pool: PgPool, command: UpdateReviewCommand) -> Result<ReviewItem, UpdateReviewError> {
    command.validate()?;

    let sql = format!(
        r#"
        WITH v AS (
            UPDATE reviews
            SET rating = COALESCE($2, rating),
                comment = COALESCE($3, comment)
            WHERE id = $1
            RETURNING *
        )
        SELECT {REVIEW_SELECT} FROM v {REVIEW_JOINS}
        "#
    );

    let review = sqlx::query_as::<_, ReviewItem>(&sql)
        .bind(command.id)
        .bind(command.rating)
        .bind(command.comment.as_deref().map(str::trim))
        .fetch_optional(&pool)
        .await?
        .ok_or(UpdateReviewError::NotFound(command.id))?;

    tracing::info!("Review updated");

    Ok(review)
}
