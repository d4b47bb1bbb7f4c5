//! Create review command
//!
//! A review is accepted once per reservation, and only after the booked
//! window has ended. The one-per-reservation rule is ultimately enforced by
//! the `reviews_reservation_unique` constraint, so two concurrent submissions
//! produce one review and one `AlreadyReviewed`.

use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::lifecycle::is_completed;

use crate::db::{self, DbError};
use crate::features::reviews::types::{ReviewItem, REVIEW_JOINS, REVIEW_SELECT};
use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::{
    validate_rating, validate_text, RatingValidationError, TextValidationError, MAX_TEXT_LENGTH,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewCommand {
    pub reservation_id: Uuid,
    /// When given, must be the customer who booked the reservation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub rating: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateReviewError {
    #[error(transparent)]
    RatingValidation(#[from] RatingValidationError),

    #[error(transparent)]
    CommentValidation(#[from] TextValidationError),

    #[error("Reservation '{0}' not found")]
    ReservationNotFound(Uuid),

    #[error("Reservation is not eligible for review: {0}")]
    NotEligible(String),

    #[error("Reservation '{0}' has already been reviewed")]
    AlreadyReviewed(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ReviewItem, CreateReviewError>> for CreateReviewCommand {}

impl crate::cqrs::middleware::Command for CreateReviewCommand {}

impl CreateReviewCommand {
    pub fn validate(&self) -> Result<(), CreateReviewError> {
        validate_rating(self.rating)?;
        validate_text(self.comment.as_deref(), "comment", MAX_TEXT_LENGTH)?;
        Ok(())
    }
}

#[tracing::instrument(
    skip(pool, command),
    fields(reservation_id = %command.reservation_id, rating = command.rating)
)]
pub async fn handle(pool: PgPool, command: CreateReviewCommand) -> Result<ReviewItem, CreateReviewError> {
    command.validate()?;

    let reservation = db::reservations::fetch(&pool, command.reservation_id)
        .await?
        .ok_or(CreateReviewError::ReservationNotFound(command.reservation_id))?;

    if command.user_id.is_some_and(|user_id| user_id != reservation.user_id) {
        return Err(CreateReviewError::NotEligible(
            "only the customer who booked the reservation can review it".to_string(),
        ));
    }

    let status = reservation.status()?;
    let window = reservation.window()?;
    if !is_completed(status, &window, Utc::now()) {
        let reason = if window.has_ended(Utc::now()) {
            format!("reservation is {}, not confirmed", status)
        } else {
            "the event has not ended yet".to_string()
        };
        return Err(CreateReviewError::NotEligible(reason));
    }

    let comment = command
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let sql = format!(
        r#"
        WITH v AS (
            INSERT INTO reviews (reservation_id, user_id, space_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
        )
        SELECT {REVIEW_SELECT} FROM v {REVIEW_JOINS}
        "#
    );

    let review = sqlx::query_as::<_, ReviewItem>(&sql)
        .bind(reservation.id)
        .bind(reservation.user_id)
        .bind(reservation.space_id)
        .bind(command.rating)
        .bind(comment)
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                CreateReviewError::AlreadyReviewed(reservation.id),
                CreateReviewError::Database,
            )
        })?;

    tracing::info!(review_id = %review.id, space_id = %review.space_id, "Review created");

    Ok(review)
}
