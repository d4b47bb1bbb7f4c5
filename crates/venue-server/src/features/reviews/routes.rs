//! Review API routes
//!
//! - `POST /api/v1/reviews` - Review a completed reservation
//! - `GET /api/v1/reviews?space_id=&user_id=` - Reviews plus their summary
//! - `GET /api/v1/reviews/:id` - Get a review
//! - `PUT /api/v1/reviews/:id` - Update rating or comment
//! - `DELETE /api/v1/reviews/:id` - Delete a review

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    commands::{
        CreateReviewCommand, CreateReviewError, DeleteReviewCommand, DeleteReviewError,
        UpdateReviewCommand, UpdateReviewError,
    },
    queries::{GetReviewError, GetReviewQuery, ListReviewsError, ListReviewsQuery},
};
use crate::api::response::{codes, ApiResponse, ErrorResponse};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn reviews_routes() -> Router<PgPool> {
    Router::new()
        .route("/", post(create_review).get(list_reviews))
        .route("/:id", get(get_review).put(update_review).delete(delete_review))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Review a completed reservation
///
/// # Endpoint
///
/// `POST /api/v1/reviews`
///
/// # Request Body
///
/// ```json
/// {
///   "reservation_id": "1f0c...",
///   "rating": 5,
///   "comment": "Perfect for our family reunion"
/// }
/// ```
///
/// # Response
///
/// - `201 Created` - Review stored
/// - `400 Bad Request` - Rating outside 1-5 or comment too long
/// - `404 Not Found` - Reservation not found
/// - `409 Conflict` - Reservation already reviewed
/// - `422 Unprocessable Entity` - Reservation not confirmed or event not over
#[tracing::instrument(skip(pool, command), fields(reservation_id = %command.reservation_id))]
async fn create_review(
    State(pool): State<PgPool>,
    Json(command): Json<CreateReviewCommand>,
) -> Result<Response, ReviewApiError> {
    let response = super::commands::create::handle(pool, command).await?;

    tracing::info!(review_id = %response.id, "Review created via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(pool, command), fields(review_id = %id))]
async fn update_review(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(mut command): Json<UpdateReviewCommand>,
) -> Result<Response, ReviewApiError> {
    command.id = id;
    let response = super::commands::update::handle(pool, command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(pool), fields(review_id = %id))]
async fn delete_review(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, ReviewApiError> {
    let response = super::commands::delete::handle(pool, DeleteReviewCommand { id }).await?;

    tracing::info!("Review deleted via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(pool), fields(review_id = %id))]
async fn get_review(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, ReviewApiError> {
    let response = super::queries::get::handle(pool, GetReviewQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// Reviews newest first, with `{average_rating, total_reviews, rating_distribution}`
///
/// # Endpoint
///
/// `GET /api/v1/reviews?space_id=...&page=1&per_page=20`
#[tracing::instrument(skip(pool, query), fields(space_id = ?query.space_id))]
async fn list_reviews(
    State(pool): State<PgPool>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Response, ReviewApiError> {
    let response = super::queries::list::handle(pool, query).await?;

    let meta = json!({ "pagination": response.pagination });
    let data = json!({ "reviews": response.items, "summary": response.summary });

    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(data, meta))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum ReviewApiError {
    Create(CreateReviewError),
    Update(UpdateReviewError),
    Delete(DeleteReviewError),
    Get(GetReviewError),
    List(ListReviewsError),
}

impl From<CreateReviewError> for ReviewApiError {
    fn from(err: CreateReviewError) -> Self {
        Self::Create(err)
    }
}

impl From<UpdateReviewError> for ReviewApiError {
    fn from(err: UpdateReviewError) -> Self {
        Self::Update(err)
    }
}

impl From<DeleteReviewError> for ReviewApiError {
    fn from(err: DeleteReviewError) -> Self {
        Self::Delete(err)
    }
}

impl From<GetReviewError> for ReviewApiError {
    fn from(err: GetReviewError) -> Self {
        Self::Get(err)
    }
}

impl From<ListReviewsError> for ReviewApiError {
    fn from(err: ListReviewsError) -> Self {
        Self::List(err)
    }
}

impl IntoResponse for ReviewApiError {
    fn into_response(self) -> Response {
        match self {
            // Create errors
            ReviewApiError::Create(
                err @ (CreateReviewError::RatingValidation(_)
                | CreateReviewError::CommentValidation(_)),
            ) => ErrorResponse::validation(err.to_string()),
            ReviewApiError::Create(err @ CreateReviewError::ReservationNotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            ReviewApiError::Create(err @ CreateReviewError::NotEligible(_)) => {
                ErrorResponse::new(codes::NOT_ELIGIBLE, err.to_string())
                    .with_status(StatusCode::UNPROCESSABLE_ENTITY)
            },
            ReviewApiError::Create(err @ CreateReviewError::AlreadyReviewed(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            ReviewApiError::Create(CreateReviewError::Database(e)) => {
                ErrorResponse::internal("review creation", &e)
            },
            ReviewApiError::Create(CreateReviewError::Storage(e)) => {
                ErrorResponse::internal("review creation", &e)
            },

            // Update errors
            ReviewApiError::Update(
                err @ (UpdateReviewError::NoFieldsToUpdate
                | UpdateReviewError::RatingValidation(_)
                | UpdateReviewError::CommentValidation(_)),
            ) => ErrorResponse::validation(err.to_string()),
            ReviewApiError::Update(err @ UpdateReviewError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            ReviewApiError::Update(UpdateReviewError::Database(e)) => {
                ErrorResponse::internal("review update", &e)
            },

            // Delete errors
            ReviewApiError::Delete(err @ DeleteReviewError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            ReviewApiError::Delete(DeleteReviewError::Database(e)) => {
                ErrorResponse::internal("review deletion", &e)
            },

            // Query errors
            ReviewApiError::Get(err @ GetReviewError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            ReviewApiError::Get(GetReviewError::Database(e)) => {
                ErrorResponse::internal("review retrieval", &e)
            },
            ReviewApiError::List(err @ ListReviewsError::InvalidPagination(_)) => {
                ErrorResponse::validation(err.to_string())
            },
            ReviewApiError::List(ListReviewsError::Database(e)) => {
                ErrorResponse::internal("review listing", &e)
            },
        }
    }
}
