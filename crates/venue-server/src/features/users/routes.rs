//! User API routes
//!
//! - `POST /api/v1/users` - Register a user
//! - `GET /api/v1/users/:id` - Get a user with activity counts
//! - `GET /api/v1/users/:id/reviews` - Reviews written by a user

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    commands::{CreateUserCommand, CreateUserError},
    queries::{GetUserError, GetUserQuery},
};
use crate::api::response::{ApiResponse, ErrorResponse};
use crate::features::reviews::{ListReviewsError, ListReviewsQuery};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn users_routes() -> Router<PgPool> {
    Router::new()
        .route("/", post(create_user))
        .route("/:id", get(get_user))
        .route("/:id/reviews", get(list_user_reviews))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Register a user
///
/// # Endpoint
///
/// `POST /api/v1/users`
///
/// # Request Body
///
/// ```json
/// {
///   "full_name": "Sarah Johnson",
///   "email": "sarah.johnson@email.com",
///   "role": "customer"
/// }
/// ```
///
/// # Response
///
/// - `201 Created` - User created
/// - `400 Bad Request` - Validation error
/// - `409 Conflict` - Email already registered
#[tracing::instrument(skip(pool, command))]
async fn create_user(
    State(pool): State<PgPool>,
    Json(command): Json<CreateUserCommand>,
) -> Result<Response, UserApiError> {
    let response = super::commands::create::handle(pool, command).await?;

    tracing::info!(user_id = %response.id, "User created via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(pool), fields(user_id = %id))]
async fn get_user(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, UserApiError> {
    let response = super::queries::get::handle(pool, GetUserQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<i64>,
    per_page: Option<i64>,
}

/// Reviews written by a user, newest first, with their summary
///
/// # Endpoint
///
/// `GET /api/v1/users/:id/reviews?page=1&per_page=20`
#[tracing::instrument(skip(pool, params), fields(user_id = %id))]
async fn list_user_reviews(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Response, UserApiError> {
    let query = ListReviewsQuery {
        space_id: None,
        user_id: Some(id),
        page: params.page,
        per_page: params.per_page,
    };
    let response = crate::features::reviews::queries::list::handle(pool, query).await?;

    let meta = json!({ "pagination": response.pagination });
    let data = json!({ "reviews": response.items, "summary": response.summary });

    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(data, meta))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum UserApiError {
    Create(CreateUserError),
    Get(GetUserError),
    Reviews(ListReviewsError),
}

impl From<CreateUserError> for UserApiError {
    fn from(err: CreateUserError) -> Self {
        Self::Create(err)
    }
}

impl From<GetUserError> for UserApiError {
    fn from(err: GetUserError) -> Self {
        Self::Get(err)
    }
}

impl From<ListReviewsError> for UserApiError {
    fn from(err: ListReviewsError) -> Self {
        Self::Reviews(err)
    }
}

impl IntoResponse for UserApiError {
    fn into_response(self) -> Response {
        match self {
            UserApiError::Create(
                err @ (CreateUserError::NameValidation(_) | CreateUserError::EmailValidation(_)),
            ) => ErrorResponse::validation(err.to_string()),
            UserApiError::Create(err @ CreateUserError::DuplicateEmail(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            UserApiError::Create(CreateUserError::Database(e)) => {
                ErrorResponse::internal("user creation", &e)
            },

            UserApiError::Get(err @ GetUserError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            UserApiError::Get(GetUserError::Database(e)) => {
                ErrorResponse::internal("user retrieval", &e)
            },

            UserApiError::Reviews(err @ ListReviewsError::InvalidPagination(_)) => {
                ErrorResponse::validation(err.to_string())
            },
            UserApiError::Reviews(ListReviewsError::Database(e)) => {
                ErrorResponse::internal("user review listing", &e)
            },
        }
    }
}
