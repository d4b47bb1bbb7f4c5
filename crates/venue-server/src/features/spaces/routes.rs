//! Space catalog API routes
//!
//! - `POST /api/v1/spaces` - Add a space
//! - `GET /api/v1/spaces` - List spaces with their rating aggregates
//! - `GET /api/v1/spaces/:id` - Get a space
//! - `PUT /api/v1/spaces/:id` - Partially update a space
//! - `DELETE /api/v1/spaces/:id` - Delete a space that was never booked
//! - `GET /api/v1/spaces/:id/availability` - Blocking slots in a date range
//! - `GET /api/v1/spaces/:id/reviews` - Reviews of a space plus summary

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    commands::{
        CreateSpaceCommand, CreateSpaceError, DeleteSpaceCommand, DeleteSpaceError,
        UpdateSpaceCommand, UpdateSpaceError,
    },
    queries::{
        GetAvailabilityError, GetAvailabilityQuery, GetSpaceError, GetSpaceQuery,
        ListSpacesError, ListSpacesQuery,
    },
};
use crate::api::response::{ApiResponse, ErrorResponse};
use crate::config::BookingConfig;
use crate::features::reviews::{ListReviewsError, ListReviewsQuery};
use crate::features::FeatureState;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn spaces_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", post(create_space).get(list_spaces))
        .route("/:id", get(get_space).put(update_space).delete(delete_space))
        .route("/:id/availability", get(get_availability))
        .route("/:id/reviews", get(list_space_reviews))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Add a rentable space to the catalog
///
/// # Endpoint
///
/// `POST /api/v1/spaces`
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Main Fellowship Hall",
///   "description": "Our largest indoor space",
///   "price_per_hour_cents": 7500,
///   "capacity": 150,
///   "photos": ["https://res.cloudinary.com/demo/image/upload/v1234567890/fellowship_hall_1.jpg"]
/// }
/// ```
///
/// # Response
///
/// - `201 Created` - Space created
/// - `400 Bad Request` - Validation error
/// - `409 Conflict` - Name already used
#[tracing::instrument(skip(pool, command), fields(name = %command.name))]
async fn create_space(
    State(pool): State<PgPool>,
    Json(command): Json<CreateSpaceCommand>,
) -> Result<Response, SpaceApiError> {
    let response = super::commands::create::handle(pool, command).await?;

    tracing::info!(space_id = %response.id, "Space created via API");

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(pool, command), fields(space_id = %id))]
async fn update_space(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(mut command): Json<UpdateSpaceCommand>,
) -> Result<Response, SpaceApiError> {
    command.id = id;
    let response = super::commands::update::handle(pool, command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// Delete a space
///
/// # Response
///
/// - `200 OK` - Space deleted
/// - `404 Not Found` - Space not found
/// - `409 Conflict` - Space is referenced by reservations
#[tracing::instrument(skip(pool), fields(space_id = %id))]
async fn delete_space(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, SpaceApiError> {
    let response = super::commands::delete::handle(pool, DeleteSpaceCommand { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(pool), fields(space_id = %id))]
async fn get_space(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, SpaceApiError> {
    let response = super::queries::get::handle(pool, GetSpaceQuery { id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// List spaces
///
/// # Endpoint
///
/// `GET /api/v1/spaces?page=1&per_page=20&min_capacity=50&max_price_cents=6000`
#[tracing::instrument(skip(pool, query), fields(page = ?query.page, per_page = ?query.per_page))]
async fn list_spaces(
    State(pool): State<PgPool>,
    Query(query): Query<ListSpacesQuery>,
) -> Result<Response, SpaceApiError> {
    let response = super::queries::list::handle(pool, query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Spaces listed via API"
    );

    let meta = json!({ "pagination": response.pagination });
    Ok((StatusCode::OK, Json(ApiResponse::success_with_meta(response.items, meta))).into_response())
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
}

/// Slots that currently block new bookings of a space
///
/// # Endpoint
///
/// `GET /api/v1/spaces/:id/availability?start_date=2024-09-15T00:00:00Z&end_date=2024-09-16T00:00:00Z`
///
/// # Response
///
/// - `200 OK` - `{space_id, start_date, end_date, slots: [{start_time, end_time, status}]}`
/// - `400 Bad Request` - Missing or inverted range
/// - `404 Not Found` - Space not found
#[tracing::instrument(skip(pool, booking, range), fields(space_id = %id))]
async fn get_availability(
    State(pool): State<PgPool>,
    State(booking): State<Arc<BookingConfig>>,
    Path(id): Path<Uuid>,
    Query(range): Query<RangeParams>,
) -> Result<Response, SpaceApiError> {
    let query = GetAvailabilityQuery {
        space_id: id,
        start_date: range.start_date,
        end_date: range.end_date,
    };
    let response = super::queries::availability::handle(pool, &booking.policy(), query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<i64>,
    per_page: Option<i64>,
}

#[tracing::instrument(skip(pool, params), fields(space_id = %id))]
async fn list_space_reviews(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> Result<Response, SpaceApiError> {
    let query = ListReviewsQuery {
        space_id: Some(id),
        user_id: None,
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
enum SpaceApiError {
    Create(CreateSpaceError),
    Update(UpdateSpaceError),
    Delete(DeleteSpaceError),
    Get(GetSpaceError),
    List(ListSpacesError),
    Availability(GetAvailabilityError),
    Reviews(ListReviewsError),
}

impl From<CreateSpaceError> for SpaceApiError {
    fn from(err: CreateSpaceError) -> Self {
        Self::Create(err)
    }
}

impl From<UpdateSpaceError> for SpaceApiError {
    fn from(err: UpdateSpaceError) -> Self {
        Self::Update(err)
    }
}

impl From<DeleteSpaceError> for SpaceApiError {
    fn from(err: DeleteSpaceError) -> Self {
        Self::Delete(err)
    }
}

impl From<GetSpaceError> for SpaceApiError {
    fn from(err: GetSpaceError) -> Self {
        Self::Get(err)
    }
}

impl From<ListSpacesError> for SpaceApiError {
    fn from(err: ListSpacesError) -> Self {
        Self::List(err)
    }
}

impl From<GetAvailabilityError> for SpaceApiError {
    fn from(err: GetAvailabilityError) -> Self {
        Self::Availability(err)
    }
}

impl From<ListReviewsError> for SpaceApiError {
    fn from(err: ListReviewsError) -> Self {
        Self::Reviews(err)
    }
}

impl IntoResponse for SpaceApiError {
    fn into_response(self) -> Response {
        match self {
            // Create errors
            SpaceApiError::Create(err @ CreateSpaceError::DuplicateName(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            SpaceApiError::Create(CreateSpaceError::Database(e)) => {
                ErrorResponse::internal("space creation", &e)
            },
            SpaceApiError::Create(err) => ErrorResponse::validation(err.to_string()),

            // Update errors
            SpaceApiError::Update(err @ UpdateSpaceError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            SpaceApiError::Update(err @ UpdateSpaceError::DuplicateName(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            SpaceApiError::Update(UpdateSpaceError::Database(e)) => {
                ErrorResponse::internal("space update", &e)
            },
            SpaceApiError::Update(err) => ErrorResponse::validation(err.to_string()),

            // Delete errors
            SpaceApiError::Delete(err @ DeleteSpaceError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            SpaceApiError::Delete(err @ DeleteSpaceError::HasReservations(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            SpaceApiError::Delete(DeleteSpaceError::Database(e)) => {
                ErrorResponse::internal("space deletion", &e)
            },

            // Query errors
            SpaceApiError::Get(err @ GetSpaceError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            SpaceApiError::Get(GetSpaceError::Database(e)) => {
                ErrorResponse::internal("space retrieval", &e)
            },
            SpaceApiError::List(err @ ListSpacesError::InvalidPagination(_)) => {
                ErrorResponse::validation(err.to_string())
            },
            SpaceApiError::List(ListSpacesError::Database(e)) => {
                ErrorResponse::internal("space listing", &e)
            },
            SpaceApiError::Availability(
                err @ (GetAvailabilityError::InvalidRange | GetAvailabilityError::RangeTooLong),
            ) => ErrorResponse::validation(err.to_string()),
            SpaceApiError::Availability(err @ GetAvailabilityError::SpaceNotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            SpaceApiError::Availability(GetAvailabilityError::Database(e)) => {
                ErrorResponse::internal("availability lookup", &e)
            },
            SpaceApiError::Availability(GetAvailabilityError::Storage(e)) => {
                ErrorResponse::internal("availability lookup", &e)
            },
            SpaceApiError::Reviews(err @ ListReviewsError::InvalidPagination(_)) => {
                ErrorResponse::validation(err.to_string())
            },
            SpaceApiError::Reviews(ListReviewsError::Database(e)) => {
                ErrorResponse::internal("space review listing", &e)
            },
        }
    }
}
