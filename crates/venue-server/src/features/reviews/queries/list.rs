//! List reviews with their on-read summary
//!
//! The summary covers every review matching the filters, not only the page
//! being returned.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::reviews::types::{ReviewItem, ReviewSummary, REVIEW_JOINS, REVIEW_SELECT};
use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReviewsQuery {
    pub space_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReviewsResponse {
    pub items: Vec<ReviewItem>,
    pub summary: ReviewSummary,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListReviewsError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ListReviewsResponse, ListReviewsError>> for ListReviewsQuery {}

impl crate::cqrs::middleware::Query for ListReviewsQuery {}

impl ListReviewsQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn validate(&self) -> Result<(), ListReviewsError> {
        self.pagination()
            .validate()
            .map_err(ListReviewsError::InvalidPagination)
    }
}

const FILTER: &str = "($1::uuid IS NULL OR v.space_id = $1) AND ($2::uuid IS NULL OR v.user_id = $2)";

#[tracing::instrument(skip(pool), fields(space_id = ?query.space_id, user_id = ?query.user_id))]
pub async fn handle(
    pool: PgPool,
    query: ListReviewsQuery,
) -> Result<ListReviewsResponse, ListReviewsError> {
    query.validate()?;
    let params = query.pagination();

    let sql = format!(
        "SELECT {REVIEW_SELECT} FROM reviews v {REVIEW_JOINS} \
         WHERE {FILTER} \
         ORDER BY v.created_at DESC, v.id \
         LIMIT $3 OFFSET $4"
    );
    let items = sqlx::query_as::<_, ReviewItem>(&sql)
        .bind(query.space_id)
        .bind(query.user_id)
        .bind(params.per_page())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    let counts: Vec<(i32, i64)> = sqlx::query_as(&format!(
        "SELECT v.rating, COUNT(*) FROM reviews v WHERE {FILTER} GROUP BY v.rating"
    ))
    .bind(query.space_id)
    .bind(query.user_id)
    .fetch_all(&pool)
    .await?;

    let summary = ReviewSummary::from_counts(&counts);
    let pagination = PaginationMetadata::from_params(&params, summary.total_reviews);

    Ok(ListReviewsResponse {
        items,
        summary,
        pagination,
    })
}
