//! List spaces query
//!
//! Each row carries its review aggregate. Optional filters narrow by minimum
//! capacity and maximum hourly price.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};
use crate::features::spaces::types::{SpaceItem, SpaceRow, RATING_JOIN, SPACE_SELECT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListSpacesQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Only spaces that fit at least this many attendees
    pub min_capacity: Option<i32>,
    /// Only spaces at or below this hourly price
    pub max_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSpacesResponse {
    pub items: Vec<SpaceItem>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListSpacesError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<ListSpacesResponse, ListSpacesError>> for ListSpacesQuery {}

impl crate::cqrs::middleware::Query for ListSpacesQuery {}

impl ListSpacesQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn validate(&self) -> Result<(), ListSpacesError> {
        self.pagination()
            .validate()
            .map_err(ListSpacesError::InvalidPagination)
    }
}

const FILTER: &str = "($1::int IS NULL OR s.capacity >= $1) \
     AND ($2::bigint IS NULL OR s.price_per_hour_cents <= $2)";

#[tracing::instrument(skip(pool), fields(page = ?query.page, per_page = ?query.per_page))]
pub async fn handle(pool: PgPool, query: ListSpacesQuery) -> Result<ListSpacesResponse, ListSpacesError> {
    query.validate()?;
    let params = query.pagination();

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM rental_spaces s WHERE {FILTER}"
    ))
    .bind(query.min_capacity)
    .bind(query.max_price_cents)
    .fetch_one(&pool)
    .await?;

    let sql = format!(
        "SELECT {SPACE_SELECT} FROM rental_spaces s {RATING_JOIN} \
         WHERE {FILTER} \
         ORDER BY s.name \
         LIMIT $3 OFFSET $4"
    );
    let rows = sqlx::query_as::<_, SpaceRow>(&sql)
        .bind(query.min_capacity)
        .bind(query.max_price_cents)
        .bind(params.per_page())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    Ok(ListSpacesResponse {
        items: rows.into_iter().map(SpaceItem::from).collect(),
        pagination: PaginationMetadata::from_params(&params, total),
    })
}
