//! List reservations query
//!
//! Filters combine with AND; newest start first.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::ReservationStatus;

use crate::db::DbError;
use crate::features::reservations::types::{ReservationDetailRow, ReservationView, DETAIL_SELECT};
use crate::features::shared::pagination::{PaginationMetadata, PaginationParams};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListReservationsQuery {
    pub user_id: Option<Uuid>,
    pub space_id: Option<Uuid>,
    pub status: Option<ReservationStatus>,
    /// Reservations starting at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Reservations ending at or before this instant
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListReservationsResponse {
    pub items: Vec<ReservationView>,
    pub pagination: PaginationMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum ListReservationsError {
    #[error("{0}")]
    InvalidPagination(&'static str),
    #[error("start_date must be before end_date")]
    InvalidDateRange,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<ListReservationsResponse, ListReservationsError>> for ListReservationsQuery {}

impl crate::cqrs::middleware::Query for ListReservationsQuery {}

impl ListReservationsQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.per_page)
    }

    pub fn validate(&self) -> Result<(), ListReservationsError> {
        self.pagination()
            .validate()
            .map_err(ListReservationsError::InvalidPagination)?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start >= end {
                return Err(ListReservationsError::InvalidDateRange);
            }
        }
        Ok(())
    }
}

const FILTER: &str = "($1::uuid IS NULL OR r.user_id = $1) \
     AND ($2::uuid IS NULL OR r.space_id = $2) \
     AND ($3::text IS NULL OR r.status = $3) \
     AND ($4::timestamptz IS NULL OR r.start_time >= $4) \
     AND ($5::timestamptz IS NULL OR r.end_time <= $5)";

#[tracing::instrument(
    skip(pool, query),
    fields(user_id = ?query.user_id, space_id = ?query.space_id, status = ?query.status)
)]
pub async fn handle(
    pool: PgPool,
    query: ListReservationsQuery,
) -> Result<ListReservationsResponse, ListReservationsError> {
    query.validate()?;
    let params = query.pagination();
    let status = query.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM reservations r WHERE {FILTER}"
    ))
    .bind(query.user_id)
    .bind(query.space_id)
    .bind(status)
    .bind(query.start_date)
    .bind(query.end_date)
    .fetch_one(&pool)
    .await?;

    let sql = format!(
        "{DETAIL_SELECT} WHERE {FILTER} ORDER BY r.start_time DESC, r.id LIMIT $6 OFFSET $7"
    );
    let rows = sqlx::query_as::<_, ReservationDetailRow>(&sql)
        .bind(query.user_id)
        .bind(query.space_id)
        .bind(status)
        .bind(query.start_date)
        .bind(query.end_date)
        .bind(params.per_page())
        .bind(params.offset())
        .fetch_all(&pool)
        .await?;

    let now = Utc::now();
    let items = rows
        .into_iter()
        .map(|row| row.into_view(now))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ListReservationsResponse {
        items,
        pagination: PaginationMetadata::from_params(&params, total),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};

    #[test]
    fn test_validate() {
        assert!(ListReservationsQuery::default().validate().is_ok());

        let inverted = ListReservationsQuery {
            start_date: Some(at(12)),
            end_date: Some(at(10)),
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(ListReservationsError::InvalidDateRange)));

        let bad_page = ListReservationsQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(matches!(bad_page.validate(), Err(ListReservationsError::InvalidPagination(_))));
    }

    #[test]
    fn test_status_deserializes_from_query_string() {
        let query: ListReservationsQuery =
            serde_json::from_value(serde_json::json!({"status": "confirmed"})).unwrap();
        assert_eq!(query.status, Some(ReservationStatus::Confirmed));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_filters_and_order(pool: PgPool) -> sqlx::Result<()> {
        let sarah = TestUser::new("Sarah Johnson").insert(&pool).await?;
        let david = TestUser::new("David Thompson").insert(&pool).await?;
        let hall = TestSpace::new("Main Fellowship Hall").insert(&pool).await?;

        TestReservation::new(&sarah, &hall, at(8), at(10)).confirmed("ch_1").insert(&pool).await?;
        TestReservation::new(&sarah, &hall, at(12), at(14)).insert(&pool).await?;
        TestReservation::new(&david, &hall, at(16), at(18)).cancelled().insert(&pool).await?;

        let mine = handle(
            pool.clone(),
            ListReservationsQuery {
                user_id: Some(sarah.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(mine.pagination.total, 2);
        assert_eq!(mine.items[0].start_time, at(12));
        assert_eq!(mine.items[0].user_name, "Sarah Johnson");
        assert_eq!(mine.items[0].space_name, hall.name);

        let confirmed = handle(
            pool.clone(),
            ListReservationsQuery {
                space_id: Some(hall.id),
                status: Some(ReservationStatus::Confirmed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(confirmed.items.len(), 1);

        let morning = handle(
            pool.clone(),
            ListReservationsQuery {
                end_date: Some(at(11)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(morning.pagination.total, 1);
        Ok(())
    }
}
