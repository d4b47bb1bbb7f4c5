//! Availability of a space over a date range
//!
//! Returns the slots that keep other customers out: confirmed reservations,
//! and pending holds that have not expired when pending holds block. Nothing
//! about who booked a slot is exposed.

use chrono::{DateTime, Duration, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use venue_common::{BookingPolicy, ReservationStatus};

use crate::db::{self, DbError};

/// Longest range a single availability request may cover
pub const MAX_RANGE_DAYS: i64 = 93;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailabilityQuery {
    #[serde(skip)]
    pub space_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAvailabilityResponse {
    pub space_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub slots: Vec<AvailabilitySlot>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetAvailabilityError {
    #[error("end_date must be after start_date")]
    InvalidRange,
    #[error("Availability can be requested for at most {MAX_RANGE_DAYS} days at a time")]
    RangeTooLong,
    #[error("Space '{0}' not found")]
    SpaceNotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Storage(#[from] DbError),
}

impl Request<Result<GetAvailabilityResponse, GetAvailabilityError>> for GetAvailabilityQuery {}

impl crate::cqrs::middleware::Query for GetAvailabilityQuery {}

impl GetAvailabilityQuery {
    pub fn validate(&self) -> Result<(), GetAvailabilityError> {
        if self.end_date <= self.start_date {
            return Err(GetAvailabilityError::InvalidRange);
        }
        if self.end_date - self.start_date > Duration::days(MAX_RANGE_DAYS) {
            return Err(GetAvailabilityError::RangeTooLong);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, policy), fields(space_id = %query.space_id))]
pub async fn handle(
    pool: PgPool,
    policy: &BookingPolicy,
    query: GetAvailabilityQuery,
) -> Result<GetAvailabilityResponse, GetAvailabilityError> {
    query.validate()?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rental_spaces WHERE id = $1)")
        .bind(query.space_id)
        .fetch_one(&pool)
        .await?;
    if !exists {
        return Err(GetAvailabilityError::SpaceNotFound(query.space_id));
    }

    let now = Utc::now();
    let bookings =
        db::reservations::list_active_in_range(&pool, query.space_id, query.start_date, query.end_date)
            .await?;

    let slots = bookings
        .into_iter()
        .filter(|booking| booking.blocks(policy, now))
        .map(|booking| AvailabilitySlot {
            start_time: booking.window.start(),
            end_time: booking.window.end(),
            status: booking.status,
        })
        .collect();

    Ok(GetAvailabilityResponse {
        space_id: query.space_id,
        start_date: query.start_date,
        end_date: query.end_date,
        slots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};

    fn query(start: DateTime<Utc>, end: DateTime<Utc>) -> GetAvailabilityQuery {
        GetAvailabilityQuery {
            space_id: Uuid::new_v4(),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_validate_range() {
        assert!(query(at(0), at(23)).validate().is_ok());
        assert!(matches!(
            query(at(12), at(12)).validate(),
            Err(GetAvailabilityError::InvalidRange)
        ));
        assert!(matches!(
            query(at(0), at(0) + Duration::days(120)).validate(),
            Err(GetAvailabilityError::RangeTooLong)
        ));
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_only_blocking_slots_are_listed(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Michael Davis").insert(&pool).await?;
        let space = TestSpace::new("Outdoor Pavilion").insert(&pool).await?;

        TestReservation::new(&user, &space, at(8), at(10)).confirmed("ch_a").insert(&pool).await?;
        TestReservation::new(&user, &space, at(10), at(12)).insert(&pool).await?;
        TestReservation::new(&user, &space, at(12), at(14)).expired().insert(&pool).await?;
        TestReservation::new(&user, &space, at(14), at(16)).cancelled().insert(&pool).await?;

        let response = handle(
            pool.clone(),
            &BookingPolicy::default(),
            GetAvailabilityQuery {
                space_id: space.id,
                start_date: at(0),
                end_date: at(23),
            },
        )
        .await
        .unwrap();

        let statuses: Vec<_> = response.slots.iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![ReservationStatus::Confirmed, ReservationStatus::Pending]);
        assert_eq!(response.slots[1].start_time, at(10));

        let serialized = serde_json::to_value(&response).unwrap();
        assert!(serialized["slots"][0].get("user_id").is_none());
        Ok(())
    }
}
