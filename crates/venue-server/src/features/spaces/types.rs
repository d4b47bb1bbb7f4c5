//! Space read model
//!
//! Ratings are aggregated from `reviews` on every read rather than stored on
//! the space, so edits and deletions of reviews never leave them stale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use venue_common::Money;

/// Columns of a space row aliased `s`, joined with the rating aggregate `r`
pub(crate) const SPACE_SELECT: &str = "s.id, s.name, s.description, s.price_per_hour_cents, \
     s.capacity, s.photos, s.created_at, s.updated_at, r.average_rating, r.review_count";

/// Lateral rating aggregate for the space aliased `s`
pub(crate) const RATING_JOIN: &str = "CROSS JOIN LATERAL ( \
     SELECT ROUND(AVG(v.rating)::numeric, 2)::float8 AS average_rating, COUNT(v.id) AS review_count \
     FROM reviews v WHERE v.space_id = s.id) r";

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct SpaceRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_per_hour_cents: i64,
    pub capacity: i32,
    pub photos: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceItem {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_per_hour_cents: i64,
    /// Display form of the hourly price, e.g. `$75.00`
    pub price_per_hour: String,
    pub capacity: i32,
    pub photos: Vec<String>,
    pub average_rating: Option<f64>,
    pub review_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SpaceRow> for SpaceItem {
    fn from(row: SpaceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price_per_hour_cents: row.price_per_hour_cents,
            price_per_hour: Money::from_cents(row.price_per_hour_cents).to_string(),
            capacity: row.capacity,
            photos: row.photos.0,
            average_rating: row.average_rating,
            review_count: row.review_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_formats_price() {
        let now = Utc::now();
        let item = SpaceItem::from(SpaceRow {
            id: Uuid::new_v4(),
            name: "Main Fellowship Hall".to_string(),
            description: None,
            price_per_hour_cents: 7_500,
            capacity: 150,
            photos: Json(vec!["https://example.com/hall.jpg".to_string()]),
            created_at: now,
            updated_at: now,
            average_rating: None,
            review_count: 0,
        });

        assert_eq!(item.price_per_hour, "$75.00");
        assert_eq!(item.photos.len(), 1);

        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("description").is_none());
        assert!(value["average_rating"].is_null());
    }
}
