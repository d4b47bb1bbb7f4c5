//! Review read model and the on-read rating aggregate

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Columns selected for [`ReviewItem`]; expects `v` = reviews, `u` = users, `s` = rental_spaces
pub(crate) const REVIEW_SELECT: &str = "v.id, v.reservation_id, v.user_id, v.space_id, \
     v.rating, v.comment, v.created_at, v.updated_at, \
     u.full_name AS user_name, s.name AS space_name";

pub(crate) const REVIEW_JOINS: &str =
    "JOIN users u ON u.id = v.user_id JOIN rental_spaces s ON s.id = v.space_id";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewItem {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub user_id: Uuid,
    pub space_id: Uuid,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_name: String,
    pub space_name: String,
}

/// Average, count, and per-star distribution, computed from the rows on every read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSummary {
    pub average_rating: Option<f64>,
    pub total_reviews: i64,
    pub rating_distribution: BTreeMap<i32, i64>,
}

impl ReviewSummary {
    /// Build from `(rating, count)` groups. Every star from 1 to 5 appears in
    /// the distribution, with zero when nobody gave it.
    pub fn from_counts(counts: &[(i32, i64)]) -> Self {
        let mut rating_distribution: BTreeMap<i32, i64> = (1..=5).map(|r| (r, 0)).collect();
        for &(rating, count) in counts {
            *rating_distribution.entry(rating).or_insert(0) += count;
        }

        let total_reviews: i64 = rating_distribution.values().sum();
        let weighted: i64 = rating_distribution
            .iter()
            .map(|(rating, count)| i64::from(*rating) * count)
            .sum();

        let average_rating = (total_reviews > 0)
            .then(|| (weighted as f64 / total_reviews as f64 * 100.0).round() / 100.0);

        Self {
            average_rating,
            total_reviews,
            rating_distribution,
        }
    }
}
