pub mod get;
pub mod list;

pub use get::{GetReviewError, GetReviewQuery};
pub use list::{ListReviewsError, ListReviewsQuery, ListReviewsResponse};
