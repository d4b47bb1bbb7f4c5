pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    CreateReviewCommand, CreateReviewError, DeleteReviewCommand, DeleteReviewError,
    DeleteReviewResponse, UpdateReviewCommand, UpdateReviewError,
};
pub use queries::{
    GetReviewError, GetReviewQuery, ListReviewsError, ListReviewsQuery, ListReviewsResponse,
};
pub use types::{ReviewItem, ReviewSummary};

pub use routes::reviews_routes;
