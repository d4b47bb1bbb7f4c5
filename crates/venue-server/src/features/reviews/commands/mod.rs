pub mod create;
pub mod delete;
pub mod update;

pub use create::{CreateReviewCommand, CreateReviewError};
pub use delete::{DeleteReviewCommand, DeleteReviewError, DeleteReviewResponse};
pub use update::{UpdateReviewCommand, UpdateReviewError};
