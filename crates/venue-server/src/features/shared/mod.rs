//! Shared utilities and types for feature modules
//!
//! - **pagination**: page/per_page handling for list queries
//! - **validation**: input validation utilities
//! - **error_helpers**: constraint violation classification
//! - **test_helpers**: database fixtures (test-only)

pub mod error_helpers;
pub mod pagination;
pub mod validation;

#[cfg(test)]
pub mod test_helpers;

pub use pagination::{Paginated, PaginationMetadata, PaginationParams};
pub use validation::{validate_email, validate_name, validate_rating, validate_text, validate_url};
