//! Classification of Postgres constraint violations
//!
//! Commands translate storage-level guards (unique emails, one review per
//! reservation, the no-overlap exclusion constraint, RESTRICT foreign keys)
//! into their own domain errors with these helpers.
//!
//! ```rust,ignore
//! sqlx::query("INSERT INTO reviews ...")
//!     .execute(&pool)
//!     .await
//!     .map_err(|e| map_unique_violation(e, CreateReviewError::AlreadyReviewed(id), CreateReviewError::Database))?;
//! ```

use sqlx::error::ErrorKind;
use sqlx::Error as SqlxError;

/// SQLSTATE raised when an `EXCLUDE` constraint rejects a row
pub const EXCLUSION_VIOLATION: &str = "23P01";

/// Result of checking for a database constraint violation
#[derive(Debug)]
pub enum ConstraintViolation {
    Unique { constraint: Option<String> },
    ForeignKey { constraint: Option<String> },
    Exclusion { constraint: Option<String> },
    Check { constraint: Option<String> },
    /// Not a constraint violation
    Other(SqlxError),
}

/// Classify `error` by the constraint that rejected the write
pub fn check_constraint_violation(error: SqlxError) -> ConstraintViolation {
    if let SqlxError::Database(ref db_err) = error {
        let constraint = db_err.constraint().map(str::to_string);
        if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return ConstraintViolation::Exclusion { constraint };
        }
        match db_err.kind() {
            ErrorKind::UniqueViolation => return ConstraintViolation::Unique { constraint },
            ErrorKind::ForeignKeyViolation => {
                return ConstraintViolation::ForeignKey { constraint }
            },
            ErrorKind::CheckViolation => return ConstraintViolation::Check { constraint },
            _ => {},
        }
    }
    ConstraintViolation::Other(error)
}

pub fn is_unique_violation(error: &SqlxError) -> bool {
    matches!(error, SqlxError::Database(db_err) if db_err.is_unique_violation())
}

pub fn is_foreign_key_violation(error: &SqlxError) -> bool {
    matches!(error, SqlxError::Database(db_err) if db_err.is_foreign_key_violation())
}

/// Whether `error` is the no-overlap exclusion constraint (or any other `EXCLUDE`)
pub fn is_exclusion_violation(error: &SqlxError) -> bool {
    matches!(
        error,
        SqlxError::Database(db_err) if db_err.code().as_deref() == Some(EXCLUSION_VIOLATION)
    )
}

/// Return `unique_error` on a unique violation, otherwise wrap the original error
pub fn map_unique_violation<E, F>(error: SqlxError, unique_error: E, default_wrapper: F) -> E
where
    F: FnOnce(SqlxError) -> E,
{
    if is_unique_violation(&error) {
        unique_error
    } else {
        default_wrapper(error)
    }
}

/// Return `fk_error` on a foreign key violation, otherwise wrap the original error
pub fn map_foreign_key_violation<E, F>(error: SqlxError, fk_error: E, default_wrapper: F) -> E
where
    F: FnOnce(SqlxError) -> E,
{
    if is_foreign_key_violation(&error) {
        fk_error
    } else {
        default_wrapper(error)
    }
}
