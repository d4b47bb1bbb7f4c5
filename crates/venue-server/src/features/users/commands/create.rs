//! Create user command
//!
//! Users are the customers who book spaces and the administrators who manage
//! the catalog. Emails are unique across both roles.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::{
    validate_email, validate_name, EmailValidationError, NameValidationError, MAX_NAME_LENGTH,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }
}

/// Command to register a user
///
/// ```rust,ignore
/// let command = CreateUserCommand {
///     full_name: "Sarah Johnson".to_string(),
///     email: "sarah.johnson@email.com".to_string(),
///     role: UserRole::Customer,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserCommand {
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreateUserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error(transparent)]
    EmailValidation(#[from] EmailValidationError),

    #[error("A user with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<CreateUserResponse, CreateUserError>> for CreateUserCommand {}

impl crate::cqrs::middleware::Command for CreateUserCommand {}

impl CreateUserCommand {
    pub fn validate(&self) -> Result<(), CreateUserError> {
        validate_name(&self.full_name, MAX_NAME_LENGTH)?;
        validate_email(&self.email)?;
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(role = command.role.as_str()))]
pub async fn handle(
    pool: PgPool,
    command: CreateUserCommand,
) -> Result<CreateUserResponse, CreateUserError> {
    command.validate()?;

    let email = command.email.trim().to_lowercase();

    let user = sqlx::query_as::<_, CreateUserResponse>(
        r#"
        INSERT INTO users (full_name, email, role)
        VALUES ($1, $2, $3)
        RETURNING id, full_name, email, role, created_at
        "#,
    )
    .bind(command.full_name.trim())
    .bind(&email)
    .bind(command.role.as_str())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        map_unique_violation(e, CreateUserError::DuplicateEmail(email.clone()), CreateUserError::Database)
    })?;

    tracing::info!(user_id = %user.id, "User created");

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(full_name: &str, email: &str) -> CreateUserCommand {
        CreateUserCommand {
            full_name: full_name.to_string(),
            email: email.to_string(),
            role: UserRole::Customer,
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command("Sarah Johnson", "sarah.johnson@email.com").validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_blank_name() {
        assert!(matches!(
            command("  ", "sarah.johnson@email.com").validate(),
            Err(CreateUserError::NameValidation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_bad_email() {
        assert!(matches!(
            command("Sarah Johnson", "sarah.johnson").validate(),
            Err(CreateUserError::EmailValidation(_))
        ));
    }

    #[test]
    fn test_role_defaults_to_customer() {
        let cmd: CreateUserCommand = serde_json::from_value(serde_json::json!({
            "full_name": "Lisa Chen",
            "email": "lisa.chen@email.com"
        }))
        .unwrap();
        assert_eq!(cmd.role, UserRole::Customer);

        let admin: CreateUserCommand = serde_json::from_value(serde_json::json!({
            "full_name": "Admin User",
            "email": "admin@jrgrahamcenter.org",
            "role": "admin"
        }))
        .unwrap();
        assert_eq!(admin.role, UserRole::Admin);
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_handle_creates_user(pool: PgPool) -> sqlx::Result<()> {
        let user = handle(pool.clone(), command("Michael Davis", "Michael.Davis@Email.com"))
            .await
            .unwrap();
        assert_eq!(user.email, "michael.davis@email.com");
        assert_eq!(user.role, "customer");
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_handle_duplicate_email(pool: PgPool) -> sqlx::Result<()> {
        handle(pool.clone(), command("Emily Rodriguez", "emily@email.com"))
            .await
            .unwrap();
        let result = handle(pool.clone(), command("Emily R.", "EMILY@email.com")).await;
        assert!(matches!(result, Err(CreateUserError::DuplicateEmail(_))));
        Ok(())
    }
}
