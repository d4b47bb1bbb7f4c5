//! Create space command
//!
//! Adds a rentable space to the catalog. Prices are integer cents per hour.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};

use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::{
    validate_name, validate_text, validate_url, NameValidationError, TextValidationError,
    UrlValidationError, MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};
use crate::features::spaces::types::{SpaceItem, SpaceRow};

/// ```rust,ignore
/// let command = CreateSpaceCommand {
///     name: "Main Fellowship Hall".to_string(),
///     description: Some("Our largest indoor space".to_string()),
///     price_per_hour_cents: 7_500,
///     capacity: 150,
///     photos: vec![],
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSpaceCommand {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price_per_hour_cents: i64,
    pub capacity: i32,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateSpaceError {
    #[error("Name validation failed: {0}")]
    NameValidation(#[from] NameValidationError),

    #[error(transparent)]
    DescriptionValidation(#[from] TextValidationError),

    #[error("Photo URL validation failed: {0}")]
    PhotoValidation(#[from] UrlValidationError),

    #[error("Price per hour must be positive, got {0} cents")]
    InvalidPrice(i64),

    #[error("Capacity must be positive, got {0}")]
    InvalidCapacity(i32),

    #[error("A space named '{0}' already exists")]
    DuplicateName(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<SpaceItem, CreateSpaceError>> for CreateSpaceCommand {}

impl crate::cqrs::middleware::Command for CreateSpaceCommand {}

impl CreateSpaceCommand {
    pub fn validate(&self) -> Result<(), CreateSpaceError> {
        validate_name(&self.name, MAX_NAME_LENGTH)?;
        validate_text(self.description.as_deref(), "description", MAX_TEXT_LENGTH)?;
        if self.price_per_hour_cents <= 0 {
            return Err(CreateSpaceError::InvalidPrice(self.price_per_hour_cents));
        }
        if self.capacity <= 0 {
            return Err(CreateSpaceError::InvalidCapacity(self.capacity));
        }
        for photo in &self.photos {
            validate_url(photo, "photo")?;
        }
        Ok(())
    }
}

#[tracing::instrument(skip(pool, command), fields(name = %command.name))]
pub async fn handle(pool: PgPool, command: CreateSpaceCommand) -> Result<SpaceItem, CreateSpaceError> {
    command.validate()?;

    let name = command.name.trim().to_string();

    let row = sqlx::query_as::<_, SpaceRow>(
        r#"
        INSERT INTO rental_spaces (name, description, price_per_hour_cents, capacity, photos)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, name, description, price_per_hour_cents, capacity, photos,
                  created_at, updated_at,
                  NULL::float8 AS average_rating, 0::bigint AS review_count
        "#,
    )
    .bind(&name)
    .bind(&command.description)
    .bind(command.price_per_hour_cents)
    .bind(command.capacity)
    .bind(Json(&command.photos))
    .fetch_one(&pool)
    .await
    .map_err(|e| map_unique_violation(e, CreateSpaceError::DuplicateName(name.clone()), CreateSpaceError::Database))?;

    tracing::info!(space_id = %row.id, "Space created");

    Ok(row.into())
}
