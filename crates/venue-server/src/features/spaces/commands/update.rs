use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::features::shared::error_helpers::map_unique_violation;
use crate::features::shared::validation::{
    validate_name, validate_text, validate_url, NameValidationError, TextValidationError,
    UrlValidationError, MAX_NAME_LENGTH, MAX_TEXT_LENGTH,
};
use crate::features::spaces::types::{SpaceItem, SpaceRow, RATING_JOIN, SPACE_SELECT};

/// Partial update; omitted fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpaceCommand {
    #[serde(skip)]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_hour_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photos: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateSpaceError {
    #[error("At least one field must be provided")]
    NoFieldsToUpdate,
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
    #[error("Space '{0}' not found")]
    NotFound(Uuid),
    #[error("A space named '{0}' already exists")]
    DuplicateName(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<SpaceItem, UpdateSpaceError>> for UpdateSpaceCommand {}

impl crate::cqrs::middleware::Command for UpdateSpaceCommand {}

impl UpdateSpaceCommand {
    pub fn validate(&self) -> Result<(), UpdateSpaceError> {
        if self.name.is_none()
            && self.description.is_none()
            && self.price_per_hour_cents.is_none()
            && self.capacity.is_none()
            && self.photos.is_none()
        {
            return Err(UpdateSpaceError::NoFieldsToUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(name, MAX_NAME_LENGTH)?;
        }
        validate_text(self.description.as_deref(), "description", MAX_TEXT_LENGTH)?;
        if let Some(price) = self.price_per_hour_cents.filter(|p| *p <= 0) {
            return Err(UpdateSpaceError::InvalidPrice(price));
        }
        if let Some(capacity) = self.capacity.filter(|c| *c <= 0) {
            return Err(UpdateSpaceError::InvalidCapacity(capacity));
        }
        for photo in self.photos.iter().flatten() {
            validate_url(photo, "photo")?;
        }
        Ok(())
    }
}

/// Price changes apply to reservations made afterwards; existing totals are kept.
#[tracing::instrument(skip(pool, command), fields(space_id = %command.id))]
pub async fn handle(pool: PgPool, command: UpdateSpaceCommand) -> Result<SpaceItem, UpdateSpaceError> {
    command.validate()?;

    let name = command.name.as_deref().map(str::trim);

    let sql = format!(
        r#"
        WITH s AS (
            UPDATE rental_spaces
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_per_hour_cents = COALESCE($4, price_per_hour_cents),
                capacity = COALESCE($5, capacity),
                photos = COALESCE($6, photos)
            WHERE id = $1
            RETURNING *
        )
        SELECT {SPACE_SELECT} FROM s {RATING_JOIN}
        "#
    );

    let row = sqlx::query_as::<_, SpaceRow>(&sql)
        .bind(command.id)
        .bind(name)
        .bind(&command.description)
        .bind(command.price_per_hour_cents)
        .bind(command.capacity)
        .bind(command.photos.as_ref().map(Json))
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            map_unique_violation(
                e,
                UpdateSpaceError::DuplicateName(name.unwrap_or_default().to_string()),
                UpdateSpaceError::Database,
            )
        })?
        .ok_or(UpdateSpaceError::NotFound(command.id))?;

    tracing::info!("Space updated");

    Ok(row.into())
}
