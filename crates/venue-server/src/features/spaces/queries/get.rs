use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::spaces::types::{SpaceItem, SpaceRow, RATING_JOIN, SPACE_SELECT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSpaceQuery {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum GetSpaceError {
    #[error("Space '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<SpaceItem, GetSpaceError>> for GetSpaceQuery {}

impl crate::cqrs::middleware::Query for GetSpaceQuery {}

#[tracing::instrument(skip(pool), fields(space_id = %query.id))]
pub async fn handle(pool: PgPool, query: GetSpaceQuery) -> Result<SpaceItem, GetSpaceError> {
    let sql = format!("SELECT {SPACE_SELECT} FROM rental_spaces s {RATING_JOIN} WHERE s.id = $1");

    sqlx::query_as::<_, SpaceRow>(&sql)
        .bind(query.id)
        .fetch_optional(&pool)
        .await?
        .map(SpaceItem::from)
        .ok_or(GetSpaceError::NotFound(query.id))
}
