use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::features::shared::error_helpers::map_foreign_key_violation;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSpaceCommand {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSpaceResponse {
    pub id: Uuid,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteSpaceError {
    #[error("Space '{0}' not found")]
    NotFound(Uuid),
    #[error("Cannot delete space '{0}': it has reservations")]
    HasReservations(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<DeleteSpaceResponse, DeleteSpaceError>> for DeleteSpaceCommand {}

impl crate::cqrs::middleware::Command for DeleteSpaceCommand {}

/// Spaces referenced by any reservation, cancelled ones included, are kept.
#[tracing::instrument(skip(pool), fields(space_id = %command.id))]
pub async fn handle(
    pool: PgPool,
    command: DeleteSpaceCommand,
) -> Result<DeleteSpaceResponse, DeleteSpaceError> {
    let deleted: Option<Uuid> =
        sqlx::query_scalar("DELETE FROM rental_spaces WHERE id = $1 RETURNING id")
            .bind(command.id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| {
                map_foreign_key_violation(
                    e,
                    DeleteSpaceError::HasReservations(command.id),
                    DeleteSpaceError::Database,
                )
            })?;

    match deleted {
        Some(id) => {
            tracing::info!("Space deleted");
            Ok(DeleteSpaceResponse { id, deleted: true })
        },
        None => Err(DeleteSpaceError::NotFound(command.id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::{at, TestReservation, TestSpace, TestUser};

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_space_with_reservations_conflicts(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("Sarah Johnson").insert(&pool).await?;
        let space = TestSpace::new("Main Fellowship Hall").insert(&pool).await?;
        TestReservation::new(&user, &space, at(10), at(12))
            .cancelled()
            .insert(&pool)
            .await?;

        let result = handle(pool.clone(), DeleteSpaceCommand { id: space.id }).await;
        assert!(matches!(result, Err(DeleteSpaceError::HasReservations(_))));
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_unreferenced_space(pool: PgPool) -> sqlx::Result<()> {
        let space = TestSpace::new("Kitchen Facility").insert(&pool).await?;

        let response = handle(pool.clone(), DeleteSpaceCommand { id: space.id }).await.unwrap();
        assert!(response.deleted);

        let again = handle(pool.clone(), DeleteSpaceCommand { id: space.id }).await;
        assert!(matches!(again, Err(DeleteSpaceError::NotFound(_))));
        Ok(())
    }
}
