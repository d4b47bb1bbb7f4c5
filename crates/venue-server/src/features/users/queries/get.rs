use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUserQuery {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GetUserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reservation_count: i64,
    pub review_count: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum GetUserError {
    #[error("User '{0}' not found")]
    NotFound(Uuid),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<GetUserResponse, GetUserError>> for GetUserQuery {}

impl crate::cqrs::middleware::Query for GetUserQuery {}

#[tracing::instrument(skip(pool), fields(user_id = %query.id))]
pub async fn handle(pool: PgPool, query: GetUserQuery) -> Result<GetUserResponse, GetUserError> {
    sqlx::query_as::<_, GetUserResponse>(
        r#"
        SELECT u.id, u.full_name, u.email, u.role, u.created_at, u.updated_at,
               (SELECT COUNT(*) FROM reservations r WHERE r.user_id = u.id) AS reservation_count,
               (SELECT COUNT(*) FROM reviews v WHERE v.user_id = u.id) AS review_count
        FROM users u
        WHERE u.id = $1
        "#,
    )
    .bind(query.id)
    .fetch_optional(&pool)
    .await?
    .ok_or(GetUserError::NotFound(query.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::TestUser;

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_get_user_with_counts(pool: PgPool) -> sqlx::Result<()> {
        let user = TestUser::new("David Thompson").insert(&pool).await?;

        let found = handle(pool.clone(), GetUserQuery { id: user.id }).await.unwrap();
        assert_eq!(found.full_name, "David Thompson");
        assert_eq!(found.reservation_count, 0);
        assert_eq!(found.review_count, 0);
        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_get_missing_user(pool: PgPool) -> sqlx::Result<()> {
        let result = handle(pool, GetUserQuery { id: Uuid::new_v4() }).await;
        assert!(matches!(result, Err(GetUserError::NotFound(_))));
        Ok(())
    }
}
