//! Database queries for audit logs

use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::debug;

use super::models::{
    AuditEntry, AuditQuery, CreateAuditEntry, ResourceType, DEFAULT_AUDIT_QUERY_LIMIT,
    MAX_AUDIT_QUERY_LIMIT,
};
use crate::error::ServerResult;

const AUDIT_COLUMNS: &str = "id, user_id, action, resource_type, resource_id, \
                             changes, ip_address, user_agent, timestamp, metadata";

async fn insert_entry<'e, E>(executor: E, entry: &CreateAuditEntry) -> sqlx::Result<AuditEntry>
where
    E: PgExecutor<'e>,
{
    let sql = format!(
        r#"
        INSERT INTO audit_log (
            user_id, action, resource_type, resource_id,
            changes, ip_address, user_agent, metadata
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {AUDIT_COLUMNS}
        "#
    );

    sqlx::query_as::<_, AuditEntry>(&sql)
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id)
        .bind(&entry.changes)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(&entry.metadata)
        .fetch_one(executor)
        .await
}

/// Create a new audit log entry
pub async fn create_audit_entry(
    pool: &PgPool,
    entry: CreateAuditEntry,
) -> ServerResult<AuditEntry> {
    let record = insert_entry(pool, &entry).await?;

    debug!(
        audit_id = %record.id,
        action = %entry.action,
        resource_type = %entry.resource_type,
        "Created audit log entry"
    );

    Ok(record)
}

/// Record an entry on an open transaction so it commits or rolls back with
/// the state change it describes.
pub async fn record_in_tx(conn: &mut PgConnection, entry: CreateAuditEntry) -> sqlx::Result<()> {
    let record = insert_entry(&mut *conn, &entry).await?;

    debug!(
        audit_id = %record.id,
        action = %entry.action,
        resource_id = ?entry.resource_id,
        "Recorded audit entry in transaction"
    );

    Ok(())
}

/// Query audit logs with filters
pub async fn query_audit_logs(pool: &PgPool, query: AuditQuery) -> ServerResult<Vec<AuditEntry>> {
    let limit = query.limit.clamp(1, MAX_AUDIT_QUERY_LIMIT);
    let offset = query.offset.max(0);

    let mut sql = format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE 1=1");
    let mut bind_count = 1;

    let filters = [
        (query.user_id.is_some(), "user_id ="),
        (query.action.is_some(), "action ="),
        (query.resource_type.is_some(), "resource_type ="),
        (query.resource_id.is_some(), "resource_id ="),
        (query.start_time.is_some(), "timestamp >="),
        (query.end_time.is_some(), "timestamp <="),
    ];
    for (present, condition) in filters {
        if present {
            sql.push_str(&format!(" AND {} ${}", condition, bind_count));
            bind_count += 1;
        }
    }

    sql.push_str(&format!(
        " ORDER BY timestamp DESC LIMIT ${} OFFSET ${}",
        bind_count,
        bind_count + 1
    ));

    // Bind in the same order the conditions were pushed
    let mut query_builder = sqlx::query_as::<_, AuditEntry>(&sql);
    if let Some(user_id) = query.user_id {
        query_builder = query_builder.bind(user_id);
    }
    if let Some(action) = query.action {
        query_builder = query_builder.bind(action.as_str());
    }
    if let Some(resource_type) = query.resource_type {
        query_builder = query_builder.bind(resource_type.as_str());
    }
    if let Some(resource_id) = query.resource_id {
        query_builder = query_builder.bind(resource_id);
    }
    if let Some(start_time) = query.start_time {
        query_builder = query_builder.bind(start_time);
    }
    if let Some(end_time) = query.end_time {
        query_builder = query_builder.bind(end_time);
    }

    let records = query_builder
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    debug!(count = records.len(), "Queried audit logs");

    Ok(records)
}

/// Audit trail of one resource, newest first
pub async fn get_audit_trail(
    pool: &PgPool,
    resource_type: ResourceType,
    resource_id: uuid::Uuid,
    limit: Option<i64>,
) -> ServerResult<Vec<AuditEntry>> {
    query_audit_logs(
        pool,
        AuditQuery {
            resource_type: Some(resource_type),
            resource_id: Some(resource_id),
            limit: limit.unwrap_or(DEFAULT_AUDIT_QUERY_LIMIT),
            ..AuditQuery::default()
        },
    )
    .await
}
