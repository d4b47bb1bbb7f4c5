//! Database-backed tests for the audit layer. Run with DATABASE_URL set and `--ignored`.

use super::middleware::*;
use super::models::{AuditQuery, ResourceType};
use super::queries::query_audit_logs;
use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

async fn created(Json(payload): Json<serde_json::Value>) -> impl axum::response::IntoResponse {
    (StatusCode::CREATED, Json(json!({"id": Uuid::new_v4(), "data": payload})))
}

async fn ok() -> impl axum::response::IntoResponse {
    (StatusCode::OK, Json(json!({"ok": true})))
}

async fn conflict() -> impl axum::response::IntoResponse {
    (StatusCode::CONFLICT, Json(json!({"error": "taken"})))
}

fn router(pool: PgPool) -> Router {
    Router::new()
        .route("/api/v1/reservations", post(created).get(ok))
        .route("/api/v1/reservations/:id", delete(ok))
        .route("/api/v1/reservations/:id/payments", post(ok))
        .route("/api/v1/spaces", post(conflict))
        .route("/api/v1/health", get(ok))
        .layer(AuditLayer::new(pool))
}

async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> StatusCode {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("user-agent", "venue-tests/1.0")
        .header("x-user-id", "0b7c1f2e-9d47-4c55-8d3a-2f1b6f0c9e11");
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        },
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    // Entries are written on a spawned task
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    response.status()
}

async fn entries_for(pool: &PgPool, resource_type: ResourceType) -> Vec<super::AuditEntry> {
    query_audit_logs(
        pool,
        AuditQuery {
            resource_type: Some(resource_type),
            ..AuditQuery::default()
        },
    )
    .await
    .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_post_records_body_and_client(pool: PgPool) -> sqlx::Result<()> {
    let body = json!({"space_id": Uuid::new_v4(), "attendees": 40});
    let status = send(router(pool.clone()), Method::POST, "/api/v1/reservations", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let entries = entries_for(&pool, ResourceType::Reservation).await;
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.action, "create");
    assert_eq!(entry.changes.as_ref().unwrap()["attendees"], 40);
    assert_eq!(entry.user_agent.as_deref(), Some("venue-tests/1.0"));
    assert!(entry.user_id.is_some());

    let metadata = entry.metadata.as_ref().unwrap();
    assert_eq!(metadata["source"], "http");
    assert_eq!(metadata["method"], "POST");
    assert_eq!(metadata["status"], 201);

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_reservation_is_a_cancel(pool: PgPool) -> sqlx::Result<()> {
    let id = Uuid::new_v4();
    let uri = format!("/api/v1/reservations/{id}");
    send(router(pool.clone()), Method::DELETE, &uri, None).await;

    let entries = entries_for(&pool, ResourceType::Reservation).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "cancel");
    assert_eq!(entries[0].resource_id, Some(id));
    assert!(entries[0].changes.is_none());

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_capture_is_recorded_against_payment(pool: PgPool) -> sqlx::Result<()> {
    let id = Uuid::new_v4();
    send(router(pool.clone()), Method::POST, &format!("/api/v1/reservations/{id}/payments"), None).await;

    let entries = entries_for(&pool, ResourceType::Payment).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "capture");

    Ok(())
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_reads_and_failures_not_audited(pool: PgPool) -> sqlx::Result<()> {
    let app = router(pool.clone());
    assert_eq!(send(app.clone(), Method::GET, "/api/v1/reservations", None).await, StatusCode::OK);
    assert_eq!(
        send(app, Method::POST, "/api/v1/spaces", Some(json!({"name": "Hall"}))).await,
        StatusCode::CONFLICT
    );

    let all = query_audit_logs(&pool, AuditQuery::default()).await.unwrap();
    assert!(all.is_empty());

    Ok(())
}
