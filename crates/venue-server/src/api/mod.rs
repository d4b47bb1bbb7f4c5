//! Router assembly
//!
//! Builds the full HTTP surface: health check, audit trail, and the feature
//! slices under `/api/v1`, wrapped in the shared middleware stack.

pub mod response;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use tower_http::compression::CompressionLayer;

use crate::{audit, config::Config, db, features, middleware};
use response::{ApiResponse, ErrorResponse};

/// Create the application router with all routes and middleware
pub fn create_router(state: features::FeatureState, config: &Config) -> Router {
    let pool = state.db.clone();

    let api_v1 = features::router(state).merge(
        Router::new()
            .route("/audit", get(query_audit_logs))
            .with_state(pool.clone()),
    );

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(pool.clone())
        .nest("/api/v1", api_v1)
        // Applied innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
        .layer(audit::AuditLayer::new(pool))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Venue Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health_check(State(pool): State<PgPool>) -> Response {
    match db::health_check(&pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable"
                })),
            )
                .into_response()
        },
    }
}

/// `GET /api/v1/audit?resource_type=reservation&resource_id=...`
async fn query_audit_logs(
    State(pool): State<PgPool>,
    Query(query): Query<audit::AuditQuery>,
) -> Response {
    match audit::query_audit_logs(&pool, query).await {
        Ok(entries) => ApiResponse::success(entries).into_response(),
        Err(e) => ErrorResponse::internal("audit query", &e),
    }
}
