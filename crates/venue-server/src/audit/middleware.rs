//! Tower layer that records every successful write request in `audit_log`
//!
//! GET requests pass straight through. For POST/PUT/PATCH/DELETE the body is
//! buffered so it can be stored as `changes` once the handler answers 2xx.

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request},
    http::Method,
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::{
    future::Future,
    net::SocketAddr,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::models::{AuditAction, CreateAuditEntry, ResourceType};
use super::queries::create_audit_entry;

/// Audit logging layer
#[derive(Clone)]
pub struct AuditLayer {
    pool: PgPool,
}

impl AuditLayer {
    /// Create a new audit layer with database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            pool: self.pool.clone(),
        }
    }
}

/// Audit middleware service
#[derive(Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    pool: PgPool,
}

impl<S> Service<Request> for AuditMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::fmt::Display,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let pool = self.pool.clone();

        Box::pin(async move {
            let method = request.method().clone();
            if !is_command(&method) {
                return inner.call(request).await;
            }

            let uri = request.uri().clone();
            let client = ClientInfo::from_request(&request);

            let (parts, body) = request.into_parts();
            let body_bytes = match body.collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    warn!(method = %method, uri = %uri, error = %e, "Failed to buffer request body");
                    Bytes::new()
                },
            };
            let request = Request::from_parts(parts, Body::from(body_bytes.clone()));

            let response = inner.call(request).await?;
            let status = response.status();

            if !status.is_success() {
                debug!(method = %method, uri = %uri, status = %status, "Command not audited");
                return Ok(response);
            }

            let (resource_type, resource_id) = infer_resource(&uri);
            let mut entry = CreateAuditEntry::new(infer_action(&method, &uri), resource_type)
                .user_id(client.user_id)
                .metadata(json!({
                    "source": "http",
                    "method": method.as_str(),
                    "uri": uri.to_string(),
                    "status": status.as_u16(),
                }));
            if let Some(id) = resource_id {
                entry = entry.resource_id(id);
            }
            if let Ok(changes) = serde_json::from_slice::<JsonValue>(&body_bytes) {
                entry = entry.changes(changes);
            }
            if let Some(ip) = client.ip_address {
                entry = entry.ip_address(ip);
            }
            if let Some(agent) = client.user_agent {
                entry = entry.user_agent(agent);
            }

            // Response is already decided; do not hold it on the insert
            tokio::spawn(async move {
                match create_audit_entry(&pool, entry).await {
                    Ok(saved) => info!(
                        audit_id = %saved.id,
                        action = %saved.action,
                        resource_type = %saved.resource_type,
                        "Audit log entry created"
                    ),
                    Err(e) => error!(error = %e, "Failed to create audit log entry"),
                }
            });

            Ok(response)
        })
    }
}

fn is_command(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Who sent the request, as far as the transport tells us
struct ClientInfo {
    ip_address: Option<String>,
    user_agent: Option<String>,
    user_id: Option<Uuid>,
}

impl ClientInfo {
    fn from_request(request: &Request) -> Self {
        let headers = request.headers();
        Self {
            ip_address: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string()),
            user_agent: headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            // Callers identify themselves with X-User-Id; there is no session layer
            user_id: headers
                .get("x-user-id")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok()),
        }
    }
}

/// Infer audit action from HTTP method and URI
pub(crate) fn infer_action(method: &Method, uri: &axum::http::Uri) -> AuditAction {
    let path = uri.path();
    match *method {
        Method::POST if path.ends_with("/payments") => AuditAction::Capture,
        Method::POST if path.ends_with("/confirm") => AuditAction::Confirm,
        Method::POST if path.ends_with("/refund") => AuditAction::Refund,
        Method::POST if path.ends_with("/cancel") => AuditAction::Cancel,
        Method::POST => AuditAction::Create,
        Method::PUT | Method::PATCH => AuditAction::Update,
        // Deleting a reservation cancels it; the row is kept
        Method::DELETE if path.contains("/reservations") => AuditAction::Cancel,
        Method::DELETE => AuditAction::Delete,
        _ => AuditAction::Other,
    }
}

/// Infer resource type and ID from URI
pub(crate) fn infer_resource(uri: &axum::http::Uri) -> (ResourceType, Option<Uuid>) {
    let path = uri.path();

    let resource_id = path
        .split('/')
        .find_map(|segment| Uuid::parse_str(segment).ok());

    // Most specific first: "/reservations/{id}/payments" is a payment
    let resource_type = if path.contains("/payments") {
        ResourceType::Payment
    } else if path.contains("/reviews") {
        ResourceType::Review
    } else if path.contains("/reservations") {
        ResourceType::Reservation
    } else if path.contains("/spaces") {
        ResourceType::Space
    } else if path.contains("/users") {
        ResourceType::User
    } else {
        ResourceType::Other
    };

    (resource_type, resource_id)
}
