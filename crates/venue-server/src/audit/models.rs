//! Audit data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// ============================================================================
// Audit Query Constants
// ============================================================================

/// Default number of audit entries returned per query
pub const DEFAULT_AUDIT_QUERY_LIMIT: i64 = 100;

/// Maximum number of audit entries that can be returned in a single query.
pub const MAX_AUDIT_QUERY_LIMIT: i64 = 1000;

/// Audit log entry from the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Acting user, when the request named one
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<Uuid>,
    /// Request body or before/after status
    pub changes: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<JsonValue>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Cancel,
    Confirm,
    Expire,
    Capture,
    Refund,
    Other,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Cancel => "cancel",
            Self::Confirm => "confirm",
            Self::Expire => "expire",
            Self::Capture => "capture",
            Self::Refund => "refund",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resource types that can be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    User,
    Space,
    Reservation,
    Payment,
    Review,
    Other,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Space => "space",
            Self::Reservation => "reservation",
            Self::Payment => "payment",
            Self::Review => "review",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Query parameters for `GET /api/v1/audit`
#[derive(Debug, Clone, Deserialize)]
pub struct AuditQuery {
    pub user_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub resource_type: Option<ResourceType>,
    pub resource_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    DEFAULT_AUDIT_QUERY_LIMIT
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            action: None,
            resource_type: None,
            resource_id: None,
            start_time: None,
            end_time: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Input for creating an audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub changes: Option<JsonValue>,
    pub metadata: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CreateAuditEntry {
    pub fn new(action: AuditAction, resource_type: ResourceType) -> Self {
        Self {
            user_id: None,
            action,
            resource_type,
            resource_id: None,
            changes: None,
            metadata: None,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Entry for a reservation status change made by the server itself
    /// (payment confirmation, cancellation, hold expiry).
    pub fn transition(
        action: AuditAction,
        reservation_id: Uuid,
        from: &str,
        to: &str,
        reason: Option<&str>,
    ) -> Self {
        Self::new(action, ResourceType::Reservation)
            .resource_id(reservation_id)
            .changes(serde_json::json!({ "from": from, "to": to }))
            .metadata(serde_json::json!({ "source": "lifecycle", "reason": reason }))
    }

    pub fn user_id(mut self, user_id: Option<Uuid>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn resource_id(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    pub fn changes(mut self, changes: JsonValue) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_and_resource_names() {
        assert_eq!(AuditAction::Expire.as_str(), "expire");
        assert_eq!(AuditAction::Capture.to_string(), "capture");
        assert_eq!(AuditAction::Refund.to_string(), "refund");
        assert_eq!(ResourceType::Reservation.as_str(), "reservation");
        assert_eq!(ResourceType::Space.to_string(), "space");
    }

    #[test]
    fn test_transition_entry() {
        let id = Uuid::new_v4();
        let entry = CreateAuditEntry::transition(
            AuditAction::Expire,
            id,
            "pending",
            "cancelled",
            Some("hold expired"),
        );

        assert_eq!(entry.resource_type, ResourceType::Reservation);
        assert_eq!(entry.resource_id, Some(id));
        assert!(entry.user_id.is_none());
        let changes = entry.changes.unwrap();
        assert_eq!(changes["from"], "pending");
        assert_eq!(changes["to"], "cancelled");
        assert_eq!(entry.metadata.unwrap()["source"], "lifecycle");
    }

    #[test]
    fn test_query_params_deserialize_with_defaults() {
        let query: AuditQuery =
            serde_json::from_str(r#"{"resource_type": "reservation", "action": "confirm"}"#)
                .unwrap();
        assert_eq!(query.resource_type, Some(ResourceType::Reservation));
        assert_eq!(query.action, Some(AuditAction::Confirm));
        assert_eq!(query.limit, DEFAULT_AUDIT_QUERY_LIMIT);
        assert_eq!(query.offset, 0);
    }
}
