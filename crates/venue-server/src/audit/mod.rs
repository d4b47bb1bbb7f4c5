//! Audit trail
//!
//! Two sources feed `audit_log`:
//!
//! - **HTTP commands**: [`AuditLayer`] records every successful POST, PUT,
//!   PATCH and DELETE with its body, client address, and user agent. GET
//!   requests are never recorded.
//! - **Lifecycle transitions**: confirmations, cancellations, and hold
//!   expiries are written with [`record_in_tx`] inside the same transaction
//!   as the status change, so the sweeper's expiries are audited even though
//!   no request caused them.
//!
//! # Example
//!
//! ```no_run
//! use venue_server::audit::{create_audit_entry, AuditAction, CreateAuditEntry, ResourceType};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let entry = CreateAuditEntry::new(AuditAction::Create, ResourceType::Space)
//!     .resource_id(Uuid::new_v4())
//!     .ip_address("192.168.1.1");
//!
//! let saved = create_audit_entry(pool, entry).await?;
//! println!("Created audit log: {}", saved.id);
//! # Ok(())
//! # }
//! ```

mod middleware;
mod models;
mod queries;

#[cfg(test)]
mod middleware_tests;

pub use middleware::AuditLayer;
pub use models::{AuditAction, AuditEntry, AuditQuery, CreateAuditEntry, ResourceType};
pub use queries::{create_audit_entry, get_audit_trail, query_audit_logs, record_in_tx};
