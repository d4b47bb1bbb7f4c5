//! Payment processor seam
//!
//! Captures and refunds go through [`PaymentProcessor`]. Every call carries
//! an idempotency key (derived from the id of the local `payments` row), so a
//! call retried after a timeout or a lost response moves money at most once.
//!
//! Two implementations ship with the server:
//!
//! - [`MockPaymentProcessor`]: in-process, for development and tests
//! - [`HttpPaymentProcessor`]: a JSON gateway reached over HTTP

mod http;
mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use venue_common::Money;

use crate::config::{PaymentConfig, PaymentProvider};

pub use http::HttpPaymentProcessor;
pub use mock::MockPaymentProcessor;

/// A request to charge the customer for one reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub amount: Money,
    pub reservation_id: Uuid,
    pub idempotency_key: String,
}

/// What the processor reports about a capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureStatus {
    Succeeded { payment_ref: String },
    Declined { reason: String },
    /// Accepted but not settled yet; ask again later
    Processing,
}

/// A request to return a succeeded charge in full
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub payment_ref: String,
    pub amount: Money,
    pub idempotency_key: String,
}

/// What the processor reports about a refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefundStatus {
    Refunded { refund_ref: String },
    Declined { reason: String },
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Payment processor unreachable: {0}")]
    Unavailable(String),

    #[error("Payment processor has no capture for key {0}")]
    UnknownCapture(String),

    #[error("Payment processor has no charge {0}")]
    UnknownCharge(String),

    #[error("Unexpected payment processor response: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync + 'static {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Charge `request.amount`. Repeating a call with the same idempotency key
    /// returns the first outcome instead of charging again.
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureStatus, ProcessorError>;

    /// Look up the outcome of an earlier capture by its idempotency key
    async fn retrieve(&self, idempotency_key: &str) -> Result<CaptureStatus, ProcessorError>;

    /// Return the charge `request.payment_ref`. Same idempotency rules as
    /// [`capture`](Self::capture).
    async fn refund(&self, request: &RefundRequest) -> Result<RefundStatus, ProcessorError>;
}

pub type SharedProcessor = Arc<dyn PaymentProcessor>;

/// Build the processor selected by configuration
pub fn from_config(config: &PaymentConfig) -> anyhow::Result<SharedProcessor> {
    let processor: SharedProcessor = match config.provider {
        PaymentProvider::Mock => Arc::new(
            MockPaymentProcessor::new()
                .decline_amounts(config.mock_decline_cents.iter().copied().map(Money::from_cents))
                .latency(std::time::Duration::from_millis(config.mock_latency_ms)),
        ),
        PaymentProvider::Http => {
            let base_url = config
                .gateway_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("PAYMENT_GATEWAY_URL is not set"))?;
            Arc::new(HttpPaymentProcessor::new(
                base_url,
                config.gateway_api_key.clone(),
            )?)
        },
    };

    tracing::info!(provider = processor.name(), "Payment processor configured");

    Ok(processor)
}
