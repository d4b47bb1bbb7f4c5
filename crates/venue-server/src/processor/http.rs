use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    CaptureRequest, CaptureStatus, PaymentProcessor, ProcessorError, RefundRequest, RefundStatus,
};

/// Transport timeout; the booking flow applies its own, shorter capture bound.
const GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Payment gateway speaking a small JSON protocol:
///
/// - `POST {base}/captures` with an `Idempotency-Key` header
/// - `GET {base}/captures/{idempotency_key}`
/// - `POST {base}/refunds` with an `Idempotency-Key` header
///
/// Captures answer `{"status": "succeeded" | "declined" | "processing", ...}`,
/// refunds `{"status": "refunded" | "declined", ...}`.
pub struct HttpPaymentProcessor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CaptureBody {
    amount_cents: i64,
    currency: &'static str,
    reservation_id: Uuid,
}

#[derive(Debug, Serialize)]
struct RefundBody<'a> {
    payment_ref: &'a str,
    amount_cents: i64,
    currency: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GatewayStatus {
    Succeeded,
    Declined,
    Processing,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    status: GatewayStatus,
    payment_ref: Option<String>,
    reason: Option<String>,
}

impl GatewayResponse {
    fn into_status(self) -> Result<CaptureStatus, ProcessorError> {
        match self.status {
            GatewayStatus::Succeeded => self
                .payment_ref
                .filter(|r| !r.is_empty())
                .map(|payment_ref| CaptureStatus::Succeeded { payment_ref })
                .ok_or_else(|| ProcessorError::Protocol("succeeded without payment_ref".into())),
            GatewayStatus::Declined => Ok(CaptureStatus::Declined {
                reason: self.reason.unwrap_or_else(|| "declined by processor".to_string()),
            }),
            GatewayStatus::Processing => Ok(CaptureStatus::Processing),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GatewayRefundStatus {
    Refunded,
    Declined,
}

#[derive(Debug, Deserialize)]
struct GatewayRefundResponse {
    status: GatewayRefundStatus,
    refund_ref: Option<String>,
    reason: Option<String>,
}

impl GatewayRefundResponse {
    fn into_status(self) -> Result<RefundStatus, ProcessorError> {
        match self.status {
            GatewayRefundStatus::Refunded => self
                .refund_ref
                .filter(|r| !r.is_empty())
                .map(|refund_ref| RefundStatus::Refunded { refund_ref })
                .ok_or_else(|| ProcessorError::Protocol("refunded without refund_ref".into())),
            GatewayRefundStatus::Declined => Ok(RefundStatus::Declined {
                reason: self.reason.unwrap_or_else(|| "refund declined by processor".to_string()),
            }),
        }
    }
}

impl HttpPaymentProcessor {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(GATEWAY_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn read<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProcessorError> {
        let status = response.status();
        // 402 carries a regular declined body
        if status.is_server_error() {
            return Err(ProcessorError::Unavailable(format!("gateway answered {}", status)));
        }
        if !status.is_success() && status != StatusCode::PAYMENT_REQUIRED {
            return Err(ProcessorError::Protocol(format!("gateway answered {}", status)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProcessorError::Protocol(e.to_string()))
    }
}

fn transport(e: reqwest::Error) -> ProcessorError {
    ProcessorError::Unavailable(e.to_string())
}

#[async_trait]
impl PaymentProcessor for HttpPaymentProcessor {
    fn name(&self) -> &'static str {
        "http"
    }

    #[tracing::instrument(skip(self, request), fields(reservation_id = %request.reservation_id))]
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureStatus, ProcessorError> {
        let body = CaptureBody {
            amount_cents: request.amount.cents(),
            currency: "usd",
            reservation_id: request.reservation_id,
        };

        let response = self
            .authorize(self.client.post(format!("{}/captures", self.base_url)))
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        Self::read::<GatewayResponse>(response).await?.into_status()
    }

    async fn retrieve(&self, idempotency_key: &str) -> Result<CaptureStatus, ProcessorError> {
        let response = self
            .authorize(
                self.client
                    .get(format!("{}/captures/{}", self.base_url, idempotency_key)),
            )
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProcessorError::UnknownCapture(idempotency_key.to_string()));
        }

        Self::read::<GatewayResponse>(response).await?.into_status()
    }

    #[tracing::instrument(skip(self, request), fields(payment_ref = %request.payment_ref))]
    async fn refund(&self, request: &RefundRequest) -> Result<RefundStatus, ProcessorError> {
        let body = RefundBody {
            payment_ref: &request.payment_ref,
            amount_cents: request.amount.cents(),
            currency: "usd",
        };

        let response = self
            .authorize(self.client.post(format!("{}/refunds", self.base_url)))
            .header("Idempotency-Key", &request.idempotency_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProcessorError::UnknownCharge(request.payment_ref.clone()));
        }

        Self::read::<GatewayRefundResponse>(response).await?.into_status()
    }
}
