use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;
use venue_common::Money;

use super::{
    CaptureRequest, CaptureStatus, PaymentProcessor, ProcessorError, RefundRequest, RefundStatus,
};

/// In-process processor that approves everything except configured amounts.
#[derive(Debug, Default)]
pub struct MockPaymentProcessor {
    declined: HashSet<Money>,
    refunds_declined: bool,
    latency: Duration,
    captures: Mutex<HashMap<String, CaptureStatus>>,
    refunds: Mutex<HashMap<String, RefundStatus>>,
    charges: AtomicUsize,
    refunded: AtomicUsize,
}

impl MockPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decline_amounts(mut self, amounts: impl IntoIterator<Item = Money>) -> Self {
        self.declined.extend(amounts);
        self
    }

    /// Decline every refund, e.g. to exercise a refund the processor refuses
    pub fn decline_refunds(mut self) -> Self {
        self.refunds_declined = true;
        self
    }

    /// Delay every capture, e.g. to exercise the capture timeout
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of distinct charges performed (idempotent replays excluded)
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of distinct refunds performed
    pub fn refund_count(&self) -> usize {
        self.refunded.load(Ordering::SeqCst)
    }

    /// Record an outcome for `key` as if an earlier capture had produced it
    pub fn record_capture(&self, key: &str, status: CaptureStatus) {
        if let Ok(mut captures) = self.captures.lock() {
            captures.insert(key.to_string(), status);
        }
    }

    fn charged(&self, payment_ref: &str) -> bool {
        self.captures.lock().is_ok_and(|captures| {
            captures.values().any(|status| {
                matches!(status, CaptureStatus::Succeeded { payment_ref: r } if r == payment_ref)
            })
        })
    }

    fn lookup(&self, key: &str) -> Option<CaptureStatus> {
        self.captures
            .lock()
            .ok()
            .and_then(|captures| captures.get(key).cloned())
    }
}

#[async_trait]
impl PaymentProcessor for MockPaymentProcessor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureStatus, ProcessorError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut captures = self
            .captures
            .lock()
            .map_err(|_| ProcessorError::Unavailable("mock processor state poisoned".into()))?;

        if let Some(previous) = captures.get(&request.idempotency_key) {
            return Ok(previous.clone());
        }

        let status = if self.declined.contains(&request.amount) || !request.amount.is_positive() {
            CaptureStatus::Declined {
                reason: format!("card declined for {}", request.amount),
            }
        } else {
            self.charges.fetch_add(1, Ordering::SeqCst);
            CaptureStatus::Succeeded {
                payment_ref: format!("mock_{}", Uuid::new_v4().simple()),
            }
        };

        captures.insert(request.idempotency_key.clone(), status.clone());
        Ok(status)
    }

    async fn retrieve(&self, idempotency_key: &str) -> Result<CaptureStatus, ProcessorError> {
        self.lookup(idempotency_key)
            .ok_or_else(|| ProcessorError::UnknownCapture(idempotency_key.to_string()))
    }

    async fn refund(&self, request: &RefundRequest) -> Result<RefundStatus, ProcessorError> {
        if !self.charged(&request.payment_ref) {
            return Err(ProcessorError::UnknownCharge(request.payment_ref.clone()));
        }

        let mut refunds = self
            .refunds
            .lock()
            .map_err(|_| ProcessorError::Unavailable("mock processor state poisoned".into()))?;

        if let Some(previous) = refunds.get(&request.idempotency_key) {
            return Ok(previous.clone());
        }

        let status = if self.refunds_declined {
            RefundStatus::Declined {
                reason: format!("refund of {} declined", request.amount),
            }
        } else {
            self.refunded.fetch_add(1, Ordering::SeqCst);
            RefundStatus::Refunded {
                refund_ref: format!("mock_re_{}", Uuid::new_v4().simple()),
            }
        };

        refunds.insert(request.idempotency_key.clone(), status.clone());
        Ok(status)
    }
}
