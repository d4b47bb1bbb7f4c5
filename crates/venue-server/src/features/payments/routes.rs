//! Payment API routes
//!
//! Mounted under `/reservations`:
//! - `POST /api/v1/reservations/:id/payments` - Capture the reservation total
//! - `GET /api/v1/reservations/:id/payments` - Capture attempts of a reservation
//!
//! Mounted under `/payments`:
//! - `GET /api/v1/payments/:payment_id` - Get one attempt
//! - `POST /api/v1/payments/:payment_id/confirm` - Resolve a processing capture
//! - `POST /api/v1/payments/:payment_id/refund` - Refund the charge of a cancelled reservation

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    commands::{
        CapturePaymentCommand, CapturePaymentError, ConfirmPaymentCommand, ConfirmPaymentError,
        RefundPaymentCommand, RefundPaymentError,
    },
    queries::{GetPaymentError, GetPaymentQuery, ListPaymentsError, ListPaymentsQuery},
    settle::SettlementError,
    types::{PaymentOutcome, PaymentResult},
};
use crate::api::response::{codes, ApiResponse, ErrorResponse};
use crate::config::BookingConfig;
use crate::features::FeatureState;
use crate::processor::SharedProcessor;

// ============================================================================
// Router Configuration
// ============================================================================

pub fn reservation_payment_routes() -> Router<FeatureState> {
    Router::new().route("/:id/payments", post(capture_payment).get(list_payments))
}

pub fn payments_routes() -> Router<FeatureState> {
    Router::new()
        .route("/:payment_id", get(get_payment))
        .route("/:payment_id/confirm", post(confirm_payment))
        .route("/:payment_id/refund", post(refund_payment))
}

/// `200` once confirmed, `202` while the processor is still working
fn result_response(result: PaymentResult) -> Response {
    let status = match result.outcome {
        PaymentOutcome::Confirmed => StatusCode::OK,
        PaymentOutcome::Processing => StatusCode::ACCEPTED,
    };
    ApiResponse::success(result).with_status(status)
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// Pay for a pending reservation
///
/// # Endpoint
///
/// `POST /api/v1/reservations/:id/payments`
///
/// # Response
///
/// - `200 OK` - `{outcome: "confirmed", payment, reservation}`
/// - `202 Accepted` - `{outcome: "processing", ...}`; confirm later via
///   `POST /api/v1/payments/:payment_id/confirm`
/// - `402 Payment Required` - Declined; the hold stays pending and may be retried
/// - `404 Not Found` - Reservation not found
/// - `409 Conflict` - Not pending, hold expired, or a capture already in flight
#[tracing::instrument(skip(pool, booking, processor), fields(reservation_id = %id))]
async fn capture_payment(
    State(pool): State<PgPool>,
    State(booking): State<Arc<BookingConfig>>,
    State(processor): State<SharedProcessor>,
    Path(id): Path<Uuid>,
) -> Result<Response, PaymentApiError> {
    let command = CapturePaymentCommand { reservation_id: id };
    let result =
        super::commands::capture::handle(pool, &booking, processor.as_ref(), command).await?;

    tracing::info!(
        payment_id = %result.payment.id,
        outcome = ?result.outcome,
        "Payment capture handled via API"
    );

    Ok(result_response(result))
}

/// Resolve a capture that was left processing
///
/// # Endpoint
///
/// `POST /api/v1/payments/:payment_id/confirm`
#[tracing::instrument(skip(pool, booking, processor), fields(payment_id = %payment_id))]
async fn confirm_payment(
    State(pool): State<PgPool>,
    State(booking): State<Arc<BookingConfig>>,
    State(processor): State<SharedProcessor>,
    Path(payment_id): Path<Uuid>,
) -> Result<Response, PaymentApiError> {
    let command = ConfirmPaymentCommand { payment_id };
    let result =
        super::commands::confirm::handle(pool, &booking, processor.as_ref(), command).await?;
    Ok(result_response(result))
}

/// Refund the charge of a cancelled reservation
///
/// # Endpoint
///
/// `POST /api/v1/payments/:payment_id/refund`
///
/// # Response
///
/// - `200 OK` - The refunded payment; repeating the call returns it unchanged
/// - `402 Payment Required` - The processor declined the refund
/// - `404 Not Found` - Payment not found
/// - `409 Conflict` - Payment not succeeded, or its reservation is still active
/// - `502 Bad Gateway` - The processor failed or did not answer in time
#[tracing::instrument(skip(pool, booking, processor), fields(payment_id = %payment_id))]
async fn refund_payment(
    State(pool): State<PgPool>,
    State(booking): State<Arc<BookingConfig>>,
    State(processor): State<SharedProcessor>,
    Path(payment_id): Path<Uuid>,
) -> Result<Response, PaymentApiError> {
    let command = RefundPaymentCommand { payment_id };
    let payment =
        super::commands::refund::handle(pool, &booking, processor.as_ref(), command).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(payment))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(pool), fields(reservation_id = %id))]
async fn list_payments(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
) -> Result<Response, PaymentApiError> {
    let query = ListPaymentsQuery { reservation_id: id };
    let payments = super::queries::list::handle(pool, query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(payments))).into_response())
}

#[tracing::instrument(skip(pool), fields(payment_id = %payment_id))]
async fn get_payment(
    State(pool): State<PgPool>,
    Path(payment_id): Path<Uuid>,
) -> Result<Response, PaymentApiError> {
    let payment = super::queries::get::handle(pool, GetPaymentQuery { id: payment_id }).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(payment))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum PaymentApiError {
    Capture(CapturePaymentError),
    Confirm(ConfirmPaymentError),
    Refund(RefundPaymentError),
    Get(GetPaymentError),
    List(ListPaymentsError),
}

impl From<CapturePaymentError> for PaymentApiError {
    fn from(err: CapturePaymentError) -> Self {
        Self::Capture(err)
    }
}

impl From<ConfirmPaymentError> for PaymentApiError {
    fn from(err: ConfirmPaymentError) -> Self {
        Self::Confirm(err)
    }
}

impl From<RefundPaymentError> for PaymentApiError {
    fn from(err: RefundPaymentError) -> Self {
        Self::Refund(err)
    }
}

impl From<GetPaymentError> for PaymentApiError {
    fn from(err: GetPaymentError) -> Self {
        Self::Get(err)
    }
}

impl From<ListPaymentsError> for PaymentApiError {
    fn from(err: ListPaymentsError) -> Self {
        Self::List(err)
    }
}

/// Declines are 402. A charge that could not be applied is a conflict that
/// says whether it was refunded.
fn settlement_response(err: SettlementError) -> Response {
    let message = err.to_string();
    match err {
        SettlementError::Declined { payment_id, reason } => ErrorResponse::with_details(
            codes::PAYMENT_FAILED,
            message,
            json!({ "payment_id": payment_id, "reason": reason }),
        )
        .with_status(StatusCode::PAYMENT_REQUIRED),
        SettlementError::HoldExpired {
            reservation_id,
            payment_id,
            payment_ref,
            refunded,
        } => ErrorResponse::with_details(
            codes::CONFLICT,
            message,
            json!({
                "reservation_id": reservation_id,
                "payment_id": payment_id,
                "payment_ref": payment_ref,
                "refunded": refunded,
            }),
        )
        .with_status(StatusCode::CONFLICT),
        SettlementError::SlotTaken {
            reservation_id,
            conflicting_reservation_id,
            payment_id,
            payment_ref,
            refunded,
        } => ErrorResponse::with_details(
            codes::CONFLICT,
            message,
            json!({
                "reservation_id": reservation_id,
                "conflicting_reservation_id": conflicting_reservation_id,
                "payment_id": payment_id,
                "payment_ref": payment_ref,
                "refunded": refunded,
            }),
        )
        .with_status(StatusCode::CONFLICT),
        SettlementError::ReservationCancelled {
            reservation_id,
            payment_id,
            refunded,
        } => ErrorResponse::with_details(
            codes::CONFLICT,
            message,
            json!({
                "reservation_id": reservation_id,
                "payment_id": payment_id,
                "refunded": refunded,
            }),
        )
        .with_status(StatusCode::CONFLICT),
        SettlementError::Transition(e) => ErrorResponse::conflict(e.to_string()),
        SettlementError::Database(e) => ErrorResponse::internal("payment settlement", &e),
        SettlementError::Storage(e) => ErrorResponse::internal("payment settlement", &e),
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> Response {
        match self {
            // Capture errors
            PaymentApiError::Capture(err @ CapturePaymentError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            PaymentApiError::Capture(
                err @ (CapturePaymentError::NotPending(_)
                | CapturePaymentError::HoldExpired(_)
                | CapturePaymentError::PaymentInProgress(_)),
            ) => ErrorResponse::conflict(err.to_string()),
            PaymentApiError::Capture(CapturePaymentError::Settlement(e)) => settlement_response(e),
            PaymentApiError::Capture(CapturePaymentError::Database(e)) => {
                ErrorResponse::internal("payment capture", &e)
            },
            PaymentApiError::Capture(CapturePaymentError::Storage(e)) => {
                ErrorResponse::internal("payment capture", &e)
            },

            // Confirm errors
            PaymentApiError::Confirm(err @ ConfirmPaymentError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            PaymentApiError::Confirm(err @ ConfirmPaymentError::AlreadyFailed(_)) => {
                ErrorResponse::conflict(err.to_string())
            },
            PaymentApiError::Confirm(ConfirmPaymentError::Settlement(e)) => settlement_response(e),
            PaymentApiError::Confirm(ConfirmPaymentError::Database(e)) => {
                ErrorResponse::internal("payment confirmation", &e)
            },
            PaymentApiError::Confirm(ConfirmPaymentError::Storage(e)) => {
                ErrorResponse::internal("payment confirmation", &e)
            },

            // Refund errors
            PaymentApiError::Refund(err @ RefundPaymentError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            PaymentApiError::Refund(
                err @ (RefundPaymentError::NotRefundable { .. }
                | RefundPaymentError::ReservationActive(_)),
            ) => ErrorResponse::conflict(err.to_string()),
            PaymentApiError::Refund(RefundPaymentError::Declined { payment_id, reason }) => {
                let message = format!("Refund declined: {reason}");
                ErrorResponse::with_details(
                    codes::PAYMENT_FAILED,
                    message,
                    json!({ "payment_id": payment_id, "reason": reason }),
                )
                .with_status(StatusCode::PAYMENT_REQUIRED)
            },
            PaymentApiError::Refund(
                err @ (RefundPaymentError::Timeout(_) | RefundPaymentError::Processor(_)),
            ) => {
                tracing::warn!(error = %err, "Refund did not reach the processor");
                ErrorResponse::new(codes::PROCESSOR_UNAVAILABLE, err.to_string())
                    .with_status(StatusCode::BAD_GATEWAY)
            },
            PaymentApiError::Refund(RefundPaymentError::Database(e)) => {
                ErrorResponse::internal("payment refund", &e)
            },
            PaymentApiError::Refund(RefundPaymentError::Storage(e)) => {
                ErrorResponse::internal("payment refund", &e)
            },

            // Query errors
            PaymentApiError::Get(err @ GetPaymentError::NotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            PaymentApiError::Get(GetPaymentError::Database(e)) => {
                ErrorResponse::internal("payment retrieval", &e)
            },
            PaymentApiError::Get(GetPaymentError::Storage(e)) => {
                ErrorResponse::internal("payment retrieval", &e)
            },
            PaymentApiError::List(err @ ListPaymentsError::ReservationNotFound(_)) => {
                ErrorResponse::not_found(err.to_string())
            },
            PaymentApiError::List(ListPaymentsError::Database(e)) => {
                ErrorResponse::internal("payment listing", &e)
            },
            PaymentApiError::List(ListPaymentsError::Storage(e)) => {
                ErrorResponse::internal("payment listing", &e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use venue_common::ReservationStatus;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_decline_is_payment_required() {
        let payment_id = Uuid::new_v4();
        let response = PaymentApiError::Capture(CapturePaymentError::Settlement(
            SettlementError::Declined {
                payment_id,
                reason: "card declined for $40.00".to_string(),
            },
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "PAYMENT_FAILED");
        assert_eq!(body["error"]["details"]["payment_id"], payment_id.to_string());
    }

    #[tokio::test]
    async fn test_late_charge_conflict_carries_payment_ref() {
        let response = PaymentApiError::Confirm(ConfirmPaymentError::Settlement(
            SettlementError::HoldExpired {
                reservation_id: Uuid::new_v4(),
                payment_id: Uuid::new_v4(),
                payment_ref: "ch_late".to_string(),
                refunded: true,
            },
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["details"]["payment_ref"], "ch_late");
        assert_eq!(body["error"]["details"]["refunded"], true);
    }

    #[test]
    fn test_refund_error_statuses() {
        let id = Uuid::new_v4();
        let cases = [
            (RefundPaymentError::NotFound(id), StatusCode::NOT_FOUND),
            (RefundPaymentError::ReservationActive(id), StatusCode::CONFLICT),
            (
                RefundPaymentError::NotRefundable {
                    payment_id: id,
                    status: crate::db::payments::PaymentStatus::Failed,
                },
                StatusCode::CONFLICT,
            ),
            (
                RefundPaymentError::Declined {
                    payment_id: id,
                    reason: "charge disputed".to_string(),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (RefundPaymentError::Timeout(id), StatusCode::BAD_GATEWAY),
        ];

        for (err, expected) in cases {
            let response = PaymentApiError::Refund(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_missing_payment_ref_is_conflict() {
        let response = PaymentApiError::Capture(CapturePaymentError::Settlement(
            SettlementError::Transition(venue_common::TransitionError::MissingPaymentRef),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_capture_guards_are_conflicts() {
        for err in [
            CapturePaymentError::NotPending(ReservationStatus::Cancelled),
            CapturePaymentError::HoldExpired(Uuid::new_v4()),
            CapturePaymentError::PaymentInProgress(Uuid::new_v4()),
        ] {
            let response = PaymentApiError::Capture(err).into_response();
            assert_eq!(response.status(), StatusCode::CONFLICT);
        }
        let response =
            PaymentApiError::Capture(CapturePaymentError::NotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
