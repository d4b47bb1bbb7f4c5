pub mod commands;
pub mod queries;
pub mod routes;
pub mod settle;
pub mod types;

pub use commands::{
    CapturePaymentCommand, CapturePaymentError, ConfirmPaymentCommand, ConfirmPaymentError,
    RefundPaymentCommand, RefundPaymentError,
};
pub use queries::{GetPaymentError, GetPaymentQuery, ListPaymentsError, ListPaymentsQuery};
pub use settle::SettlementError;
pub use types::{PaymentOutcome, PaymentResult, PaymentView};

pub use routes::{payments_routes, reservation_payment_routes};
