pub mod capture;
pub mod confirm;
pub mod refund;

pub use capture::{CapturePaymentCommand, CapturePaymentError};
pub use confirm::{ConfirmPaymentCommand, ConfirmPaymentError};
pub use refund::{RefundPaymentCommand, RefundPaymentError};
