pub mod get;
pub mod list;

pub use get::{GetPaymentError, GetPaymentQuery};
pub use list::{ListPaymentsError, ListPaymentsQuery};
