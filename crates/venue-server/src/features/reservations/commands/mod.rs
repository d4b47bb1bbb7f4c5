pub mod cancel;
pub mod create;
pub mod reschedule;

pub use cancel::{CancelReservationCommand, CancelReservationError};
pub use create::{CreateReservationCommand, CreateReservationError};
pub use reschedule::{RescheduleReservationCommand, RescheduleReservationError};
