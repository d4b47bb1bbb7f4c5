pub mod get;
pub mod list;

pub use get::{GetReservationError, GetReservationQuery};
pub use list::{ListReservationsError, ListReservationsQuery, ListReservationsResponse};
