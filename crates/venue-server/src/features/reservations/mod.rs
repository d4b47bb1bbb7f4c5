pub mod commands;
pub mod queries;
pub mod routes;
pub mod types;

pub use commands::{
    CancelReservationCommand, CancelReservationError, CreateReservationCommand,
    CreateReservationError, RescheduleReservationCommand, RescheduleReservationError,
};
pub use queries::{
    GetReservationError, GetReservationQuery, ListReservationsError, ListReservationsQuery,
    ListReservationsResponse,
};
pub use types::ReservationView;

pub use routes::reservations_routes;
