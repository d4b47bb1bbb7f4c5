//! CQRS marker traits
//!
//! Every request type sent through the mediator is tagged as either a
//! [`Command`] (changes state, audited) or a [`Query`] (read-only).

/// A write operation. Successful commands produce an audit entry.
pub trait Command: Send + 'static {}

/// A read-only operation. Queries are never audited.
pub trait Query: Send + 'static {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reservations::{CreateReservationCommand, ListReservationsQuery};

    fn assert_command<T: Command>() {}
    fn assert_query<T: Query>() {}

    #[test]
    fn test_reservation_requests_are_tagged() {
        assert_command::<CreateReservationCommand>();
        assert_query::<ListReservationsQuery>();
    }
}
