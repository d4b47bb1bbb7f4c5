//! Feature modules implementing the venue API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern with its own commands, queries, and
//! routes.
//!
//! # Features
//!
//! - **users**: customer and administrator accounts
//! - **spaces**: the rentable space catalog, availability, and per-space reviews
//! - **reservations**: admission, rescheduling, and cancellation
//! - **payments**: capture through the payment processor and late confirmation
//! - **reviews**: post-event reviews and their on-read aggregation
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations (create, update, delete)
//! - `queries/` - Read operations (get, list)
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement the mediator pattern using the `mediator` crate.

pub mod payments;
pub mod reservations;
pub mod reviews;
pub mod shared;
pub mod spaces;
pub mod users;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use sqlx::PgPool;

use crate::{config::BookingConfig, processor::SharedProcessor};

/// Shared state for all feature routes
#[derive(Clone, FromRef)]
pub struct FeatureState {
    /// PostgreSQL connection pool
    pub db: PgPool,
    /// Admission, hold, and cancellation policy
    pub booking: Arc<BookingConfig>,
    /// External payment processor
    pub processor: SharedProcessor,
}

/// Creates the API router with all feature routes mounted
///
/// - `/users` - accounts and the reviews a user wrote
/// - `/spaces` - catalog, availability, and reviews of a space
/// - `/reservations` - booking lifecycle and payment capture
/// - `/payments` - late confirmation of in-flight captures
/// - `/reviews` - review CRUD and summaries
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest("/users", users::users_routes().with_state(state.db.clone()))
        .nest("/spaces", spaces::spaces_routes().with_state(state.clone()))
        .nest(
            "/reservations",
            reservations::reservations_routes()
                .merge(payments::reservation_payment_routes())
                .with_state(state.clone()),
        )
        .nest("/payments", payments::payments_routes().with_state(state.clone()))
        .nest("/reviews", reviews::reviews_routes().with_state(state.db))
}
