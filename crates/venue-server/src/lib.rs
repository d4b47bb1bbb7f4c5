//! Venue Server Library
//!
//! HTTP server for booking the rentable spaces of a community event center.
//!
//! # Overview
//!
//! - **Space catalog**: rentable rooms and fields with hourly prices and capacities
//! - **Reservations**: atomic admission of time windows, with pending holds that expire
//! - **Payments**: capture through an external processor, bounded by a timeout
//! - **Reviews**: one review per completed reservation, aggregated on read
//! - **Audit**: every successful command and lifecycle transition is recorded
//!
//! # Architecture
//!
//! The server follows a **CQRS** layout. Each feature under [`features`] is a
//! vertical slice with `commands/`, `queries/` and `routes.rs`:
//!
//! - **Commands** (POST, PUT, DELETE) change state and are recorded in `audit_log`
//! - **Queries** (GET) only read and are not audited
//!
//! The admission decision itself lives in `venue_common::schedule`; this crate
//! supplies the per-space critical section around it (a `FOR UPDATE` lock on the
//! space row) and the storage-level exclusion constraint behind it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use venue_server::{api, config::Config, features::FeatureState, processor};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let pool = venue_server::db::create_pool(&config.database).await?;
//! let state = FeatureState {
//!     db: pool.clone(),
//!     booking: Arc::new(config.booking.clone()),
//!     processor: processor::from_config(&config.payment)?,
//! };
//! let app = api::create_router(state, &config);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod cqrs;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod processor;
pub mod sweeper;

// Re-export commonly used types
pub use error::{ServerError, ServerResult};
