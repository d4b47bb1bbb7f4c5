//! Venue Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared domain types, booking rules, and logging for the venue rental service.
//!
//! # Overview
//!
//! This crate holds everything that does not need a database:
//!
//! - **Types**: Time windows, money, and price derivation
//! - **Schedule**: The admission decision for a single space
//! - **Lifecycle**: Reservation status transitions and their guards
//! - **Wizard**: The booking flow as an explicit state machine
//! - **Logging**: Centralized tracing subscriber setup
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use venue_common::types::{Money, TimeWindow};
//!
//! let window = TimeWindow::new(
//!     Utc.with_ymd_and_hms(2024, 9, 15, 10, 0, 0).unwrap(),
//!     Utc.with_ymd_and_hms(2024, 9, 15, 12, 0, 0).unwrap(),
//! )
//! .unwrap();
//!
//! let total = Money::from_cents(7_500).for_window(&window);
//! assert_eq!(total.cents(), 15_000);
//! ```

pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod schedule;
pub mod types;
pub mod wizard;

// Re-export commonly used types
pub use error::{Result, VenueError};
pub use lifecycle::{ReservationStatus, Transition, TransitionContext, TransitionError};
pub use schedule::{BookingPolicy, ExistingBooking, Rejection, Schedule, WindowProblem};
pub use types::{Money, TimeWindow};
pub use wizard::{Wizard, WizardEvent, WizardStep};

