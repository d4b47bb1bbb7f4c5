//! Reservation status machine
//!
//! ```text
//! pending ──confirm──▶ confirmed ──cancel (before notice window)──▶ cancelled
//!    │                                                                ▲
//!    ├──cancel────────────────────────────────────────────────────────┤
//!    └──expire (hold timed out)───────────────────────────────────────┘
//! ```
//!
//! `completed` is not stored; a confirmed reservation whose window has ended
//! is reported as completed by [`is_completed`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::VenueError;
use crate::types::TimeWindow;

/// Default minimum notice before a confirmed reservation may be cancelled
pub const DEFAULT_CANCELLATION_NOTICE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = VenueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(VenueError::InvalidStatus(other.to_string())),
        }
    }
}

/// Requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Payment captured; carries the processor reference
    Confirm { payment_ref: String },
    /// Customer or admin cancellation
    Cancel,
    /// Hold timed out without payment
    Expire,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirm { .. } => "confirm",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Cannot {transition} a reservation that is {from}")]
    NotAllowed {
        from: ReservationStatus,
        transition: &'static str,
    },

    #[error("Confirmed reservations can only be cancelled at least {notice_hours} hours before the start")]
    NoticeWindowPassed { notice_hours: i64 },

    #[error("Reservation hold has not expired yet")]
    HoldStillActive,

    #[error("Payment reference must not be empty")]
    MissingPaymentRef,
}

/// Inputs the guards need besides the current status
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub window: TimeWindow,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancellation_notice: Duration,
    pub now: DateTime<Utc>,
}

impl ReservationStatus {
    /// Apply `transition`, returning the resulting status or the guard that failed.
    pub fn apply(
        self,
        transition: &Transition,
        ctx: &TransitionContext,
    ) -> Result<ReservationStatus, TransitionError> {
        let not_allowed = || TransitionError::NotAllowed {
            from: self,
            transition: transition.name(),
        };

        match (self, transition) {
            (Self::Pending, Transition::Confirm { payment_ref }) => {
                if payment_ref.trim().is_empty() {
                    return Err(TransitionError::MissingPaymentRef);
                }
                Ok(Self::Confirmed)
            },
            (Self::Pending, Transition::Cancel) => Ok(Self::Cancelled),
            (Self::Pending, Transition::Expire) => match ctx.expires_at {
                Some(expires_at) if expires_at <= ctx.now => Ok(Self::Cancelled),
                _ => Err(TransitionError::HoldStillActive),
            },
            (Self::Confirmed, Transition::Cancel) => {
                if ctx.window.start() - ctx.now < ctx.cancellation_notice {
                    return Err(TransitionError::NoticeWindowPassed {
                        notice_hours: ctx.cancellation_notice.num_hours(),
                    });
                }
                Ok(Self::Cancelled)
            },
            _ => Err(not_allowed()),
        }
    }
}

/// A confirmed reservation whose window has fully elapsed
pub fn is_completed(status: ReservationStatus, window: &TimeWindow, now: DateTime<Utc>) -> bool {
    status == ReservationStatus::Confirmed && window.has_ended(now)
}
