//! Admission decisions for a single space
//!
//! The server loads the bookings that could collide with a request while it
//! holds the per-space lock, builds a [`Schedule`] from them, and asks it for
//! a verdict. Keeping the decision here means the overlap rule, the hold
//! expiry rule, and the duration policy are tested without a database.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::types::TimeWindow;

/// Default minimum booking length in minutes
pub const DEFAULT_MIN_DURATION_MINUTES: i64 = 60;

/// Default maximum booking length in minutes (12 hours)
pub const DEFAULT_MAX_DURATION_MINUTES: i64 = 720;

/// Default time a pending reservation holds its slot (15 minutes)
pub const DEFAULT_HOLD_TIMEOUT_SECS: i64 = 900;

/// Booking-length and hold policy applied at admission time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub min_duration_minutes: i64,
    pub max_duration_minutes: i64,
    pub hold_timeout_secs: i64,
    /// Whether unexpired pending reservations block other customers
    pub pending_blocks: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            min_duration_minutes: DEFAULT_MIN_DURATION_MINUTES,
            max_duration_minutes: DEFAULT_MAX_DURATION_MINUTES,
            hold_timeout_secs: DEFAULT_HOLD_TIMEOUT_SECS,
            pending_blocks: true,
        }
    }
}

impl BookingPolicy {
    pub fn hold_timeout(&self) -> Duration {
        Duration::seconds(self.hold_timeout_secs)
    }

    /// When a hold taken at `now` stops blocking the slot
    pub fn hold_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.hold_timeout()
    }

    /// Validate a raw `(start, end)` pair against the policy.
    ///
    /// Checks run in order: interval shape, start not in the past, duration bounds.
    pub fn validate_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TimeWindow, Rejection> {
        let window = TimeWindow::new(start, end)
            .map_err(|_| Rejection::InvalidWindow(WindowProblem::EndNotAfterStart))?;

        if window.start() < now {
            return Err(Rejection::InvalidWindow(WindowProblem::StartInPast));
        }

        // Compare exact durations; whole minutes would hide a sub-minute overshoot
        let duration = window.duration();
        let minutes = window.duration_minutes();
        if duration < Duration::minutes(self.min_duration_minutes) {
            return Err(Rejection::InvalidWindow(WindowProblem::TooShort {
                minutes,
                min: self.min_duration_minutes,
            }));
        }
        if duration > Duration::minutes(self.max_duration_minutes) {
            return Err(Rejection::InvalidWindow(WindowProblem::TooLong {
                minutes,
                max: self.max_duration_minutes,
            }));
        }

        Ok(window)
    }
}

/// Why a window is not bookable regardless of other reservations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowProblem {
    #[error("end time must be after start time")]
    EndNotAfterStart,

    #[error("start time cannot be in the past")]
    StartInPast,

    #[error("booking of {minutes} minutes is shorter than the minimum of {min} minutes")]
    TooShort { minutes: i64, min: i64 },

    #[error("booking of {minutes} minutes is longer than the maximum of {max} minutes")]
    TooLong { minutes: i64, max: i64 },
}

/// Reasons an admission request is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Invalid window: {0}")]
    InvalidWindow(WindowProblem),

    #[error("Attendee count must be positive, got {0}")]
    InvalidAttendees(i32),

    #[error("{attendees} attendees exceed the space capacity of {capacity}")]
    CapacityExceeded { attendees: i32, capacity: i32 },

    #[error("Space is not available during the requested time (conflicts with reservation {reservation_id})")]
    Conflict {
        reservation_id: Uuid,
        window: TimeWindow,
    },
}

/// A reservation already on the books for the space under consideration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingBooking {
    pub id: Uuid,
    pub window: TimeWindow,
    pub status: ReservationStatus,
    /// Hold expiry for pending rows; `None` for rows that never expire
    pub expires_at: Option<DateTime<Utc>>,
}

impl ExistingBooking {
    /// Whether a pending hold has aged out at `now`
    pub fn is_expired_hold(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending
            && self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether this booking keeps other customers out of its window at `now`
    pub fn blocks(&self, policy: &BookingPolicy, now: DateTime<Utc>) -> bool {
        self.blocks_when(policy.pending_blocks, now)
    }

    fn blocks_when(&self, pending_blocks: bool, now: DateTime<Utc>) -> bool {
        match self.status {
            ReservationStatus::Confirmed => true,
            ReservationStatus::Pending => pending_blocks && !self.is_expired_hold(now),
            ReservationStatus::Cancelled => false,
        }
    }
}

/// The bookings of one space, as seen inside the admission critical section
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    bookings: Vec<ExistingBooking>,
}

impl Schedule {
    pub fn new(bookings: Vec<ExistingBooking>) -> Self {
        Self { bookings }
    }

    /// Drop one reservation from consideration (used when rescheduling it)
    pub fn without(mut self, reservation_id: Uuid) -> Self {
        self.bookings.retain(|b| b.id != reservation_id);
        self
    }

    pub fn bookings(&self) -> &[ExistingBooking] {
        &self.bookings
    }

    /// Pending holds that have aged out and should be cancelled
    pub fn expired_holds(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.bookings
            .iter()
            .filter(|b| b.is_expired_hold(now))
            .map(|b| b.id)
            .collect()
    }

    /// Bookings that currently block availability
    pub fn blocking<'a>(
        &'a self,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a ExistingBooking> + 'a {
        let pending_blocks = policy.pending_blocks;
        self.bookings
            .iter()
            .filter(move |b| b.blocks_when(pending_blocks, now))
    }

    /// First blocking booking that overlaps `window`, earliest start first
    pub fn first_conflict<'a>(
        &'a self,
        window: &TimeWindow,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> Option<&'a ExistingBooking> {
        self.blocking(policy, now)
            .filter(|b| b.window.overlaps(window))
            .min_by_key(|b| b.window.start())
    }

    /// Decide whether `window` may be admitted for a space of `capacity`.
    pub fn check_admission(
        &self,
        window: &TimeWindow,
        attendees: Option<i32>,
        capacity: i32,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        if let Some(attendees) = attendees {
            if attendees <= 0 {
                return Err(Rejection::InvalidAttendees(attendees));
            }
            if attendees > capacity {
                return Err(Rejection::CapacityExceeded {
                    attendees,
                    capacity,
                });
            }
        }

        if let Some(conflict) = self.first_conflict(window, policy, now) {
            return Err(Rejection::Conflict {
                reservation_id: conflict.id,
                window: conflict.window,
            });
        }

        Ok(())
    }

    /// Admit `window` and record it as a pending hold.
    ///
    /// Mirrors what the storage layer does after a successful check.
    pub fn admit(
        &mut self,
        id: Uuid,
        window: TimeWindow,
        attendees: Option<i32>,
        capacity: i32,
        policy: &BookingPolicy,
        now: DateTime<Utc>,
    ) -> Result<(), Rejection> {
        self.check_admission(&window, attendees, capacity, policy, now)?;
        self.bookings.push(ExistingBooking {
            id,
            window,
            status: ReservationStatus::Pending,
            expires_at: Some(policy.hold_expiry(now)),
        });
        Ok(())
    }

    /// Promote a pending booking to confirmed
    pub fn confirm(&mut self, id: Uuid) -> bool {
        match self.bookings.iter_mut().find(|b| b.id == id) {
            Some(booking) if booking.status == ReservationStatus::Pending => {
                booking.status = ReservationStatus::Confirmed;
                booking.expires_at = None;
                true
            },
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const CAPACITY: i32 = 60;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 15, hour, 0, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 9, 0, 0).unwrap()
    }

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow::new(at(start), at(end)).unwrap()
    }

    fn booking(status: ReservationStatus, start: u32, end: u32) -> ExistingBooking {
        ExistingBooking {
            id: Uuid::new_v4(),
            window: window(start, end),
            status,
            expires_at: None,
        }
    }

    #[test]
    fn test_validate_window_rejects_inverted_interval() {
        let policy = BookingPolicy::default();
        assert_eq!(
            policy.validate_window(at(12), at(10), now()),
            Err(Rejection::InvalidWindow(WindowProblem::EndNotAfterStart))
        );
        assert_eq!(
            policy.validate_window(at(10), at(10), now()),
            Err(Rejection::InvalidWindow(WindowProblem::EndNotAfterStart))
        );
    }

    #[test]
    fn test_validate_window_rejects_past_start() {
        let policy = BookingPolicy::default();
        let later = at(11);
        assert_eq!(
            policy.validate_window(at(10), at(12), later),
            Err(Rejection::InvalidWindow(WindowProblem::StartInPast))
        );
    }

    #[test]
    fn test_validate_window_duration_bounds() {
        let policy = BookingPolicy {
            min_duration_minutes: 60,
            max_duration_minutes: 180,
            ..BookingPolicy::default()
        };
        let half_hour_end = at(10) + Duration::minutes(30);
        assert!(matches!(
            policy.validate_window(at(10), half_hour_end, now()),
            Err(Rejection::InvalidWindow(WindowProblem::TooShort { minutes: 30, min: 60 }))
        ));
        assert!(matches!(
            policy.validate_window(at(10), at(14), now()),
            Err(Rejection::InvalidWindow(WindowProblem::TooLong { minutes: 240, max: 180 }))
        ));
        assert!(policy.validate_window(at(10), at(13), now()).is_ok());
    }

    #[test]
    fn test_worked_example_conflict_and_back_to_back() {
        let policy = BookingPolicy::default();
        let mut schedule = Schedule::default();

        let first = Uuid::new_v4();
        schedule
            .admit(first, window(10, 12), Some(40), CAPACITY, &policy, now())
            .unwrap();
        assert!(schedule.confirm(first));

        let overlapping = schedule.admit(Uuid::new_v4(), window(11, 13), None, CAPACITY, &policy, now());
        assert!(matches!(
            overlapping,
            Err(Rejection::Conflict { reservation_id, .. }) if reservation_id == first
        ));

        let back_to_back = schedule.admit(Uuid::new_v4(), window(12, 14), None, CAPACITY, &policy, now());
        assert!(back_to_back.is_ok());
    }

    #[test]
    fn test_capacity_exceeded() {
        let schedule = Schedule::default();
        let policy = BookingPolicy::default();
        assert_eq!(
            schedule.check_admission(&window(10, 12), Some(61), CAPACITY, &policy, now()),
            Err(Rejection::CapacityExceeded {
                attendees: 61,
                capacity: CAPACITY
            })
        );
        assert_eq!(
            schedule.check_admission(&window(10, 12), Some(0), CAPACITY, &policy, now()),
            Err(Rejection::InvalidAttendees(0))
        );
        assert!(schedule
            .check_admission(&window(10, 12), Some(60), CAPACITY, &policy, now())
            .is_ok());
    }

    #[test]
    fn test_cancelled_bookings_never_block() {
        let policy = BookingPolicy::default();
        let schedule = Schedule::new(vec![booking(ReservationStatus::Cancelled, 10, 12)]);
        assert!(schedule
            .check_admission(&window(10, 12), None, CAPACITY, &policy, now())
            .is_ok());
    }

    #[test]
    fn test_expired_pending_hold_does_not_block() {
        let policy = BookingPolicy::default();
        let mut stale = booking(ReservationStatus::Pending, 10, 12);
        stale.expires_at = Some(now() - Duration::minutes(1));
        let stale_id = stale.id;

        let schedule = Schedule::new(vec![stale]);
        assert!(schedule
            .check_admission(&window(10, 12), None, CAPACITY, &policy, now())
            .is_ok());
        assert_eq!(schedule.expired_holds(now()), vec![stale_id]);
    }

    #[test]
    fn test_live_pending_hold_blocks_by_default() {
        let policy = BookingPolicy::default();
        let mut hold = booking(ReservationStatus::Pending, 10, 12);
        hold.expires_at = Some(now() + Duration::minutes(5));
        let schedule = Schedule::new(vec![hold]);

        assert!(matches!(
            schedule.check_admission(&window(11, 12), None, CAPACITY, &policy, now()),
            Err(Rejection::Conflict { .. })
        ));

        let lenient = BookingPolicy {
            pending_blocks: false,
            ..BookingPolicy::default()
        };
        assert!(schedule
            .check_admission(&window(11, 12), None, CAPACITY, &lenient, now())
            .is_ok());
    }

    #[test]
    fn test_hold_expiry_boundary_is_inclusive() {
        let mut hold = booking(ReservationStatus::Pending, 10, 12);
        hold.expires_at = Some(now());
        assert!(hold.is_expired_hold(now()));
        assert!(!hold.is_expired_hold(now() - Duration::seconds(1)));
    }

    #[test]
    fn test_without_excludes_self_when_rescheduling() {
        let policy = BookingPolicy::default();
        let mine = booking(ReservationStatus::Pending, 10, 12);
        let mine_id = mine.id;
        let schedule = Schedule::new(vec![mine]).without(mine_id);
        assert!(schedule
            .check_admission(&window(11, 13), None, CAPACITY, &policy, now())
            .is_ok());
    }

    #[test]
    fn test_first_conflict_is_earliest() {
        let policy = BookingPolicy::default();
        let late = booking(ReservationStatus::Confirmed, 13, 15);
        let early = booking(ReservationStatus::Confirmed, 10, 12);
        let early_id = early.id;
        let schedule = Schedule::new(vec![late, early]);

        let conflict = schedule.first_conflict(&window(9, 16), &policy, now()).unwrap();
        assert_eq!(conflict.id, early_id);
    }

    #[test]
    fn test_conflict_outlives_the_policy_it_was_checked_under() {
        let schedule = Schedule::new(vec![booking(ReservationStatus::Confirmed, 10, 12)]);
        let conflict = {
            let confirmed_only = BookingPolicy {
                pending_blocks: false,
                ..BookingPolicy::default()
            };
            schedule.first_conflict(&window(11, 13), &confirmed_only, now())
        };
        assert_eq!(conflict.map(|b| b.window), Some(window(10, 12)));
    }

    #[test]
    fn test_sub_minute_overshoot_is_too_long() {
        let policy = BookingPolicy::default();
        let start = at(8);
        let end = start + Duration::minutes(DEFAULT_MAX_DURATION_MINUTES) + Duration::seconds(59);
        assert!(matches!(
            policy.validate_window(start, end, now()),
            Err(Rejection::InvalidWindow(WindowProblem::TooLong { minutes: 720, max: 720 }))
        ));

        let exact = start + Duration::minutes(DEFAULT_MAX_DURATION_MINUTES);
        assert!(policy.validate_window(start, exact, now()).is_ok());

        let short = start + Duration::minutes(DEFAULT_MIN_DURATION_MINUTES) - Duration::seconds(1);
        assert!(matches!(
            policy.validate_window(start, short, now()),
            Err(Rejection::InvalidWindow(WindowProblem::TooShort { minutes: 59, .. }))
        ));
    }

    proptest! {
        #[test]
        fn prop_admitted_bookings_never_overlap(
            requests in proptest::collection::vec((0i64..48, 1i64..8, any::<bool>()), 1..40)
        ) {
            let policy = BookingPolicy {
                min_duration_minutes: 30,
                max_duration_minutes: 8 * 60,
                ..BookingPolicy::default()
            };
            let base = at(0);
            let mut schedule = Schedule::default();

            for (offset, length, confirm) in requests {
                let start = base + Duration::minutes(offset * 30);
                let end = start + Duration::minutes(length * 30);
                let candidate = TimeWindow::new(start, end).unwrap();
                let id = Uuid::new_v4();
                if schedule.admit(id, candidate, None, CAPACITY, &policy, now()).is_ok() && confirm {
                    schedule.confirm(id);
                }
            }

            let active: Vec<_> = schedule.blocking(&policy, now()).collect();
            for (i, a) in active.iter().enumerate() {
                for b in active.iter().skip(i + 1) {
                    prop_assert!(!a.window.overlaps(&b.window), "{} overlaps {}", a.window, b.window);
                }
            }
        }

        #[test]
        fn prop_inverted_windows_always_invalid(start in 0i64..10_000, back in 0i64..600) {
            let policy = BookingPolicy::default();
            let s = at(0) + Duration::minutes(start);
            let e = s - Duration::minutes(back);
            prop_assert_eq!(
                policy.validate_window(s, e, now()),
                Err(Rejection::InvalidWindow(WindowProblem::EndNotAfterStart))
            );
        }
    }
}
