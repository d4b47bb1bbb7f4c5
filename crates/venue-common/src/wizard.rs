//! The booking flow as an explicit state machine
//!
//! A client drives a [`Wizard`] by feeding it [`WizardEvent`]s that describe
//! what the server answered. The wizard never talks to the server itself; it is
//! plain data that can be stored, serialized, and replayed.
//!
//! ```text
//! SelectWindow ──Admitted──▶ CustomerDetails ──DetailsEntered──▶ Payment ──PaymentSucceeded──▶ Complete
//!      ▲   │Rejected (stay)          │Back                         │ │PaymentFailed (stay, retry)
//!      │   └───────────┘             │                             │ │PaymentTimedOut (stay, awaiting)
//!      └─────────────────────────────┴─────────HoldExpired─────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::ReservationStatus;
use crate::types::{Money, TimeWindow};

/// Maximum number of declined captures before the wizard stops offering retries
pub const MAX_PAYMENT_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectWindow,
    CustomerDetails,
    Payment,
    Complete,
}

impl WizardStep {
    /// Where a client should resume for a reservation the server already holds.
    ///
    /// Cancelled reservations restart from the beginning; pending ones go back
    /// to payment; confirmed ones are done.
    pub fn resume_from(status: ReservationStatus) -> Self {
        match status {
            ReservationStatus::Pending => Self::Payment,
            ReservationStatus::Confirmed => Self::Complete,
            ReservationStatus::Cancelled => Self::SelectWindow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Everything the wizard has collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub space_id: Option<Uuid>,
    pub window: Option<TimeWindow>,
    pub attendees: Option<i32>,
    pub reservation_id: Option<Uuid>,
    pub total_price: Option<Money>,
    pub customer: Option<CustomerDetails>,
    pub payment_ref: Option<String>,
    pub payment_attempts: u32,
    pub awaiting_confirmation: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WizardEvent {
    /// Server admitted the window and holds a pending reservation
    Admitted {
        space_id: Uuid,
        window: TimeWindow,
        attendees: Option<i32>,
        reservation_id: Uuid,
        total_price: Money,
    },
    /// Server refused the window (conflict, invalid window, capacity)
    Rejected { reason: String },
    DetailsEntered(CustomerDetails),
    Back,
    PaymentSucceeded { payment_ref: String },
    PaymentFailed { reason: String },
    /// Capture did not answer in time; the reservation is still pending
    PaymentTimedOut { payment_ref: String },
    /// The pending hold aged out before payment completed
    HoldExpired,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("Event {event} is not valid in step {step:?}")]
    UnexpectedEvent { step: WizardStep, event: &'static str },

    #[error("Customer details are incomplete: {0}")]
    IncompleteDetails(String),

    #[error("Payment was declined {0} times; start a new booking")]
    TooManyAttempts(u32),
}

impl WizardEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::Admitted { .. } => "admitted",
            Self::Rejected { .. } => "rejected",
            Self::DetailsEntered(_) => "details_entered",
            Self::Back => "back",
            Self::PaymentSucceeded { .. } => "payment_succeeded",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::PaymentTimedOut { .. } => "payment_timed_out",
            Self::HoldExpired => "hold_expired",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wizard {
    pub step: WizardStep,
    pub draft: BookingDraft,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::SelectWindow,
            draft: BookingDraft::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.step == WizardStep::Complete
    }

    /// Consume an event and produce the next wizard state.
    pub fn advance(self, event: WizardEvent) -> Result<Wizard, WizardError> {
        let Wizard { step, mut draft } = self;
        let unexpected = |event: &WizardEvent| WizardError::UnexpectedEvent {
            step,
            event: event.name(),
        };

        let next = match (step, event) {
            (
                WizardStep::SelectWindow,
                WizardEvent::Admitted {
                    space_id,
                    window,
                    attendees,
                    reservation_id,
                    total_price,
                },
            ) => {
                draft.space_id = Some(space_id);
                draft.window = Some(window);
                draft.attendees = attendees;
                draft.reservation_id = Some(reservation_id);
                draft.total_price = Some(total_price);
                draft.last_error = None;
                WizardStep::CustomerDetails
            },
            (WizardStep::SelectWindow, WizardEvent::Rejected { reason }) => {
                draft.last_error = Some(reason);
                WizardStep::SelectWindow
            },
            (WizardStep::CustomerDetails, WizardEvent::DetailsEntered(details)) => {
                check_details(&details)?;
                draft.customer = Some(details);
                WizardStep::Payment
            },
            (WizardStep::CustomerDetails, WizardEvent::Back) => {
                release_hold(&mut draft);
                WizardStep::SelectWindow
            },
            (WizardStep::Payment, WizardEvent::Back) => WizardStep::CustomerDetails,
            (WizardStep::Payment, WizardEvent::PaymentSucceeded { payment_ref }) => {
                draft.payment_ref = Some(payment_ref);
                draft.awaiting_confirmation = false;
                draft.last_error = None;
                WizardStep::Complete
            },
            (WizardStep::Payment, WizardEvent::PaymentFailed { reason }) => {
                draft.payment_attempts += 1;
                if draft.payment_attempts >= MAX_PAYMENT_ATTEMPTS {
                    return Err(WizardError::TooManyAttempts(draft.payment_attempts));
                }
                draft.last_error = Some(reason);
                WizardStep::Payment
            },
            (WizardStep::Payment, WizardEvent::PaymentTimedOut { payment_ref }) => {
                draft.payment_ref = Some(payment_ref);
                draft.awaiting_confirmation = true;
                WizardStep::Payment
            },
            (WizardStep::CustomerDetails | WizardStep::Payment, WizardEvent::HoldExpired) => {
                release_hold(&mut draft);
                draft.last_error = Some("Your hold on this time slot expired".to_string());
                WizardStep::SelectWindow
            },
            (_, event) => return Err(unexpected(&event)),
        };

        Ok(Wizard { step: next, draft })
    }
}

fn release_hold(draft: &mut BookingDraft) {
    draft.reservation_id = None;
    draft.total_price = None;
    draft.payment_ref = None;
    draft.payment_attempts = 0;
    draft.awaiting_confirmation = false;
}

fn check_details(details: &CustomerDetails) -> Result<(), WizardError> {
    if details.full_name.trim().is_empty() {
        return Err(WizardError::IncompleteDetails("full name is required".to_string()));
    }
    let email = details.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(WizardError::IncompleteDetails(format!("invalid email: {}", email))),
    }
}
