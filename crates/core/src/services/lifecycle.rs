//! Incident lifecycle state machine.
//!
//! Every status change an incident can go through is decided here, by one
//! pure function over the current state and the requested event. Callers
//! apply the returned [`Transition`] with a compare-and-set on the stored
//! status, so a decision made on a stale read never overwrites a newer one.
//!
//! ```text
//! reported --accept--> in_progress --complete--> awaiting_confirmation
//!                         ^   |                      |   |
//!                         +---+ start                |   +--confirm(yes)/verify(yes)--> closed
//!                         +--------- start ----------+   |
//! reported <------------- confirm(no), volunteer cleared-+
//! ```

use safetracker_common::{AppError, AppResult};
use safetracker_db::entities::incident::IncidentStatus;
use safetracker_db::repositories::VolunteerChange;

/// Answer given through the emailed confirmation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyChoice {
    /// The work is done; close the incident.
    Yes,
    /// Not done yet.
    No,
}

impl VerifyChoice {
    /// Anything other than `yes` counts as a no.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "yes" { Self::Yes } else { Self::No }
    }
}

/// A status-changing request against an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A volunteer takes the incident.
    Accept { volunteer_id: i32 },
    /// The assigned volunteer (re)starts work.
    Start,
    /// The volunteer marks the work done.
    Complete,
    /// The reporter answers through the API.
    Confirm { confirmed: bool },
    /// The reporter answers through the emailed link.
    Verify(VerifyChoice),
}

impl LifecycleEvent {
    const fn name(self) -> &'static str {
        match self {
            Self::Accept { .. } => "accept",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Confirm { .. } => "confirm",
            Self::Verify(_) => "verify",
        }
    }
}

/// Outcome of a legal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status before the event.
    pub from: IncidentStatus,
    /// Status after the event.
    pub to: IncidentStatus,
    /// Effect on the assigned volunteer.
    pub volunteer: VolunteerChange,
}

impl Transition {
    const fn new(from: IncidentStatus, to: IncidentStatus, volunteer: VolunteerChange) -> Self {
        Self { from, to, volunteer }
    }

    /// True when applying the transition would not change the row.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.from == self.to && self.volunteer == VolunteerChange::Keep
    }
}

/// Decide what `event` does to an incident in `status` with `volunteer_id`.
pub fn transition(
    status: IncidentStatus,
    volunteer_id: Option<i32>,
    event: LifecycleEvent,
) -> AppResult<Transition> {
    use IncidentStatus::{AwaitingConfirmation, Closed, InProgress, Reported};
    use VolunteerChange::{Assign, Clear, Keep};

    let next = match (status, event) {
        (_, LifecycleEvent::Accept { .. }) if volunteer_id.is_some() => {
            return Err(AppError::AlreadyAssigned(
                "Incident already assigned".to_string(),
            ));
        }
        (Reported, LifecycleEvent::Accept { volunteer_id }) => {
            Transition::new(status, InProgress, Assign(volunteer_id))
        }
        (InProgress | AwaitingConfirmation, LifecycleEvent::Start) => {
            Transition::new(status, InProgress, Keep)
        }
        (InProgress, LifecycleEvent::Complete) => {
            Transition::new(status, AwaitingConfirmation, Keep)
        }
        (AwaitingConfirmation, LifecycleEvent::Confirm { confirmed: true }) => {
            Transition::new(status, Closed, Keep)
        }
        (AwaitingConfirmation, LifecycleEvent::Confirm { confirmed: false }) => {
            Transition::new(status, Reported, Clear)
        }
        (AwaitingConfirmation | Closed, LifecycleEvent::Verify(VerifyChoice::Yes)) => {
            Transition::new(status, Closed, Keep)
        }
        // The emailed page promises the status stays as the volunteer left it.
        (AwaitingConfirmation, LifecycleEvent::Verify(VerifyChoice::No)) => {
            Transition::new(status, status, Keep)
        }
        (_, event) => {
            return Err(AppError::InvalidTransition(format!(
                "Cannot {} an incident that is {status}",
                event.name()
            )));
        }
    };

    Ok(next)
}
