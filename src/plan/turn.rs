use crate::plan::roster::{ParticipantName, Roster};

/// Where a single participant stands in the current pass through the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantStatus {
    /// Not done yet, but someone earlier in the order is still selecting.
    Waiting,
    /// The one participant currently allowed to submit.
    Active,
    /// Selection committed.
    Done,
}

/// The roster as a whole: either one participant is up, or everyone is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    InProgress { active: ParticipantName },
    Complete,
}

impl TurnState {
    /// Derives the turn state from the roster. The empty roster has no turns
    /// to take, which counts as `Complete` here; callers that care (the
    /// service does) reject empty rosters before ever asking.
    #[must_use]
    pub fn of(roster: &Roster) -> Self {
        match roster.active() {
            Some(participant) => Self::InProgress {
                active: participant.name().clone(),
            },
            None => Self::Complete,
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<&ParticipantName> {
        match self {
            Self::InProgress { active } => Some(active),
            Self::Complete => None,
        }
    }
}

/// Status of a single participant under the current turn state.
#[must_use]
pub fn status_of(roster: &Roster, name: &str) -> Option<ParticipantStatus> {
    let participant = roster.get(name)?;

    if participant.is_done() {
        return Some(ParticipantStatus::Done);
    }

    let active = roster
        .active()
        .expect("an incomplete participant exists, so someone is active");

    if active.name().as_str() == name {
        Some(ParticipantStatus::Active)
    } else {
        Some(ParticipantStatus::Waiting)
    }
}
