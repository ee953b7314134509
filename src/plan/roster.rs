use derive_more::{AsRef, Display, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::quota::quota;

/// A participant's unique name, the key everything else hangs off of.
///
/// Deserialization goes through `TryFrom`, so a blank name cannot enter the
/// system through a backup bundle either.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRef, Into, Serialize, Deserialize,
)]
#[as_ref(forward)]
#[serde(try_from = "String")]
pub struct ParticipantName(String);

impl ParticipantName {
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidRoster> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidRoster::BlankName);
        }

        Ok(Self(name))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantName {
    type Error = InvalidRoster;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    name: ParticipantName,
    position: usize,
    done: bool,
}

impl Participant {
    #[must_use]
    pub const fn new(name: ParticipantName, position: usize, done: bool) -> Self {
        Self {
            name,
            position,
            done,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &ParticipantName {
        &self.name
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}

/// The ordered roster for one planning period.
///
/// Participants are kept sorted by position. Names and positions are unique,
/// enforced on construction, so the turn order is always well-defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new(mut participants: Vec<Participant>) -> Result<Self, InvalidRoster> {
        participants.sort_by_key(Participant::position);

        for pair in participants.windows(2) {
            if pair[0].position() == pair[1].position() {
                return Err(InvalidRoster::DuplicatePosition {
                    position: pair[0].position(),
                });
            }
        }

        let mut names: Vec<_> = participants.iter().map(Participant::name).collect();
        names.sort();
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(InvalidRoster::DuplicateName {
                    name: pair[0].clone(),
                });
            }
        }

        Ok(Self { participants })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name().as_str() == name)
    }

    /// The first participant in order that has not committed yet.
    #[must_use]
    pub fn active(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| !p.is_done())
    }

    /// The quota of the named participant, or `None` if they are not on the
    /// roster. Quotas are derived from the dense roster index, not from the
    /// raw position value, so gaps in stored positions do not matter.
    #[must_use]
    pub fn quota_for(&self, name: &str, total_workdays: usize) -> Option<usize> {
        let index = self
            .participants
            .iter()
            .position(|p| p.name().as_str() == name)?;

        let quota = quota(total_workdays, self.len(), index)
            .expect("roster cannot be empty, it contains the participant");

        Some(quota)
    }

    /// Checks that `names` is a permutation of the current roster and returns
    /// the participants in the new order, positions reassigned densely.
    pub fn reordered(&self, names: &[ParticipantName]) -> Result<Self, ReorderError> {
        let mut expected: Vec<_> = self.participants.iter().map(Participant::name).collect();
        let mut given: Vec<_> = names.iter().collect();
        expected.sort();
        given.sort();

        if expected != given {
            return Err(ReorderError::NotAPermutation);
        }

        let participants = names
            .iter()
            .enumerate()
            .map(|(position, name)| {
                let previous = self.get(name.as_str()).expect("name was checked above");
                Participant::new(name.clone(), position, previous.is_done())
            })
            .collect();

        Ok(Self { participants })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRoster {
    #[error("participant names must not be blank")]
    BlankName,
    #[error("duplicate participant name \"{name}\"")]
    DuplicateName { name: ParticipantName },
    #[error("duplicate roster position {position}")]
    DuplicatePosition { position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("the new order must be a permutation of the existing roster")]
    NotAPermutation,
}
