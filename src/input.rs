use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::plan::{InvalidPeriod, InvalidRoster, ParticipantName, PlanningPeriod};

/// The plan configuration file, the only input an administrator has to write:
///
/// ```toml
/// start_date = "2024-01-01"
/// weeks = 4
/// roster = ["Anna", "Ben", "Carla"]
/// ```
///
/// The roster order in the file *is* the turn order.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanFile {
    start_date: NaiveDate,
    weeks: u32,
    roster: Vec<String>,
}

impl PlanFile {
    pub fn try_from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file \"{}\"", path.display()))?;

        Self::try_from_toml(&content)
            .with_context(|| format!("failed to parse plan file \"{}\"", path.display()))
    }

    pub fn try_from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks the file's contents and turns them into the validated
    /// configuration the service accepts.
    pub fn validate(&self) -> Result<(PlanningPeriod, Vec<ParticipantName>), PlanFileError> {
        let period = PlanningPeriod::new(self.start_date, self.weeks)?;

        if self.roster.is_empty() {
            return Err(PlanFileError::EmptyRoster);
        }

        let names = self
            .roster
            .iter()
            .map(ParticipantName::new)
            .collect::<Result<Vec<_>, _>>()?;

        let mut sorted = names.clone();
        sorted.sort();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(PlanFileError::Roster(InvalidRoster::DuplicateName {
                    name: pair[0].clone(),
                }));
            }
        }

        Ok((period, names))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanFileError {
    #[error(transparent)]
    Period(#[from] InvalidPeriod),
    #[error(transparent)]
    Roster(#[from] InvalidRoster),
    #[error("the roster must name at least one participant")]
    EmptyRoster,
}
