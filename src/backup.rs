use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{Participant, ParticipantName, PlanningPeriod, Roster};
use crate::service::PlanService;
use crate::store::StoreError;

/// Format version; bump when the bundle layout changes.
const BUNDLE_VERSION: u32 = 1;

/// A full dump of the persisted state: the three logical tables plus a
/// version tag and creation timestamp. Serialized as JSON, treated as opaque
/// by whoever shuttles it around.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    version: u32,
    created_at: DateTime<Utc>,
    period: Option<PlanningPeriod>,
    participants: Vec<Participant>,
    selections: Vec<(ParticipantName, NaiveDate)>,
}

impl Bundle {
    /// Snapshots the current state of the store.
    pub fn snapshot(service: &PlanService) -> Result<Self, StoreError> {
        let store = service.store();

        Ok(Self {
            version: BUNDLE_VERSION,
            created_at: Utc::now(),
            period: store.period()?,
            participants: store.roster()?.iter().cloned().collect(),
            selections: store.all_selections()?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        let bundle: Self = serde_json::from_str(json)?;

        if bundle.version != BUNDLE_VERSION {
            return Err(RestoreError::UnsupportedVersion {
                version: bundle.version,
            });
        }

        Ok(bundle)
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replaces the live state with this bundle's contents, atomically.
    ///
    /// A bundle without participants cannot be a real dump of a configured
    /// system and is rejected as corrupt before anything is touched.
    pub fn restore_into(self, service: &mut PlanService) -> Result<(), RestoreError> {
        if self.participants.is_empty() {
            return Err(RestoreError::Corrupt {
                reason: "bundle contains no participants".to_string(),
            });
        }

        let roster = Roster::new(self.participants).map_err(|e| RestoreError::Corrupt {
            reason: e.to_string(),
        })?;

        // orphaned selection rows would be invisible to every roster-joined
        // read afterwards, so a bundle containing them is not a real dump
        if let Some((name, _)) = self
            .selections
            .iter()
            .find(|(name, _)| roster.get(name.as_str()).is_none())
        {
            return Err(RestoreError::Corrupt {
                reason: format!("selection for \"{name}\" who is not in the bundle's roster"),
            });
        }

        service
            .store_mut()
            .restore(self.period, &roster, &self.selections)?;

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("backup is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("backup version {version} is not supported")]
    UnsupportedVersion { version: u32 },
    #[error("backup is corrupt: {reason}")]
    Corrupt { reason: String },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    fn configured_service() -> PlanService {
        let mut service = PlanService::open_in_memory().unwrap();
        let period = PlanningPeriod::new(date(1), 1).unwrap();
        service
            .configure(period, vec![name("anna"), name("ben")])
            .unwrap();
        service
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut service = configured_service();
        let dates: BTreeSet<_> = [date(1), date(2), date(3)].into_iter().collect();
        service.submit_selection("anna", dates.clone()).unwrap();

        let json = Bundle::snapshot(&service).unwrap().to_json().unwrap();

        // restore into a fresh, empty store
        let mut other = PlanService::open_in_memory().unwrap();
        Bundle::from_json(&json)
            .unwrap()
            .restore_into(&mut other)
            .unwrap();

        assert_eq!(other.current_selection("anna").unwrap(), dates);
        let report = other.turn_state().unwrap();
        assert_eq!(report.active(), Some(&name("ben")));
        assert_eq!(report.total_workdays, 5);
    }

    #[test]
    fn test_empty_participants_is_corrupt() {
        let empty = PlanService::open_in_memory().unwrap();
        let json = Bundle::snapshot(&empty).unwrap().to_json().unwrap();

        let mut live = configured_service();
        let result = Bundle::from_json(&json).unwrap().restore_into(&mut live);

        assert!(matches!(result, Err(RestoreError::Corrupt { .. })));
        // the live state was not replaced
        assert_eq!(live.turn_state().unwrap().active(), Some(&name("anna")));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let service = configured_service();
        let json = Bundle::snapshot(&service)
            .unwrap()
            .to_json()
            .unwrap()
            .replace("\"version\": 1", "\"version\": 99");

        assert!(matches!(
            Bundle::from_json(&json),
            Err(RestoreError::UnsupportedVersion { version: 99 })
        ));
    }

    fn bundle_json(period: &str, participants: &str, selections: &str) -> String {
        format!(
            concat!(
                "{{\"version\":1,\"created_at\":\"2024-01-01T00:00:00Z\",",
                "\"period\":{},\"participants\":{},\"selections\":{}}}"
            ),
            period, participants, selections
        )
    }

    #[test]
    fn test_blank_participant_name_fails_to_parse() {
        let json = bundle_json(
            "null",
            "[{\"name\":\"  \",\"position\":0,\"done\":false}]",
            "[]",
        );

        assert!(matches!(
            Bundle::from_json(&json),
            Err(RestoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_zero_week_period_fails_to_parse() {
        let json = bundle_json(
            "{\"start\":\"2024-01-01\",\"weeks\":0}",
            "[{\"name\":\"anna\",\"position\":0,\"done\":false}]",
            "[]",
        );

        assert!(matches!(
            Bundle::from_json(&json),
            Err(RestoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_orphaned_selection_is_corrupt() {
        let json = bundle_json(
            "{\"start\":\"2024-01-01\",\"weeks\":1}",
            "[{\"name\":\"anna\",\"position\":0,\"done\":false}]",
            "[[\"ghost\",\"2024-01-01\"]]",
        );

        let mut live = configured_service();
        let result = Bundle::from_json(&json).unwrap().restore_into(&mut live);

        assert!(matches!(result, Err(RestoreError::Corrupt { .. })));
        // the live state was not replaced, and reads still work
        assert_eq!(live.turn_state().unwrap().active(), Some(&name("anna")));
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            Bundle::from_json("not json"),
            Err(RestoreError::Malformed(_))
        ));
    }
}
