use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use log::info;
use thiserror::Error;

use crate::plan::{
    status_of, validate_selection, EmptyRoster, ParticipantName, ParticipantStatus,
    PlanningPeriod, Rejection, ReorderError, TurnState,
};
use crate::store::{CommitOutcome, Store, StoreError};

/// The request/response surface of the tool. Owns the store; every caller —
/// the CLI today, any UI tomorrow — goes through here. Queries are idempotent,
/// `submit_selection` is the single mutating command of a planning pass, and
/// the remaining mutators are administrative.
///
/// Callers are assumed to be authenticated already; the `name` they pass in
/// is a verified identity, not a claim to be checked here.
pub struct PlanService {
    store: Store,
}

/// Proof that a selection went through; whoever is next is active now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub name: ParticipantName,
    pub dates: BTreeSet<NaiveDate>,
}

/// Everything the UI needs to render the current standing of the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub state: TurnState,
    pub total_workdays: usize,
    pub participants: Vec<ParticipantProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantProgress {
    pub name: ParticipantName,
    pub status: ParticipantStatus,
    pub quota: usize,
    pub selected: usize,
}

impl ParticipantProgress {
    /// Workdays this participant still has to pick.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.quota.saturating_sub(self.selected)
    }
}

impl TurnReport {
    #[must_use]
    pub fn active(&self) -> Option<&ParticipantName> {
        self.state.active()
    }

    /// The active participant's quota, once there is one.
    #[must_use]
    pub fn active_quota(&self) -> Option<usize> {
        let active = self.active()?;
        self.participants
            .iter()
            .find(|p| &p.name == active)
            .map(|p| p.quota)
    }
}

impl PlanService {
    /// Opens the service over the given database file. This is the only
    /// failure that should take the process down.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            store: Store::open(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            store: Store::open_in_memory()?,
        })
    }

    /// Replaces the planning period and roster, discarding all prior state.
    /// Existing selections belong to the old period and do not survive.
    pub fn configure(
        &mut self,
        period: PlanningPeriod,
        names: Vec<ParticipantName>,
    ) -> Result<(), ServiceError> {
        if names.is_empty() {
            return Err(ServiceError::EmptyRoster(EmptyRoster));
        }

        self.store.replace_configuration(period, &names)?;
        info!(
            "configured period starting {} ({} weeks) with {} participants",
            period.start(),
            period.weeks(),
            names.len()
        );

        Ok(())
    }

    fn period(&self) -> Result<PlanningPeriod, ServiceError> {
        self.store.period()?.ok_or(ServiceError::NotConfigured)
    }

    /// Who is up, and how far along everyone is.
    pub fn turn_state(&self) -> Result<TurnReport, ServiceError> {
        let period = self.period()?;
        let roster = self.store.roster()?;

        if roster.is_empty() {
            return Err(ServiceError::EmptyRoster(EmptyRoster));
        }

        let total_workdays = period.workdays().len();
        let state = TurnState::of(&roster);

        let participants = roster
            .iter()
            .map(|participant| {
                let name = participant.name();
                let progress = ParticipantProgress {
                    name: name.clone(),
                    status: status_of(&roster, name.as_str())
                        .expect("participant comes from the roster"),
                    quota: roster
                        .quota_for(name.as_str(), total_workdays)
                        .expect("participant comes from the roster"),
                    selected: self.store.selection(name.as_str())?.len(),
                };
                Ok(progress)
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(TurnReport {
            state,
            total_workdays,
            participants,
        })
    }

    /// The persisted selection of one participant; empty until they commit.
    pub fn current_selection(&self, name: &str) -> Result<BTreeSet<NaiveDate>, ServiceError> {
        Ok(self.store.selection(name)?)
    }

    /// Validates and commits the final selection of the active participant.
    ///
    /// Validation happens against a fresh read, and the store re-checks the
    /// turn order once more inside the commit transaction, so a stale caller
    /// loses cleanly instead of overwriting anyone.
    pub fn submit_selection(
        &mut self,
        name: &str,
        dates: BTreeSet<NaiveDate>,
    ) -> Result<Committed, SubmitError> {
        let period = self
            .store
            .period()?
            .ok_or(SubmitError::NotConfigured)?;
        let roster = self.store.roster()?;

        let participant = roster.get(name).ok_or_else(|| SubmitError::UnknownParticipant {
            name: name.to_string(),
        })?;

        if participant.is_done() {
            return Err(SubmitError::AlreadyCompleted);
        }

        if let TurnState::InProgress { active } = TurnState::of(&roster) {
            if active.as_str() != name {
                return Err(SubmitError::NotYourTurn { active });
            }
        }

        let workdays = period.workdays();
        let quota = roster
            .quota_for(name, workdays.len())
            .expect("participant comes from the roster");

        validate_selection(&dates, &workdays, quota)?;

        match self.store.commit_selection(name, &dates)? {
            CommitOutcome::Committed => {
                info!("\"{}\" committed {} dates", name, dates.len());
                Ok(Committed {
                    name: participant.name().clone(),
                    dates,
                })
            }
            // the transactional re-check disagreed with our read: someone
            // else got there in between
            CommitOutcome::AlreadyCompleted => Err(SubmitError::AlreadyCompleted),
            CommitOutcome::NotActive { active } => Err(SubmitError::NotYourTurn { active }),
            CommitOutcome::UnknownParticipant => Err(SubmitError::UnknownParticipant {
                name: name.to_string(),
            }),
        }
    }

    /// Administrative: restart the pass. All completion flags and selections
    /// are discarded; position 0 is active again.
    pub fn reset(&mut self) -> Result<(), ServiceError> {
        self.store.reset()?;
        info!("planning pass reset");

        Ok(())
    }

    /// Administrative: change the turn order. The new order must be a
    /// permutation of the current roster.
    pub fn reorder(&mut self, names: &[ParticipantName]) -> Result<(), ServiceError> {
        let roster = self.store.roster()?;
        let reordered = roster.reordered(names)?;
        self.store.replace_roster(&reordered)?;
        info!("roster reordered");

        Ok(())
    }

    #[must_use]
    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }
}

/// Failures of queries and administrative operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("settings incomplete: no planning period has been configured yet")]
    NotConfigured,
    #[error(transparent)]
    EmptyRoster(#[from] EmptyRoster),
    #[error(transparent)]
    Reorder(#[from] ReorderError),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Failures of `submit_selection`. Every variant names a specific reason the
/// caller can act on; none of them leave any state behind.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("settings incomplete: no planning period has been configured yet")]
    NotConfigured,
    #[error("\"{name}\" is not on the roster")]
    UnknownParticipant { name: String },
    #[error("selection was already committed and is final")]
    AlreadyCompleted,
    #[error("it is currently \"{active}\"'s turn")]
    NotYourTurn { active: ParticipantName },
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    // 2024-01-01 is a monday: two weeks give ten workdays
    fn service(names: &[&str]) -> PlanService {
        let mut service = PlanService::open_in_memory().unwrap();
        let period = PlanningPeriod::new(date(1), 2).unwrap();
        service
            .configure(period, names.iter().map(|n| name(n)).collect())
            .unwrap();
        service
    }

    fn dates(days: &[u32]) -> BTreeSet<NaiveDate> {
        days.iter().map(|d| date(*d)).collect()
    }

    #[test]
    fn test_unconfigured_submission() {
        let mut service = PlanService::open_in_memory().unwrap();

        assert!(matches!(
            service.submit_selection("anna", BTreeSet::new()),
            Err(SubmitError::NotConfigured)
        ));
        assert!(matches!(
            service.turn_state(),
            Err(ServiceError::NotConfigured)
        ));
    }

    #[test]
    fn test_turn_state_reports_quotas() {
        let service = service(&["anna", "ben", "carla"]);

        let report = service.turn_state().unwrap();
        assert_eq!(report.total_workdays, 10);
        assert_eq!(report.active(), Some(&name("anna")));
        // 10 days over 3 participants: 4, 3, 3
        let quotas: Vec<_> = report.participants.iter().map(|p| p.quota).collect();
        assert_eq!(quotas, vec![4, 3, 3]);
        assert_eq!(report.active_quota(), Some(4));
    }

    #[test]
    fn test_submit_out_of_turn() {
        let mut service = service(&["anna", "ben"]);

        let result = service.submit_selection("ben", dates(&[1, 2, 3, 4, 5]));

        assert!(matches!(
            result,
            Err(SubmitError::NotYourTurn { active }) if active == name("anna")
        ));
        assert_eq!(service.current_selection("ben").unwrap(), BTreeSet::new());
    }

    #[test]
    fn test_full_pass() {
        let mut service = service(&["anna", "ben"]);

        let committed = service
            .submit_selection("anna", dates(&[1, 2, 3, 4, 5]))
            .unwrap();
        assert_eq!(committed.name, name("anna"));

        let report = service.turn_state().unwrap();
        assert_eq!(report.active(), Some(&name("ben")));

        service
            .submit_selection("ben", dates(&[8, 9, 10, 11, 12]))
            .unwrap();

        let report = service.turn_state().unwrap();
        assert_eq!(report.state, TurnState::Complete);
        assert_eq!(report.active(), None);
    }

    #[test]
    fn test_resubmission_after_commit() {
        let mut service = service(&["anna", "ben"]);
        service
            .submit_selection("anna", dates(&[1, 2, 3, 4, 5]))
            .unwrap();

        let result = service.submit_selection("anna", dates(&[1, 2, 3, 4, 5]));

        assert!(matches!(result, Err(SubmitError::AlreadyCompleted)));
    }

    #[test]
    fn test_rejections_are_specific() {
        // one participant, ten workdays, quota 10
        let mut service = service(&["anna"]);

        assert!(matches!(
            service.submit_selection("anna", dates(&[1, 2])),
            Err(SubmitError::Rejected(Rejection::TooFewDays {
                required: 10,
                got: 2
            }))
        ));
        // the 6th is a saturday
        assert!(matches!(
            service.submit_selection("anna", dates(&[1, 2, 3, 4, 6])),
            Err(SubmitError::Rejected(Rejection::OutOfRangeDate { .. }))
        ));
        // nothing was persisted by any of the rejections
        assert_eq!(service.current_selection("anna").unwrap(), BTreeSet::new());
        assert_eq!(
            service.turn_state().unwrap().active(),
            Some(&name("anna"))
        );
    }

    #[test]
    fn test_unknown_participant() {
        let mut service = service(&["anna"]);

        assert!(matches!(
            service.submit_selection("nobody", BTreeSet::new()),
            Err(SubmitError::UnknownParticipant { .. })
        ));
    }

    #[test]
    fn test_reset_restarts_the_pass() {
        let mut service = service(&["anna", "ben"]);
        service
            .submit_selection("anna", dates(&[1, 2, 3, 4, 5]))
            .unwrap();

        service.reset().unwrap();

        let report = service.turn_state().unwrap();
        assert_eq!(report.active(), Some(&name("anna")));
        assert!(report.participants.iter().all(|p| p.selected == 0));
    }

    #[test]
    fn test_reorder_changes_turn_order() {
        let mut service = service(&["anna", "ben"]);

        service.reorder(&[name("ben"), name("anna")]).unwrap();

        let report = service.turn_state().unwrap();
        assert_eq!(report.active(), Some(&name("ben")));

        assert!(matches!(
            service.reorder(&[name("ben")]),
            Err(ServiceError::Reorder(ReorderError::NotAPermutation))
        ));
    }

    #[test]
    fn test_zero_quota_participants_commit_empty() {
        // one-week period: 5 workdays over 7 participants, the last two get 0
        let mut service = PlanService::open_in_memory().unwrap();
        let period = PlanningPeriod::new(date(1), 1).unwrap();
        let names: Vec<_> = ["a", "b", "c", "d", "e", "f", "g"]
            .iter()
            .map(|n| name(n))
            .collect();
        service.configure(period, names).unwrap();

        for n in ["a", "b", "c", "d", "e"] {
            let report = service.turn_state().unwrap();
            let day = report
                .participants
                .iter()
                .map(|p| p.selected)
                .sum::<usize>() as u32;
            service
                .submit_selection(n, dates(&[day + 1]))
                .unwrap();
        }

        // the zero-quota participants still have to take their (empty) turn
        service.submit_selection("f", BTreeSet::new()).unwrap();
        service.submit_selection("g", BTreeSet::new()).unwrap();

        assert_eq!(service.turn_state().unwrap().state, TurnState::Complete);
    }
}
