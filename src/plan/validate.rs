use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

/// Why a submitted selection was refused. Each variant is a distinct,
/// user-renderable reason; there is no generic "invalid" case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{date} is not a workday within the planning period")]
    OutOfRangeDate { date: NaiveDate },
    #[error("too few days selected: {got} of the required {required}")]
    TooFewDays { required: usize, got: usize },
    #[error("too many days selected: {got}, but only {required} are allowed")]
    TooManyDays { required: usize, got: usize },
}

/// Accepts a candidate selection iff every date is in the workday universe
/// and the count matches the quota exactly.
///
/// Candidates come in as a set, so duplicates cannot occur structurally.
/// A quota of zero is legitimate (more participants than workdays) and is
/// satisfied by the empty set.
pub fn validate_selection(
    candidates: &BTreeSet<NaiveDate>,
    workdays: &[NaiveDate],
    quota: usize,
) -> Result<(), Rejection> {
    if let Some(date) = candidates
        .iter()
        .find(|date| !workdays.contains(date))
        .copied()
    {
        return Err(Rejection::OutOfRangeDate { date });
    }

    match candidates.len() {
        got if got < quota => Err(Rejection::TooFewDays {
            required: quota,
            got,
        }),
        got if got > quota => Err(Rejection::TooManyDays {
            required: quota,
            got,
        }),
        _ => Ok(()),
    }
}
