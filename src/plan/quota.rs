use thiserror::Error;

/// Number of workdays the participant at `position` must select.
///
/// The `total` workdays are split evenly across the roster; the remainder is
/// given to the earliest positions, one extra day each. This makes the quotas
/// sum to exactly `total` and keeps every quota within one day of any other.
pub fn quota(total: usize, roster_size: usize, position: usize) -> Result<usize, EmptyRoster> {
    if roster_size == 0 {
        return Err(EmptyRoster);
    }

    debug_assert!(position < roster_size);

    let base = total / roster_size;
    let remainder = total % roster_size;

    Ok(base + usize::from(position < remainder))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no participants configured")]
pub struct EmptyRoster;
