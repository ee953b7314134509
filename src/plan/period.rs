use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The configured planning period: a start date and a number of whole weeks.
///
/// Everything else (the workday universe, quotas) is derived from it, never
/// stored. Two periods with the same start and week count always derive the
/// same workdays, regardless of when the derivation runs.
///
/// Deserialization funnels through [`PlanningPeriod::new`], so a zero-week
/// period cannot sneak in from a backup bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct PlanningPeriod {
    start: NaiveDate,
    weeks: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    start: NaiveDate,
    weeks: u32,
}

impl TryFrom<RawPeriod> for PlanningPeriod {
    type Error = InvalidPeriod;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.weeks)
    }
}

impl PlanningPeriod {
    pub fn new(start: NaiveDate, weeks: u32) -> Result<Self, InvalidPeriod> {
        if weeks == 0 {
            return Err(InvalidPeriod::ZeroWeeks);
        }

        Ok(Self { start, weeks })
    }

    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    #[must_use]
    pub const fn weeks(&self) -> u32 {
        self.weeks
    }

    /// The first date *after* the period.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        // never overflows for any date sqlite or toml can represent
        self.start + Days::new(u64::from(self.weeks) * 7)
    }

    /// Every Monday-to-Friday date in `[start, start + weeks * 7)`,
    /// in ascending order.
    #[must_use]
    pub fn workdays(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take(self.weeks as usize * 7)
            .filter(|date| is_workday(*date))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end() && is_workday(date)
    }
}

#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPeriod {
    #[error("the planning period must be at least one week long")]
    ZeroWeeks,
}
