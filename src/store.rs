use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::plan::{Participant, ParticipantName, PlanningPeriod, Roster};

/// The SQLite-backed store. Three tables, mirroring the logical model:
/// `participants (name, position, done)`, `selections (participant, date)`
/// and a key/value `settings` table holding the planning period.
///
/// Every mutation runs inside a single transaction; the commit path
/// additionally re-checks the turn invariant against the persisted rows, so
/// two racing submitters cannot both get through.
pub struct Store {
    conn: Connection,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS participants (
        name TEXT PRIMARY KEY,
        position INTEGER NOT NULL UNIQUE,
        done INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS selections (
        participant TEXT NOT NULL,
        date TEXT NOT NULL,
        PRIMARY KEY (participant, date)
    );
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const SETTING_START_DATE: &str = "start_date";
const SETTING_WEEKS: &str = "weeks";

/// What the transactional commit found when it re-checked the turn order.
/// Only `Committed` leaves a change behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    UnknownParticipant,
    AlreadyCompleted,
    NotActive { active: ParticipantName },
}

impl Store {
    /// Opens (or creates) the store. A failure here is not recoverable for
    /// the caller; everything after a successful open is.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(value)
    }

    /// The configured planning period, or `None` while either setting is
    /// still missing.
    pub fn period(&self) -> Result<Option<PlanningPeriod>, StoreError> {
        let (Some(start), Some(weeks)) = (
            self.setting(SETTING_START_DATE)?,
            self.setting(SETTING_WEEKS)?,
        ) else {
            return Ok(None);
        };

        let start: NaiveDate = start.parse().map_err(|_| StoreError::Corrupt {
            reason: format!("stored start_date \"{start}\" is not a date"),
        })?;
        let weeks: u32 = weeks.parse().map_err(|_| StoreError::Corrupt {
            reason: format!("stored week count \"{weeks}\" is not a number"),
        })?;

        let period = PlanningPeriod::new(start, weeks).map_err(|e| StoreError::Corrupt {
            reason: e.to_string(),
        })?;

        Ok(Some(period))
    }

    pub fn roster(&self) -> Result<Roster, StoreError> {
        let mut statement = self
            .conn
            .prepare("SELECT name, position, done FROM participants ORDER BY position")?;

        let participants = statement
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, usize>(1)?,
                    row.get::<_, bool>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let participants = participants
            .into_iter()
            .map(|(name, position, done)| {
                let name = ParticipantName::new(name).map_err(|e| StoreError::Corrupt {
                    reason: e.to_string(),
                })?;
                Ok(Participant::new(name, position, done))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Roster::new(participants).map_err(|e| StoreError::Corrupt {
            reason: e.to_string(),
        })
    }

    pub fn selection(&self, name: &str) -> Result<BTreeSet<NaiveDate>, StoreError> {
        let mut statement = self
            .conn
            .prepare("SELECT date FROM selections WHERE participant = ?1 ORDER BY date")?;

        let dates = statement
            .query_map(params![name], |row| row.get(0))?
            .collect::<Result<BTreeSet<NaiveDate>, _>>()?;

        Ok(dates)
    }

    /// All persisted selections as `(participant, date)` rows, ordered by
    /// roster position and then date.
    pub fn all_selections(&self) -> Result<Vec<(ParticipantName, NaiveDate)>, StoreError> {
        let mut statement = self.conn.prepare(
            "SELECT s.participant, s.date FROM selections s
             JOIN participants p ON p.name = s.participant
             ORDER BY p.position, s.date",
        )?;

        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, NaiveDate>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(name, date)| {
                let name = ParticipantName::new(name).map_err(|e| StoreError::Corrupt {
                    reason: e.to_string(),
                })?;
                Ok((name, date))
            })
            .collect()
    }

    /// Replaces the whole configuration: planning period, roster (in the
    /// given order, all marked incomplete) and any previous selections.
    pub fn replace_configuration(
        &mut self,
        period: PlanningPeriod,
        names: &[ParticipantName],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![SETTING_START_DATE, period.start().to_string()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![SETTING_WEEKS, period.weeks().to_string()],
        )?;

        tx.execute("DELETE FROM participants", [])?;
        tx.execute("DELETE FROM selections", [])?;

        for (position, name) in names.iter().enumerate() {
            tx.execute(
                "INSERT INTO participants (name, position, done) VALUES (?1, ?2, 0)",
                params![name.as_str(), position],
            )?;
        }

        tx.commit()?;
        debug!("configuration replaced: {} participants", names.len());

        Ok(())
    }

    /// The single mutating entry point of a planning pass: persists the
    /// participant's final selection and marks them done, atomically.
    ///
    /// The turn invariant is re-checked inside the transaction, against the
    /// rows as they are *now*, not as the caller last saw them. If anything
    /// fails mid-way the transaction rolls back and no partial selection or
    /// flipped flag is ever visible.
    pub fn commit_selection(
        &mut self,
        name: &str,
        dates: &BTreeSet<NaiveDate>,
    ) -> Result<CommitOutcome, StoreError> {
        let tx = self.conn.transaction()?;

        let done: Option<bool> = tx
            .query_row(
                "SELECT done FROM participants WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let Some(done) = done else {
            return Ok(CommitOutcome::UnknownParticipant);
        };

        if done {
            return Ok(CommitOutcome::AlreadyCompleted);
        }

        let active: String = tx.query_row(
            "SELECT name FROM participants WHERE done = 0 ORDER BY position LIMIT 1",
            [],
            |row| row.get(0),
        )?;

        if active != name {
            let active = ParticipantName::new(active).map_err(|e| StoreError::Corrupt {
                reason: e.to_string(),
            })?;
            return Ok(CommitOutcome::NotActive { active });
        }

        tx.execute(
            "DELETE FROM selections WHERE participant = ?1",
            params![name],
        )?;
        for date in dates {
            tx.execute(
                "INSERT INTO selections (participant, date) VALUES (?1, ?2)",
                params![name, date],
            )?;
        }
        tx.execute(
            "UPDATE participants SET done = 1 WHERE name = ?1",
            params![name],
        )?;

        tx.commit()?;
        debug!("committed {} dates for \"{}\"", dates.len(), name);

        Ok(CommitOutcome::Committed)
    }

    /// Clears every `done` flag and deletes all selections, restarting the
    /// pass from the first position.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute("UPDATE participants SET done = 0", [])?;
        tx.execute("DELETE FROM selections", [])?;

        tx.commit()?;
        debug!("roster reset");

        Ok(())
    }

    /// Rewrites the roster in the order of the given (already validated)
    /// roster value. Selections and completion flags are untouched.
    ///
    /// The rows are re-inserted instead of updated in place: sqlite checks
    /// the UNIQUE position constraint per statement, which would make a
    /// straight position swap fail halfway.
    pub fn replace_roster(&mut self, roster: &Roster) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM participants", [])?;
        for participant in roster.iter() {
            tx.execute(
                "INSERT INTO participants (name, position, done) VALUES (?1, ?2, ?3)",
                params![
                    participant.name().as_str(),
                    participant.position(),
                    participant.is_done()
                ],
            )?;
        }

        tx.commit()?;

        Ok(())
    }

    /// Replaces all three tables from a backup bundle's contents, atomically.
    pub fn restore(
        &mut self,
        period: Option<PlanningPeriod>,
        roster: &Roster,
        selections: &[(ParticipantName, NaiveDate)],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM settings", [])?;
        if let Some(period) = period {
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                params![SETTING_START_DATE, period.start().to_string()],
            )?;
            tx.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)",
                params![SETTING_WEEKS, period.weeks().to_string()],
            )?;
        }

        tx.execute("DELETE FROM participants", [])?;
        for participant in roster.iter() {
            tx.execute(
                "INSERT INTO participants (name, position, done) VALUES (?1, ?2, ?3)",
                params![
                    participant.name().as_str(),
                    participant.position(),
                    participant.is_done()
                ],
            )?;
        }

        tx.execute("DELETE FROM selections", [])?;
        for (name, date) in selections {
            tx.execute(
                "INSERT INTO selections (participant, date) VALUES (?1, ?2)",
                params![name.as_str(), date],
            )?;
        }

        tx.commit()?;
        debug!("store restored from backup");

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Anything sqlite itself refused; retryable from the caller's view.
    #[error("storage failure: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Persisted rows that no current version of this tool would have
    /// written.
    #[error("persisted state is corrupt: {reason}")]
    Corrupt { reason: String },
}
