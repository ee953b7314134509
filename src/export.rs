use std::io::{self, Write};

use chrono::NaiveDate;

use crate::plan::ParticipantName;
use crate::service::{PlanService, ServiceError};

/// One line of the report: who covers which date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub participant: ParticipantName,
    pub date: NaiveDate,
}

impl ExportRow {
    /// Full english weekday name, e.g. `Monday`.
    #[must_use]
    pub fn weekday_name(&self) -> String {
        self.date.format("%A").to_string()
    }
}

/// All committed selections in roster order, ready for the CSV report.
pub fn export_rows(service: &PlanService) -> Result<Vec<ExportRow>, ServiceError> {
    let rows = service
        .store()
        .all_selections()?
        .into_iter()
        .map(|(participant, date)| ExportRow { participant, date })
        .collect();

    Ok(rows)
}

/// Writes the rows as CSV with a header line. Participant names come from
/// free-form input, so they are quoted.
pub fn write_csv<W: Write>(rows: &[ExportRow], mut writer: W) -> io::Result<()> {
    writeln!(writer, "participant,date,weekday")?;

    for row in rows {
        writeln!(
            writer,
            "\"{}\",{},{}",
            row.participant.as_str().replace('"', "\"\""),
            row.date,
            row.weekday_name()
        )?;
    }

    Ok(())
}
