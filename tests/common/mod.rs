use std::path::{Path, PathBuf};

use duty_roster::input::PlanFile;
use duty_roster::service::PlanService;

/// Builds a plan file the way an administrator would write it and imports it
/// into a service backed by a database file under `dir`.
pub fn configured_service(dir: &Path, start: &str, weeks: u32, roster: &[&str]) -> PlanService {
    let names = roster
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ");

    let plan = PlanFile::try_from_toml(&format!(
        "start_date = \"{}\"\nweeks = {}\nroster = [{}]\n",
        start, weeks, names
    ))
    .expect("plan file should parse");

    let (period, names) = plan.validate().expect("plan file should be valid");

    let mut service = PlanService::open(db_path(dir)).expect("store should open");
    service
        .configure(period, names)
        .expect("configuration should succeed");

    service
}

#[allow(dead_code)]
pub fn db_path(dir: &Path) -> PathBuf {
    dir.join("duty-roster.db")
}
