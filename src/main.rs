use std::collections::BTreeSet;
use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use log::info;
use seahorse::{App, Command, Context, Flag, FlagType};

use duty_roster::backup::Bundle;
use duty_roster::export::{export_rows, write_csv};
use duty_roster::input::PlanFile;
use duty_roster::plan::{ParticipantName, ParticipantStatus};
use duty_roster::service::PlanService;

const DEFAULT_DB: &str = "duty-roster.db";

fn set_env_if_absent<K: AsRef<OsStr>, V: AsRef<OsStr>>(var: K, default: impl FnOnce() -> V) {
    if env::var(var.as_ref()).is_err() {
        env::set_var(var, default());
    }
}

fn main() {
    set_env_if_absent("RUST_APP_LOG", || "info");
    color_backtrace::install();
    pretty_env_logger::init_custom_env("RUST_APP_LOG");

    run();
}

mod seahorse_exts {
    use std::path::PathBuf;

    use anyhow::Context as _;
    use seahorse::Context;

    pub trait ContextExt {
        fn context(&self) -> &Context;

        fn required_string_flag(&self, name: &str) -> Result<String, anyhow::Error> {
            self.context()
                .string_flag(name)
                .with_context(|| anyhow::anyhow!("missing required flag \"{}\"", name))
        }

        fn required_path_flag(&self, name: &str) -> Result<PathBuf, anyhow::Error> {
            self.required_string_flag(name).map(PathBuf::from)
        }
    }

    impl ContextExt for Context {
        fn context(&self) -> &Context {
            self
        }
    }
}

use seahorse_exts::ContextExt;

/// Wraps a `fn(&Context) -> anyhow::Result<()>` into a seahorse action.
///
/// seahorse declares `Action` as a plain fn pointer, so the wrapper must not
/// capture anything; expanding a fresh non-capturing closure per command
/// keeps the coercion possible.
macro_rules! try_action {
    ($action:path) => {
        |context: &Context| {
            if let Err(e) = $action(context) {
                log::error!("{:?}", e);
                ::std::process::exit(1);
            }
        }
    };
}

fn db_flag() -> Flag {
    Flag::new("db", FlagType::String).description(format!(
        "[optional] Path to the database file. Default: `{}`",
        DEFAULT_DB
    ))
}

fn open_service(context: &Context) -> anyhow::Result<PlanService> {
    let path = context
        .string_flag("db")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DB));

    // the one failure that is allowed to end the process
    PlanService::open(&path)
        .with_context(|| format!("failed to open the database at \"{}\"", path.display()))
}

fn parse_names(args: &[String]) -> anyhow::Result<Vec<ParticipantName>> {
    args.iter()
        .map(|arg| ParticipantName::new(arg.clone()).map_err(Into::into))
        .collect()
}

fn configure(context: &Context) -> anyhow::Result<()> {
    let plan_path = context.required_path_flag("plan")?;
    let plan = PlanFile::try_from_toml_file(&plan_path)?;
    let (period, names) = plan.validate()?;

    let mut service = open_service(context)?;
    service.configure(period, names)?;

    println!("configured; run `status` to see whose turn it is");

    Ok(())
}

fn status(context: &Context) -> anyhow::Result<()> {
    let service = open_service(context)?;
    let report = service.turn_state()?;

    println!("{} workdays in the planning period", report.total_workdays);

    for progress in &report.participants {
        let marker = match progress.status {
            ParticipantStatus::Active => "->",
            ParticipantStatus::Waiting => "  ",
            ParticipantStatus::Done => "ok",
        };

        println!(
            "{} {} (quota {}, {} remaining)",
            marker,
            progress.name,
            progress.quota,
            progress.remaining()
        );
    }

    match report.active() {
        Some(active) => println!("it is \"{}\"'s turn", active),
        None => println!("all participants are done"),
    }

    Ok(())
}

fn show(context: &Context) -> anyhow::Result<()> {
    let [name] = context.args.as_slice() else {
        anyhow::bail!("usage: show <name>");
    };

    let service = open_service(context)?;
    let selection = service.current_selection(name)?;

    if selection.is_empty() {
        println!("no committed selection for \"{}\"", name);
    }

    for date in selection {
        println!("{} ({})", date, date.format("%A"));
    }

    Ok(())
}

fn submit(context: &Context) -> anyhow::Result<()> {
    let Some((name, raw_dates)) = context.args.split_first() else {
        anyhow::bail!("usage: submit <name> [dates...]");
    };

    let dates = raw_dates
        .iter()
        .map(|raw| {
            raw.parse::<NaiveDate>()
                .with_context(|| format!("\"{}\" is not a date (expected YYYY-MM-DD)", raw))
        })
        .collect::<anyhow::Result<BTreeSet<_>>>()?;

    let mut service = open_service(context)?;
    let committed = service.submit_selection(name, dates)?;

    println!(
        "committed {} dates for \"{}\"; the turn moves on",
        committed.dates.len(),
        committed.name
    );

    Ok(())
}

fn reorder(context: &Context) -> anyhow::Result<()> {
    if context.args.is_empty() {
        anyhow::bail!("usage: reorder <name> <name> ...");
    }

    let names = parse_names(&context.args)?;
    let mut service = open_service(context)?;
    service.reorder(&names)?;

    println!("turn order updated");

    Ok(())
}

fn reset(context: &Context) -> anyhow::Result<()> {
    let mut service = open_service(context)?;
    service.reset()?;

    println!("all selections discarded; the first participant is up again");

    Ok(())
}

fn export(context: &Context) -> anyhow::Result<()> {
    let service = open_service(context)?;
    let rows = export_rows(&service)?;

    match context.string_flag("output") {
        Ok(path) => {
            let file = fs::File::create(&path)
                .with_context(|| format!("failed to create \"{}\"", path))?;
            write_csv(&rows, file)?;
            info!("wrote {} rows to \"{}\"", rows.len(), path);
        }
        Err(_) => write_csv(&rows, io::stdout().lock())?,
    }

    Ok(())
}

fn backup(context: &Context) -> anyhow::Result<()> {
    let output = context.required_path_flag("output")?;

    let service = open_service(context)?;
    let bundle = Bundle::snapshot(&service)?;
    fs::write(&output, bundle.to_json()?)
        .with_context(|| format!("failed to write \"{}\"", output.display()))?;

    info!("backup written to \"{}\"", output.display());

    Ok(())
}

fn restore(context: &Context) -> anyhow::Result<()> {
    let input = context.required_path_flag("input")?;

    let json = fs::read_to_string(&input)
        .with_context(|| format!("failed to read \"{}\"", input.display()))?;
    let bundle = Bundle::from_json(&json)?;
    info!("restoring backup from {}", bundle.created_at());

    let mut service = open_service(context)?;
    bundle.restore_into(&mut service)?;

    println!("state restored");

    Ok(())
}

fn run() {
    let args: Vec<String> = env::args().collect();

    let app = App::new(env!("CARGO_PKG_NAME"))
        .description(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .usage(format!("{} [command] [args]", args[0]))
        .command(
            Command::new("configure")
                .usage(format!("{} configure --plan plan.toml", args[0]))
                .description("Imports a plan file: period, week count and roster order.")
                .flag(
                    Flag::new("plan", FlagType::String)
                        .description("Path to the TOML plan file."),
                )
                .flag(db_flag())
                .action(try_action!(configure)),
        )
        .command(
            Command::new("status")
                .usage(format!("{} status", args[0]))
                .description("Shows whose turn it is and everyone's progress.")
                .flag(db_flag())
                .action(try_action!(status)),
        )
        .command(
            Command::new("show")
                .usage(format!("{} show <name>", args[0]))
                .description("Shows a participant's committed selection.")
                .flag(db_flag())
                .action(try_action!(show)),
        )
        .command(
            Command::new("submit")
                .usage(format!(
                    "{} submit <name> 2024-01-01 2024-01-02 ...",
                    args[0]
                ))
                .description("Submits the final selection for the active participant.")
                .flag(db_flag())
                .action(try_action!(submit)),
        )
        .command(
            Command::new("reorder")
                .usage(format!("{} reorder <name> <name> ...", args[0]))
                .description("Changes the turn order; must list every participant exactly once.")
                .flag(db_flag())
                .action(try_action!(reorder)),
        )
        .command(
            Command::new("reset")
                .usage(format!("{} reset", args[0]))
                .description("Discards all selections and restarts the pass.")
                .flag(db_flag())
                .action(try_action!(reset)),
        )
        .command(
            Command::new("export")
                .usage(format!("{} export [--output report.csv]", args[0]))
                .description("Exports all committed selections as CSV.")
                .flag(
                    Flag::new("output", FlagType::String)
                        .description("[optional] Output file. Default: stdout."),
                )
                .flag(db_flag())
                .action(try_action!(export)),
        )
        .command(
            Command::new("backup")
                .usage(format!("{} backup --output backup.json", args[0]))
                .description("Writes the whole persisted state to a backup file.")
                .flag(Flag::new("output", FlagType::String).description("Output file."))
                .flag(db_flag())
                .action(try_action!(backup)),
        )
        .command(
            Command::new("restore")
                .usage(format!("{} restore --input backup.json", args[0]))
                .description("Replaces the persisted state with a backup file's contents.")
                .flag(Flag::new("input", FlagType::String).description("Input file."))
                .flag(db_flag())
                .action(try_action!(restore)),
        );

    app.run(args);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `Command::action` takes a plain fn pointer, not a boxed closure, so
    /// every expansion of `try_action!` has to stay capture-free.
    #[test]
    fn test_actions_coerce_to_fn_pointers() {
        let actions: [seahorse::Action; 9] = [
            try_action!(configure),
            try_action!(status),
            try_action!(show),
            try_action!(submit),
            try_action!(reorder),
            try_action!(reset),
            try_action!(export),
            try_action!(backup),
            try_action!(restore),
        ];

        assert_eq!(actions.len(), 9);
    }
}
