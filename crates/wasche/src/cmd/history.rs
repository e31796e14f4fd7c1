use chrono::{DateTime, TimeDelta, Utc};
use wasche_store::{JournalStore, Store};

use crate::cmd::HistoryArgs;
use crate::exit::{store_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_readings, OutputFormat};

pub fn run(args: HistoryArgs, format: OutputFormat) -> CliResult<i32> {
    let since = window_start(Utc::now(), args.hours)?;

    let store = JournalStore::load(&args.journal)
        .map_err(|err| store_error(&format!("load {}", args.journal.display()), err))?;
    let readings = store
        .list_readings(args.node, since)
        .map_err(|err| store_error("list readings", err))?;
    print_readings(&readings, format);
    Ok(SUCCESS)
}

fn window_start(now: DateTime<Utc>, hours: u32) -> CliResult<DateTime<Utc>> {
    TimeDelta::try_hours(i64::from(hours))
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| CliError::new(USAGE, format!("--hours {hours} reaches past the calendar")))
}
