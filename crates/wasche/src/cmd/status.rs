use wasche_store::{JournalStore, Store};

use crate::cmd::StatusArgs;
use crate::exit::{store_error, CliError, CliResult, NOT_FOUND, SUCCESS};
use crate::output::{print_status_detail, print_statuses, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let store = JournalStore::load(&args.journal)
        .map_err(|err| store_error(&format!("load {}", args.journal.display()), err))?;

    let Some(node_id) = args.node else {
        let statuses = store
            .list_statuses()
            .map_err(|err| store_error("list statuses", err))?;
        print_statuses(&statuses, format);
        return Ok(SUCCESS);
    };

    let status = store
        .get_status(node_id)
        .map_err(|err| store_error("get status", err))?
        .ok_or_else(|| CliError::new(NOT_FOUND, format!("machine {node_id} not found")))?;
    let readings = store
        .recent_readings(node_id, args.limit)
        .map_err(|err| store_error("recent readings", err))?;
    print_status_detail(&status, &readings, format);
    Ok(SUCCESS)
}
