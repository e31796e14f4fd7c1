use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;
use wasche_ingest::{BackpressurePolicy, IngestConfig, Ingestor, StopFlag};
use wasche_store::{JournalStore, MemoryStore, Store};
use wasche_transport::{CaptureTransport, SerialConfig, SerialTransport, Transport};

use crate::cmd::{parse_duration, IngestArgs};
use crate::exit::{
    ingest_error, store_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS,
};
use crate::output::{print_health, OutputFormat};

const WAIT_SLICE: Duration = Duration::from_millis(50);

pub fn run(args: IngestArgs, format: OutputFormat) -> CliResult<i32> {
    let config = IngestConfig {
        reconnect_delay: parse_duration(&args.reconnect_delay)?,
        queue_capacity: args.queue,
        backpressure: if args.block_on_backlog {
            BackpressurePolicy::Block
        } else {
            BackpressurePolicy::DropNewest
        },
        ..IngestConfig::default()
    };
    let duration = args.duration.as_deref().map(parse_duration).transpose()?;

    // A capture that cannot be opened now never will be; fail instead of retrying.
    let capture = match &args.capture {
        Some(path) => {
            let mut transport = CaptureTransport::new(path);
            transport
                .open()
                .map_err(|err| transport_error(&format!("open {}", path.display()), err))?;
            Some(transport)
        }
        None => None,
    };

    let store: Arc<dyn Store> = match &args.journal {
        Some(path) => Arc::new(
            JournalStore::open(path)
                .map_err(|err| store_error(&format!("open {}", path.display()), err))?,
        ),
        None => {
            info!("no journal configured; readings are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    match capture {
        Some(transport) => ingest(transport, store, config, duration, format),
        None => {
            let transport = SerialTransport::new(SerialConfig {
                path: args.port.clone(),
                baud_rate: args.baud,
                ..SerialConfig::default()
            });
            ingest(transport, store, config, duration, format)
        }
    }
}

fn ingest<T: Transport + 'static>(
    transport: T,
    store: Arc<dyn Store>,
    config: IngestConfig,
    duration: Option<Duration>,
    format: OutputFormat,
) -> CliResult<i32> {
    let ingestor =
        Ingestor::new(transport, store, config).map_err(|err| ingest_error("startup", err))?;
    let stop = ingestor.stop_flag();
    install_ctrlc_handler(stop.clone())?;

    let handle = ingestor
        .spawn()
        .map_err(|err| ingest_error("startup", err))?;
    let view = handle.view().clone();

    let started = Instant::now();
    while !stop.is_stopped() && !handle.is_finished() {
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            info!("run duration reached");
            break;
        }
        thread::sleep(WAIT_SLICE);
    }

    handle
        .stop()
        .map_err(|err| ingest_error("shutdown", err))?;
    print_health(&view.health(), format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(stop: StopFlag) -> CliResult<()> {
    ctrlc::set_handler(move || stop.stop()).map_err(|err| {
        CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
    })
}
