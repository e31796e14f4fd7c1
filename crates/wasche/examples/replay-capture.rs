//! Replay a recorded gateway capture and print the resulting machine status.
//!
//! Run with:
//!   cargo run --example replay-capture -- path/to/capture.bin

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use wasche::ingest::{IngestConfig, Ingestor};
use wasche::store::MemoryStore;
use wasche::transport::CaptureTransport;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: replay-capture <capture-file>")?;

    let ingestor = Ingestor::new(
        CaptureTransport::new(&path),
        Arc::new(MemoryStore::new()),
        IngestConfig::default(),
    )?;
    let handle = ingestor.spawn()?;

    // The capture transport idles at end of file. Wait until packets stop
    // arriving, or give up on an empty capture.
    let started = Instant::now();
    loop {
        thread::sleep(Duration::from_millis(100));
        let seen = handle.health().last_packet_at.is_some();
        if seen && !handle.view().is_live(Duration::from_millis(300)) {
            break;
        }
        if !seen && started.elapsed() > Duration::from_secs(5) {
            break;
        }
    }

    let view = handle.view().clone();
    handle.stop()?;

    for status in view.statuses() {
        println!(
            "node {:>5}  {:<8}  {}",
            status.node_id, status.current_state, status.last_updated
        );
    }
    eprintln!("{:?}", view.health());
    Ok(())
}
