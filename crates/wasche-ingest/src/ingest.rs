use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};
use wasche_frame::{FrameError, PacketReader};
use wasche_store::Store;
use wasche_transport::Transport;

use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::health::{HealthSnapshot, IngestHealth, LinkState};
use crate::persist::{spawn_persistence, PersistWorker};
use crate::reconciler::Reconciler;
use crate::router::route;
use crate::table::StatusTable;
use crate::view::StatusView;

const INGEST_THREAD: &str = "wasche-ingest";

/// Longest single sleep while waiting to reconnect, so stop is seen promptly.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Cooperative stop signal shared with the ingestion loop.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop. Observed within one read timeout.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owns a transport and drives it through the ingestion state machine.
///
/// ```text
/// Disconnected --open ok--> Connected --read error--> Disconnected
/// Disconnected --open err--> (wait reconnect_delay) --> Disconnected
/// any --stop--> Stopping
/// ```
pub struct Ingestor<T: Transport> {
    transport: T,
    config: IngestConfig,
    reconciler: Reconciler,
    worker: PersistWorker,
    store: Arc<dyn Store>,
    health: Arc<IngestHealth>,
    stop: StopFlag,
}

impl<T: Transport> Ingestor<T> {
    /// Prepare ingestion over `transport`, persisting into `store`.
    ///
    /// The status table is seeded from the store and the persistence worker
    /// is started; the link is not opened until [`run`](Self::run).
    pub fn new(transport: T, store: Arc<dyn Store>, config: IngestConfig) -> Result<Self> {
        let table = Arc::new(StatusTable::restore(store.list_statuses()?));
        if !table.is_empty() {
            info!(nodes = table.len(), "restored machine status");
        }

        let health = Arc::new(IngestHealth::new());
        let (queue, worker) = spawn_persistence(
            Arc::clone(&store),
            config.queue_capacity,
            config.backpressure,
            Arc::clone(&health),
        )?;

        Ok(Self {
            transport,
            config,
            reconciler: Reconciler::new(table, queue),
            worker,
            store,
            health,
            stop: StopFlag::new(),
        })
    }

    /// Signal that stops this ingestor's loop.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Read-only view over the status table, store, and health.
    pub fn view(&self) -> StatusView {
        StatusView::new(
            Arc::clone(self.reconciler.table()),
            Arc::clone(&self.store),
            Arc::clone(&self.health),
        )
    }

    pub fn health(&self) -> Arc<IngestHealth> {
        Arc::clone(&self.health)
    }

    /// Run the loop on the calling thread until stopped.
    ///
    /// On return the link is closed and every accepted persistence event has
    /// been applied to the store.
    pub fn run(self) -> Result<()> {
        let Ingestor {
            mut transport,
            config,
            reconciler,
            worker,
            health,
            stop,
            ..
        } = self;

        let endpoint = transport.describe();
        info!(%endpoint, "ingestion started");

        while !stop.is_stopped() {
            health.set_state(LinkState::Disconnected);
            let link = match transport.open() {
                Ok(link) => link,
                Err(err) => {
                    health.record_open_failure();
                    warn!(%endpoint, %err, delay = ?config.reconnect_delay, "open failed; retrying");
                    wait_unless_stopped(&stop, config.reconnect_delay);
                    continue;
                }
            };

            health.set_state(LinkState::Connected);
            info!(%endpoint, "link connected");
            let mut reader = PacketReader::with_config(link, config.frame.clone());
            let failure = pump(&mut reader, &reconciler, &health, &stop);
            drop(reader);

            match failure {
                Some(err) => {
                    health.record_link_failure();
                    warn!(%endpoint, %err, "link lost; reconnecting");
                }
                None => debug!(%endpoint, "link closed"),
            }
        }

        health.set_state(LinkState::Stopping);
        drop(reconciler);
        worker.join()?;
        info!(%endpoint, "ingestion stopped");
        Ok(())
    }
}

impl<T: Transport + 'static> Ingestor<T> {
    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> Result<IngestHandle> {
        let stop = self.stop_flag();
        let view = self.view();
        let thread = thread::Builder::new()
            .name(INGEST_THREAD.to_string())
            .spawn(move || self.run())
            .map_err(|source| IngestError::Spawn {
                name: INGEST_THREAD,
                source,
            })?;
        Ok(IngestHandle { thread, stop, view })
    }
}

/// Read packets until stop or a link error. Returns the link error, if any.
fn pump<R: Read>(
    reader: &mut PacketReader<R>,
    reconciler: &Reconciler,
    health: &IngestHealth,
    stop: &StopFlag,
) -> Option<FrameError> {
    while !stop.is_stopped() {
        match reader.poll_packet() {
            Ok(Some(packet)) => {
                let observed_at = Utc::now();
                health.record_packet(&packet, observed_at);
                if let Err(err) = reconciler.apply(route(packet, observed_at)) {
                    warn!(%err, node_id = ?packet.node_id(), "persistence event not accepted");
                }
            }
            Ok(None) => {}
            Err(err) if err.is_framing() => {
                health.record_framing_error();
                warn!(%err, "discarding partial frame");
            }
            Err(err) => return Some(err),
        }
    }
    None
}

fn wait_unless_stopped(stop: &StopFlag, delay: Duration) {
    let deadline = Instant::now() + delay;
    while !stop.is_stopped() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(STOP_POLL));
    }
}

/// Handle to an ingestor running on its own thread.
///
/// Dropping the handle leaves the loop running; call [`stop`](Self::stop)
/// to shut it down.
#[derive(Debug)]
pub struct IngestHandle {
    thread: JoinHandle<Result<()>>,
    stop: StopFlag,
    view: StatusView,
}

impl IngestHandle {
    pub fn view(&self) -> &StatusView {
        &self.view
    }

    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn health(&self) -> HealthSnapshot {
        self.view.health()
    }

    /// True once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stop the loop and wait for it and the persistence worker to finish.
    pub fn stop(self) -> Result<()> {
        self.stop.stop();
        self.join()
    }

    /// Wait for the loop to exit without signalling it.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| IngestError::Panicked(INGEST_THREAD))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_is_shared() {
        let flag = StopFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_stopped());
        flag.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn wait_returns_early_on_stop() {
        let flag = StopFlag::new();
        let signal = flag.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal.stop();
        });

        let started = Instant::now();
        wait_unless_stopped(&flag, Duration::from_secs(10));
        assert!(started.elapsed() < Duration::from_secs(2));
        stopper.join().unwrap();
    }

    #[test]
    fn wait_runs_full_delay_without_stop() {
        let started = Instant::now();
        wait_unless_stopped(&StopFlag::new(), Duration::from_millis(30));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
