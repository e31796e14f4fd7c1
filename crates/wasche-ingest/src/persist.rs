use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, trace};
use wasche_store::{MachineReading, MachineStatus, Store};

use crate::config::BackpressurePolicy;
use crate::error::{IngestError, Result};
use crate::health::IngestHealth;

const WORKER_NAME: &str = "wasche-persist";

/// A store write requested by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PersistEvent {
    AppendReading(MachineReading),
    UpsertStatus(MachineStatus),
}

/// Sending half of the bounded persistence queue.
///
/// Dropping every clone lets the worker drain the remaining events and exit.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    tx: SyncSender<PersistEvent>,
    policy: BackpressurePolicy,
    health: Arc<IngestHealth>,
}

impl PersistQueue {
    /// Hand an event to the worker according to the backpressure policy.
    pub fn submit(&self, event: PersistEvent) -> Result<()> {
        match self.policy {
            BackpressurePolicy::DropNewest => match self.tx.try_send(event) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.health.record_persist_dropped();
                    Err(IngestError::PersistenceBacklog)
                }
                Err(TrySendError::Disconnected(_)) => Err(IngestError::PersistenceClosed),
            },
            BackpressurePolicy::Block => self
                .tx
                .send(event)
                .map_err(|_| IngestError::PersistenceClosed),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        tx: SyncSender<PersistEvent>,
        policy: BackpressurePolicy,
        health: Arc<IngestHealth>,
    ) -> Self {
        Self { tx, policy, health }
    }
}

/// Handle to the persistence worker thread.
#[derive(Debug)]
pub struct PersistWorker {
    thread: JoinHandle<()>,
}

impl PersistWorker {
    /// Wait for the worker to drain the queue and exit.
    ///
    /// Only returns once every [`PersistQueue`] clone has been dropped.
    pub fn join(self) -> Result<()> {
        self.thread
            .join()
            .map_err(|_| IngestError::Panicked(WORKER_NAME))
    }
}

/// Start the persistence worker and return the queue that feeds it.
pub fn spawn_persistence(
    store: Arc<dyn Store>,
    capacity: usize,
    policy: BackpressurePolicy,
    health: Arc<IngestHealth>,
) -> Result<(PersistQueue, PersistWorker)> {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    let worker_health = Arc::clone(&health);
    let thread = thread::Builder::new()
        .name(WORKER_NAME.to_string())
        .spawn(move || drain(rx, store.as_ref(), &worker_health))
        .map_err(|source| IngestError::Spawn {
            name: WORKER_NAME,
            source,
        })?;

    debug!(capacity, ?policy, "persistence worker started");
    Ok((
        PersistQueue { tx, policy, health },
        PersistWorker { thread },
    ))
}

fn drain(rx: Receiver<PersistEvent>, store: &dyn Store, health: &IngestHealth) {
    for event in rx {
        let result = match event {
            PersistEvent::AppendReading(reading) => store.append_reading(reading),
            PersistEvent::UpsertStatus(status) => store.upsert_status(status),
        };
        match result {
            Ok(()) => {
                trace!(?event, "persisted");
                health.record_persisted();
            }
            Err(err) => {
                error!(%err, ?event, "persistence failed");
                health.record_persist_failed();
            }
        }
    }
    debug!("persistence worker drained");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};
    use wasche_store::{MachineState, MemoryStore, StoreError};

    use super::*;

    fn status(node_id: u16) -> MachineStatus {
        MachineStatus {
            node_id,
            current_state: MachineState::Idle,
            last_updated: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    /// Store whose writes wait on a gate and can be told to fail.
    struct GatedStore {
        gate: Mutex<Receiver<()>>,
        inner: MemoryStore,
        fail: bool,
    }

    impl Store for GatedStore {
        fn append_reading(&self, reading: MachineReading) -> wasche_store::Result<()> {
            self.inner.append_reading(reading)
        }

        fn upsert_status(&self, status: MachineStatus) -> wasche_store::Result<()> {
            let _ = self.gate.lock().unwrap().recv();
            if self.fail {
                return Err(StoreError::Io(std::io::Error::other("disk gone")));
            }
            self.inner.upsert_status(status)
        }

        fn get_status(&self, node_id: u16) -> wasche_store::Result<Option<MachineStatus>> {
            self.inner.get_status(node_id)
        }

        fn list_statuses(&self) -> wasche_store::Result<Vec<MachineStatus>> {
            self.inner.list_statuses()
        }

        fn list_readings(
            &self,
            node_id: u16,
            since: DateTime<Utc>,
        ) -> wasche_store::Result<Vec<MachineReading>> {
            self.inner.list_readings(node_id, since)
        }

        fn recent_readings(
            &self,
            node_id: u16,
            limit: usize,
        ) -> wasche_store::Result<Vec<MachineReading>> {
            self.inner.recent_readings(node_id, limit)
        }
    }

    fn gated(fail: bool) -> (Arc<GatedStore>, mpsc::Sender<()>) {
        let (open, gate) = mpsc::channel();
        let store = Arc::new(GatedStore {
            gate: Mutex::new(gate),
            inner: MemoryStore::new(),
            fail,
        });
        (store, open)
    }

    #[test]
    fn events_reach_the_store_before_join_returns() {
        let store = Arc::new(MemoryStore::new());
        let health = Arc::new(IngestHealth::new());
        let (queue, worker) = spawn_persistence(
            store.clone(),
            8,
            BackpressurePolicy::DropNewest,
            health.clone(),
        )
        .unwrap();

        for node_id in 0..5 {
            queue.submit(PersistEvent::UpsertStatus(status(node_id))).unwrap();
        }
        drop(queue);
        worker.join().unwrap();

        assert_eq!(store.list_statuses().unwrap().len(), 5);
        assert_eq!(health.snapshot().persisted, 5);
    }

    #[test]
    fn drop_newest_reports_backlog_when_full() {
        let (store, open) = gated(false);
        let health = Arc::new(IngestHealth::new());
        let (queue, worker) =
            spawn_persistence(store.clone(), 1, BackpressurePolicy::DropNewest, health.clone())
                .unwrap();

        // The worker holds at most one event at the gate and one sits in the
        // queue, so some of these must be rejected.
        let rejected = (0..10)
            .map(|node_id| queue.submit(PersistEvent::UpsertStatus(status(node_id))))
            .filter(|result| matches!(result, Err(IngestError::PersistenceBacklog)))
            .count();
        assert!(rejected >= 8, "rejected only {rejected}");
        assert_eq!(health.snapshot().persist_dropped, rejected as u64);

        drop(queue);
        for _ in 0..10 {
            let _ = open.send(());
        }
        worker.join().unwrap();
        assert_eq!(store.list_statuses().unwrap().len(), 10 - rejected);
    }

    #[test]
    fn block_waits_for_space() {
        let (store, open) = gated(false);
        let health = Arc::new(IngestHealth::new());
        let (queue, worker) =
            spawn_persistence(store.clone(), 1, BackpressurePolicy::Block, health.clone())
                .unwrap();

        let opener = thread::spawn(move || {
            for _ in 0..6 {
                thread::sleep(std::time::Duration::from_millis(5));
                let _ = open.send(());
            }
        });
        for node_id in 0..6 {
            queue.submit(PersistEvent::UpsertStatus(status(node_id))).unwrap();
        }
        drop(queue);
        worker.join().unwrap();
        opener.join().unwrap();

        assert_eq!(store.list_statuses().unwrap().len(), 6);
        assert_eq!(health.snapshot().persist_dropped, 0);
    }

    #[test]
    fn store_failures_are_counted_and_worker_continues() {
        let (store, open) = gated(true);
        let health = Arc::new(IngestHealth::new());
        let (queue, worker) =
            spawn_persistence(store, 4, BackpressurePolicy::Block, health.clone()).unwrap();

        for node_id in 0..3 {
            let _ = open.send(());
            queue.submit(PersistEvent::UpsertStatus(status(node_id))).unwrap();
        }
        drop(queue);
        worker.join().unwrap();

        assert_eq!(health.snapshot().persist_failed, 3);
    }

    #[test]
    fn submit_after_worker_exit_is_closed() {
        let (tx, rx) = mpsc::sync_channel(1);
        drop(rx);
        for policy in [BackpressurePolicy::DropNewest, BackpressurePolicy::Block] {
            let queue = PersistQueue::from_parts(tx.clone(), policy, Arc::new(IngestHealth::new()));
            let err = queue
                .submit(PersistEvent::UpsertStatus(status(1)))
                .unwrap_err();
            assert!(matches!(err, IngestError::PersistenceClosed));
        }
    }
}
