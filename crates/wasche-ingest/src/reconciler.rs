use std::sync::Arc;

use tracing::{debug, info, warn};
use wasche_frame::tag;
use wasche_store::MachineStatus;

use crate::error::Result;
use crate::persist::{PersistEvent, PersistQueue};
use crate::router::Command;
use crate::table::StatusTable;

/// Effect of one applied command on the status table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// A reading was recorded and the node's state set.
    Recorded(MachineStatus),
    /// The node's last-seen time was refreshed.
    Touched(MachineStatus),
    /// Nothing changed.
    Ignored,
}

/// Applies routed commands to the status table and queues their persistence.
#[derive(Debug)]
pub struct Reconciler {
    table: Arc<StatusTable>,
    queue: PersistQueue,
}

impl Reconciler {
    pub fn new(table: Arc<StatusTable>, queue: PersistQueue) -> Self {
        Self { table, queue }
    }

    pub fn table(&self) -> &Arc<StatusTable> {
        &self.table
    }

    /// Apply one command.
    ///
    /// The in-memory table is always updated. An error means one or more
    /// persistence events for the command were not accepted; the table
    /// already reflects the command when it is returned.
    pub fn apply(&self, command: Command) -> Result<Outcome> {
        match command {
            Command::RecordReading(reading) => {
                let appended = self.queue.submit(PersistEvent::AppendReading(reading));
                let status = self
                    .table
                    .set_state(reading.node_id, reading.state, reading.timestamp);
                info!(
                    node_id = reading.node_id,
                    state = %reading.state,
                    rms = reading.rms,
                    freq = reading.freq,
                    "reading"
                );
                let upserted = self.queue.submit(PersistEvent::UpsertStatus(status));
                appended.and(upserted)?;
                Ok(Outcome::Recorded(status))
            }
            Command::TouchLastSeen {
                node_id,
                observed_at,
            } => {
                let status = self.table.touch(node_id, observed_at);
                debug!(node_id, state = %status.current_state, "heartbeat");
                self.queue.submit(PersistEvent::UpsertStatus(status))?;
                Ok(Outcome::Touched(status))
            }
            Command::LogOnly { tag: value } => {
                warn!(
                    tag = format_args!("{value:#04x}"),
                    kind = tag::tag_name(value),
                    "ignoring unknown packet type"
                );
                Ok(Outcome::Ignored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use wasche_frame::{DataPacket, HeartbeatPacket, MachineState, Packet};
    use wasche_store::{MemoryStore, Store};

    use super::*;
    use crate::config::BackpressurePolicy;
    use crate::error::IngestError;
    use crate::health::IngestHealth;
    use crate::persist::spawn_persistence;
    use crate::router::route;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn data(node_id: u16, state: MachineState) -> Packet {
        Packet::Data(DataPacket::new(node_id, state, 0.5, 10.0, 1))
    }

    fn heartbeat(node_id: u16) -> Packet {
        Packet::Heartbeat(HeartbeatPacket { node_id })
    }

    /// Run packets through route + apply and return the drained store.
    fn reconcile(packets: &[(Packet, i64)]) -> (Arc<StatusTable>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let table = Arc::new(StatusTable::new());
        let (queue, worker) = spawn_persistence(
            store.clone(),
            64,
            BackpressurePolicy::Block,
            Arc::new(IngestHealth::new()),
        )
        .unwrap();
        let reconciler = Reconciler::new(table.clone(), queue);
        for (packet, secs) in packets {
            reconciler.apply(route(*packet, at(*secs))).unwrap();
        }
        drop(reconciler);
        worker.join().unwrap();
        (table, store)
    }

    #[test]
    fn heartbeat_for_unseen_node_creates_unknown_row() {
        let (table, store) = reconcile(&[(heartbeat(5), 0)]);
        let expected = MachineStatus {
            node_id: 5,
            current_state: MachineState::Unknown,
            last_updated: at(0),
        };
        assert_eq!(table.get(5), Some(expected));
        assert_eq!(store.get_status(5).unwrap(), Some(expected));
        assert!(store.recent_readings(5, 10).unwrap().is_empty());
    }

    #[test]
    fn heartbeat_keeps_state_and_advances_time() {
        let (table, store) = reconcile(&[(data(1, MachineState::Washing), 0), (heartbeat(1), 7)]);
        let row = table.get(1).unwrap();
        assert_eq!(row.current_state, MachineState::Washing);
        assert_eq!(row.last_updated, at(7));
        assert_eq!(store.get_status(1).unwrap(), Some(row));
        assert_eq!(store.recent_readings(1, 10).unwrap().len(), 1);
    }

    #[test]
    fn two_readings_one_row() {
        let (table, store) = reconcile(&[
            (data(1, MachineState::Washing), 0),
            (data(1, MachineState::Spinning), 3),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(store.list_statuses().unwrap().len(), 1);
        assert_eq!(
            store.get_status(1).unwrap().unwrap().current_state,
            MachineState::Spinning
        );

        let history = store.list_readings(1, at(-1)).unwrap();
        let states: Vec<_> = history.iter().map(|r| r.state).collect();
        assert_eq!(states, vec![MachineState::Washing, MachineState::Spinning]);
    }

    #[test]
    fn unknown_packet_changes_nothing() {
        let (table, store) = reconcile(&[(Packet::Unknown { tag: 0x03 }, 0)]);
        assert!(table.is_empty());
        assert!(store.list_statuses().unwrap().is_empty());
    }

    #[test]
    fn backlog_still_updates_table() {
        let table = Arc::new(StatusTable::new());
        let health = Arc::new(IngestHealth::new());
        // Nothing drains this channel: the first event fills it.
        let (tx, _rx) = std::sync::mpsc::sync_channel(1);
        let queue = PersistQueue::from_parts(tx, BackpressurePolicy::DropNewest, health.clone());
        let reconciler = Reconciler::new(table.clone(), queue);

        let err = reconciler
            .apply(route(data(4, MachineState::Done), at(0)))
            .unwrap_err();
        assert!(matches!(err, IngestError::PersistenceBacklog));
        assert!(err.is_persistence());
        assert_eq!(table.get(4).unwrap().current_state, MachineState::Done);
        assert_eq!(health.snapshot().persist_dropped, 1);
    }
}
