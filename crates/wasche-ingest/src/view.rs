use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use wasche_store::{MachineReading, MachineStatus, Store};

use crate::error::Result;
use crate::health::{HealthSnapshot, IngestHealth};
use crate::table::StatusTable;

/// Read-only access for query layers.
///
/// Statuses come from the live table and are current as soon as a packet is
/// applied. Readings come from the store and trail the persistence queue.
#[derive(Clone)]
pub struct StatusView {
    table: Arc<StatusTable>,
    store: Arc<dyn Store>,
    health: Arc<IngestHealth>,
}

impl StatusView {
    pub fn new(table: Arc<StatusTable>, store: Arc<dyn Store>, health: Arc<IngestHealth>) -> Self {
        Self {
            table,
            store,
            health,
        }
    }

    pub fn status(&self, node_id: u16) -> Option<MachineStatus> {
        self.table.get(node_id)
    }

    /// All known nodes, ordered by node id.
    pub fn statuses(&self) -> Vec<MachineStatus> {
        self.table.snapshot()
    }

    /// Readings for a node received after `since`, oldest first.
    pub fn readings(&self, node_id: u16, since: DateTime<Utc>) -> Result<Vec<MachineReading>> {
        Ok(self.store.list_readings(node_id, since)?)
    }

    /// Up to `limit` most recent readings, newest first.
    pub fn recent_readings(&self, node_id: u16, limit: usize) -> Result<Vec<MachineReading>> {
        Ok(self.store.recent_readings(node_id, limit)?)
    }

    pub fn health(&self) -> HealthSnapshot {
        self.health.snapshot()
    }

    pub fn is_live(&self, max_silence: Duration) -> bool {
        self.health.is_live(max_silence)
    }
}

impl std::fmt::Debug for StatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusView")
            .field("nodes", &self.table.len())
            .field("state", &self.health.state())
            .finish()
    }
}
