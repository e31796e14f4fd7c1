use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use wasche_frame::MachineState;
use wasche_store::MachineStatus;

/// In-memory current status per node.
///
/// The ingestion thread is the only writer; any number of readers may query
/// concurrently. Each row is replaced whole under the write lock, so a reader
/// never sees a state from one packet paired with a time from another.
#[derive(Debug, Default)]
pub struct StatusTable {
    rows: RwLock<HashMap<u16, MachineStatus>>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table from previously persisted statuses.
    pub fn restore(statuses: impl IntoIterator<Item = MachineStatus>) -> Self {
        let rows = statuses
            .into_iter()
            .map(|status| (status.node_id, status))
            .collect();
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Set a node's state and last-updated time, creating the row if needed.
    pub fn set_state(&self, node_id: u16, state: MachineState, at: DateTime<Utc>) -> MachineStatus {
        let status = MachineStatus {
            node_id,
            current_state: state,
            last_updated: at,
        };
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(node_id, status);
        status
    }

    /// Refresh a node's last-updated time, keeping its state.
    ///
    /// A node seen for the first time gets [`MachineState::Unknown`].
    pub fn touch(&self, node_id: u16, at: DateTime<Utc>) -> MachineStatus {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let row = rows.entry(node_id).or_insert(MachineStatus {
            node_id,
            current_state: MachineState::Unknown,
            last_updated: at,
        });
        row.last_updated = at;
        *row
    }

    pub fn get(&self, node_id: u16) -> Option<MachineStatus> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node_id)
            .copied()
    }

    /// All rows, ordered by node id.
    pub fn snapshot(&self) -> Vec<MachineStatus> {
        let mut rows: Vec<_> = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect();
        rows.sort_by_key(|status| status.node_id);
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
