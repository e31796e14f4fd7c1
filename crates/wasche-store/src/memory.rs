use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{MachineReading, MachineStatus};
use crate::Store;

/// In-process store.
///
/// Each operation takes its table lock once, so a concurrent reader sees a
/// status row either before or after an upsert, never in between.
#[derive(Debug, Default)]
pub struct MemoryStore {
    statuses: RwLock<BTreeMap<u16, MachineStatus>>,
    readings: RwLock<HashMap<u16, Vec<MachineReading>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total readings held across all nodes.
    pub fn reading_count(&self) -> usize {
        self.readings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl Store for MemoryStore {
    fn append_reading(&self, reading: MachineReading) -> Result<()> {
        self.readings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(reading.node_id)
            .or_default()
            .push(reading);
        Ok(())
    }

    fn upsert_status(&self, status: MachineStatus) -> Result<()> {
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(status.node_id, status);
        Ok(())
    }

    fn get_status(&self, node_id: u16) -> Result<Option<MachineStatus>> {
        Ok(self
            .statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node_id)
            .copied())
    }

    fn list_statuses(&self) -> Result<Vec<MachineStatus>> {
        Ok(self
            .statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect())
    }

    fn list_readings(&self, node_id: u16, since: DateTime<Utc>) -> Result<Vec<MachineReading>> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(readings
            .get(&node_id)
            .map(|history| {
                history
                    .iter()
                    .filter(|r| r.timestamp > since)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn recent_readings(&self, node_id: u16, limit: usize) -> Result<Vec<MachineReading>> {
        let readings = self.readings.read().unwrap_or_else(PoisonError::into_inner);
        Ok(readings
            .get(&node_id)
            .map(|history| history.iter().rev().take(limit).copied().collect())
            .unwrap_or_default())
    }
}
