//! Storage for per-node machine status and reading history.
//!
//! The [`Store`] trait is the persistence boundary: an append-only reading
//! history plus a latest-state table with exactly one row per node. Two
//! implementations ship here:
//! - [`MemoryStore`]: lock-guarded in-process tables
//! - [`JournalStore`]: a JSON-lines journal replayed into memory on open

pub mod error;
pub mod journal;
pub mod memory;
pub mod model;

pub use error::{Result, StoreError};
pub use journal::JournalStore;
pub use memory::MemoryStore;
pub use model::{MachineReading, MachineStatus};
pub use wasche_frame::MachineState;

use chrono::{DateTime, Utc};

/// Persistence boundary for machine state.
///
/// Implementations synchronize internally so a single instance can be shared
/// between the persistence worker and query readers.
pub trait Store: Send + Sync {
    /// Append a reading to the history.
    fn append_reading(&self, reading: MachineReading) -> Result<()>;

    /// Insert or replace the status row for `status.node_id`.
    fn upsert_status(&self, status: MachineStatus) -> Result<()>;

    /// Status row for one node.
    fn get_status(&self, node_id: u16) -> Result<Option<MachineStatus>>;

    /// All status rows, ordered by node id.
    fn list_statuses(&self) -> Result<Vec<MachineStatus>>;

    /// Readings for a node received after `since`, oldest first.
    fn list_readings(&self, node_id: u16, since: DateTime<Utc>) -> Result<Vec<MachineReading>>;

    /// Up to `limit` most recent readings for a node, newest first.
    fn recent_readings(&self, node_id: u16, limit: usize) -> Result<Vec<MachineReading>>;
}
