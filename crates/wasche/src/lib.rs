//! Gateway ingestion for vibration-sensing laundry machine nodes.
//!
//! Sensor nodes report each machine's state over a serial gateway link as
//! fixed-size tagged frames. wasche decodes those frames, keeps a live
//! per-node status table, and persists readings and status.
//!
//! # Crate Structure
//!
//! - [`transport`]: gateway links (serial port, capture file replay)
//! - [`frame`]: packet model, wire codec and blocking packet reader
//! - [`store`]: status and reading persistence
//! - [`ingest`]: ingestion loop and state reconciliation (behind `ingest` feature)

/// Re-export transport types.
pub mod transport {
    pub use wasche_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use wasche_frame::*;
}

/// Re-export store types.
pub mod store {
    pub use wasche_store::*;
}

/// Re-export ingestion types (requires `ingest` feature).
#[cfg(feature = "ingest")]
pub mod ingest {
    pub use wasche_ingest::*;
}
