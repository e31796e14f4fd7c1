//! Ingestion and reconciliation of node telemetry.
//!
//! A dedicated thread owns the gateway link: it decodes packets, routes each
//! one to a [`Command`], and applies it to the shared [`StatusTable`].
//! Persistence runs on a second thread fed through a bounded queue, so a slow
//! store never stalls frame reading. Query layers read through
//! [`StatusView`].

pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod persist;
pub mod reconciler;
pub mod router;
pub mod table;
pub mod view;

pub use config::{BackpressurePolicy, IngestConfig};
pub use error::{IngestError, Result};
pub use health::{HealthSnapshot, IngestHealth, LinkState};
pub use ingest::{IngestHandle, Ingestor, StopFlag};
pub use persist::{spawn_persistence, PersistEvent, PersistQueue, PersistWorker};
pub use reconciler::{Outcome, Reconciler};
pub use router::{route, Command};
pub use table::StatusTable;
pub use view::StatusView;
