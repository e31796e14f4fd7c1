/// Errors that can occur in ingestion and reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] wasche_store::StoreError),

    /// The persistence queue was full and the event was dropped.
    #[error("persistence queue full; event dropped")]
    PersistenceBacklog,

    /// The persistence worker is no longer accepting events.
    #[error("persistence worker has stopped")]
    PersistenceClosed,

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },

    /// A worker thread panicked.
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

impl IngestError {
    /// True for errors that lose a persistence event but leave ingestion running.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            IngestError::Store(_) | IngestError::PersistenceBacklog | IngestError::PersistenceClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
