/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be serialized.
    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A journal line could not be parsed.
    #[error("corrupt journal record at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
