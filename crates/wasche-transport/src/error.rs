use std::path::PathBuf;

/// Errors that can occur while opening or reading a gateway transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The serial port could not be opened or configured.
    #[error("failed to open serial port {path}: {source}")]
    Serial {
        path: String,
        source: serialport::Error,
    },

    /// The capture file could not be opened.
    #[error("failed to open capture {path}: {source}")]
    Capture {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
