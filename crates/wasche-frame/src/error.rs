/// Errors that can occur while reading packets from a link.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload did not arrive completely before the frame deadline.
    ///
    /// The partial bytes are discarded; the next read starts at a new tag.
    #[error("incomplete frame for tag {tag:#04x}: expected {expected} payload bytes, received {received}")]
    Incomplete {
        tag: u8,
        expected: usize,
        received: usize,
    },

    /// The underlying link failed.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for frame-level errors the stream can recover from by itself.
    pub fn is_framing(&self) -> bool {
        matches!(self, FrameError::Incomplete { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
