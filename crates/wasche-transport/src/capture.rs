use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Replays a recorded gateway byte stream from a file.
///
/// At end of file the link behaves like an idle serial line: each read waits
/// `idle_delay` and returns zero bytes. Reopening starts from the beginning.
#[derive(Debug, Clone)]
pub struct CaptureTransport {
    path: PathBuf,
    idle_delay: Duration,
}

impl CaptureTransport {
    /// Default pause applied to reads past the end of the capture.
    pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(100);

    /// Create a transport for a capture file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            idle_delay: Self::DEFAULT_IDLE_DELAY,
        }
    }

    /// Override the end-of-capture idle delay.
    pub fn with_idle_delay(mut self, idle_delay: Duration) -> Self {
        self.idle_delay = idle_delay;
        self
    }

    /// The capture file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Transport for CaptureTransport {
    type Link = CaptureLink;

    fn open(&mut self) -> Result<CaptureLink> {
        let file = File::open(&self.path).map_err(|source| TransportError::Capture {
            path: self.path.clone(),
            source,
        })?;
        info!(path = ?self.path, "replaying capture");
        Ok(CaptureLink {
            reader: BufReader::new(file),
            idle_delay: self.idle_delay,
            exhausted: false,
        })
    }

    fn describe(&self) -> String {
        format!("capture:{}", self.path.display())
    }
}

/// An open capture file.
#[derive(Debug)]
pub struct CaptureLink {
    reader: BufReader<File>,
    idle_delay: Duration,
    exhausted: bool,
}

impl CaptureLink {
    /// True once the whole capture has been read.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl Read for CaptureLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n == 0 && !buf.is_empty() {
            if !self.exhausted {
                debug!("capture exhausted");
                self.exhausted = true;
            }
            std::thread::sleep(self.idle_delay);
        }
        Ok(n)
    }
}
