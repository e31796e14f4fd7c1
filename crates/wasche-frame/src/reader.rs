use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::codec::{parse_payload, FrameConfig, Packet, PAYLOAD_SIZE};
use crate::error::{FrameError, Result};
use crate::tag::payload_len;

/// Reads packets from a gateway link, one frame per call.
///
/// Nothing is buffered across calls: a payload that does not arrive in time
/// is dropped and reported, and the following call starts at a fresh tag.
pub struct PacketReader<T> {
    inner: T,
    config: FrameConfig,
    payload: [u8; PAYLOAD_SIZE],
}

impl<T: Read> PacketReader<T> {
    /// Create a new packet reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new packet reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            payload: [0u8; PAYLOAD_SIZE],
        }
    }

    /// Make one read attempt for the next packet.
    ///
    /// Returns `Ok(None)` when the link produced no tag byte within a single
    /// read attempt. Once a recognized tag is read, its payload is awaited for
    /// at most `frame_timeout`; a short payload is
    /// `Err(FrameError::Incomplete)`.
    pub fn poll_packet(&mut self) -> Result<Option<Packet>> {
        let tag = match self.read_tag()? {
            Some(tag) => tag,
            None => return Ok(None),
        };

        let Some(len) = payload_len(tag) else {
            trace!(tag, "unknown tag");
            return Ok(Some(Packet::Unknown { tag }));
        };

        let received = self.fill_payload(len)?;
        if received < len {
            return Err(FrameError::Incomplete {
                tag,
                expected: len,
                received,
            });
        }

        Ok(Some(parse_payload(tag, &self.payload[..len])))
    }

    /// Keep polling until a packet arrives or `timeout` elapses.
    ///
    /// Framing and I/O errors are returned as soon as they occur.
    pub fn read_packet_timeout(&mut self, timeout: Duration) -> Result<Option<Packet>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(packet) = self.poll_packet()? {
                return Ok(Some(packet));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }

    fn read_tag(&mut self) -> Result<Option<u8>> {
        let mut tag = [0u8; 1];
        loop {
            match self.inner.read(&mut tag) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(tag[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_idle(&err) => return Ok(None),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn fill_payload(&mut self, len: usize) -> Result<usize> {
        let deadline = Instant::now() + self.config.frame_timeout;
        let mut filled = 0usize;

        while filled < len {
            match self.inner.read(&mut self.payload[filled..len]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_idle(&err) => {}
                Err(err) => return Err(FrameError::Io(err)),
            }
            if filled < len && Instant::now() >= deadline {
                break;
            }
        }

        Ok(filled)
    }

    /// Borrow the underlying link.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying link.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner link.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update the payload deadline for subsequent frames.
    pub fn set_frame_timeout(&mut self, frame_timeout: Duration) {
        self.config.frame_timeout = frame_timeout;
    }

    /// Current packet reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

fn is_idle(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}
