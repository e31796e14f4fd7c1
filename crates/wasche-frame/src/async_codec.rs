//! `tokio_util::codec` adapter for reading the link through tokio.
//!
//! Partial frames are buffered until more bytes arrive, but only for
//! `frame_timeout` after the tag was first seen, matching
//! [`PacketReader`](crate::PacketReader). A stale partial frame is dropped so
//! its bytes never get stitched onto the next frame. A frame cut off by the
//! end of the stream is reported as incomplete.

use std::time::Instant;

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_packet, encode_packet, FrameConfig, Packet};
use crate::error::FrameError;

/// Packet decoder/encoder for `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone, Default)]
pub struct PacketCodec {
    config: FrameConfig,
    pending_since: Option<Instant>,
    pending_len: usize,
    discarded: u64,
}

impl PacketCodec {
    /// Create a codec with explicit configuration.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Partial frames dropped after their deadline passed.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn reset_pending(&mut self) {
        self.pending_since = None;
        self.pending_len = 0;
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        if let Some(since) = self.pending_since {
            if since.elapsed() >= self.config.frame_timeout {
                let stale = self.pending_len.min(src.len());
                warn!(
                    tag = src.first().copied(),
                    received = stale.saturating_sub(1),
                    "dropping partial frame after deadline"
                );
                src.advance(stale);
                self.discarded += 1;
                self.reset_pending();
            }
        }

        if let Some(packet) = decode_packet(src) {
            self.reset_pending();
            return Ok(Some(packet));
        }

        if src.is_empty() {
            self.reset_pending();
        } else {
            self.pending_since.get_or_insert_with(Instant::now);
            self.pending_len = src.len();
        }
        Ok(None)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, FrameError> {
        if let Some(packet) = self.decode(src)? {
            return Ok(Some(packet));
        }
        self.reset_pending();
        if src.is_empty() {
            return Ok(None);
        }

        let tag = src[0];
        let received = src.len() - 1;
        src.clear();
        Err(FrameError::Incomplete {
            tag,
            expected: crate::codec::PAYLOAD_SIZE,
            received,
        })
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_packet(&item, dst);
        Ok(())
    }
}
