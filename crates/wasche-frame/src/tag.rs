//! Packet type tags.
//!
//! Tags are the first byte of every frame. Only `DATA` and `HEARTBEAT` are
//! forwarded by the coordinator; `ACK` is used between nodes and the
//! coordinator radio and is treated as unknown if it ever shows up here.

use crate::codec::PAYLOAD_SIZE;

/// Vibration reading with classified machine state.
pub const DATA: u8 = 0x01;

/// Node keep-alive.
pub const HEARTBEAT: u8 = 0x02;

/// Radio-level acknowledgement (reserved).
pub const ACK: u8 = 0x03;

/// Returns a human-readable name for a tag.
pub fn tag_name(tag: u8) -> &'static str {
    match tag {
        DATA => "DATA",
        HEARTBEAT => "HEARTBEAT",
        ACK => "ACK",
        _ => "UNKNOWN",
    }
}

/// Payload length that follows a tag, or `None` when the tag is not
/// recognized and its length cannot be known.
pub fn payload_len(tag: u8) -> Option<usize> {
    match tag {
        DATA | HEARTBEAT => Some(PAYLOAD_SIZE),
        _ => None,
    }
}
