//! Packet framing for the wasche sensor mesh.
//!
//! Every frame on the coordinator's serial line starts with a 1-byte type tag:
//! - `0x01` data: 17-byte payload (node id, machine state, rms, dominant
//!   frequency, node timestamp, checksum), all little-endian
//! - `0x02` heartbeat: 17-byte payload, only the node id is meaningful
//! - anything else: unknown, no payload
//!
//! Payload lengths are only known for recognized tags, so the stream is not
//! self-synchronizing. An unknown tag consumes exactly its own byte and the
//! next byte is read as a fresh candidate tag.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod tag;

#[cfg(feature = "async")]
pub use async_codec::PacketCodec;
pub use codec::{
    data_checksum, decode_packet, encode_packet, parse_payload, DataPacket, FrameConfig,
    HeartbeatPacket, MachineState, Packet, FRAME_SIZE, PAYLOAD_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::PacketReader;
pub use tag::{ACK, DATA, HEARTBEAT};
