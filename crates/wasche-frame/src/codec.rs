use std::fmt;
use std::time::Duration;

use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::tag::{payload_len, DATA, HEARTBEAT};

/// Payload size of data and heartbeat frames.
pub const PAYLOAD_SIZE: usize = 17;

/// Total wire size of data and heartbeat frames: tag (1) + payload (17).
pub const FRAME_SIZE: usize = 1 + PAYLOAD_SIZE;

/// Bytes covered by the firmware checksum: everything before the checksum field.
const CHECKSUMMED_LEN: usize = FRAME_SIZE - 2;

/// Machine state as classified on the node from vibration analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MachineState {
    Idle,
    Washing,
    Spinning,
    Done,
    Unknown,
}

impl MachineState {
    /// Map a wire byte to a state. Anything outside `0..=3` is `Unknown`.
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0 => MachineState::Idle,
            1 => MachineState::Washing,
            2 => MachineState::Spinning,
            3 => MachineState::Done,
            _ => MachineState::Unknown,
        }
    }

    /// Wire byte for this state.
    pub fn as_wire(self) -> u8 {
        match self {
            MachineState::Idle => 0,
            MachineState::Washing => 1,
            MachineState::Spinning => 2,
            MachineState::Done => 3,
            MachineState::Unknown => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MachineState::Idle => "IDLE",
            MachineState::Washing => "WASHING",
            MachineState::Spinning => "SPINNING",
            MachineState::Done => "DONE",
            MachineState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vibration reading from a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPacket {
    pub node_id: u16,
    pub state: MachineState,
    /// RMS vibration magnitude in g.
    pub rms: f32,
    /// Dominant vibration frequency in Hz.
    pub freq: f32,
    /// Node-local timestamp.
    pub timestamp: u32,
    /// Checksum as transmitted. Carried through, never verified.
    pub checksum: u16,
}

impl DataPacket {
    /// Build a data packet carrying the checksum a node would compute for it.
    pub fn new(node_id: u16, state: MachineState, rms: f32, freq: f32, timestamp: u32) -> Self {
        let mut packet = Self {
            node_id,
            state,
            rms,
            freq,
            timestamp,
            checksum: 0,
        };
        let mut wire = BytesMut::with_capacity(FRAME_SIZE);
        encode_packet(&Packet::Data(packet), &mut wire);
        packet.checksum = data_checksum(&wire[..CHECKSUMMED_LEN]);
        packet
    }
}

/// A node keep-alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPacket {
    pub node_id: u16,
}

/// A decoded frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Packet {
    Data(DataPacket),
    Heartbeat(HeartbeatPacket),
    /// A tag with no known payload length. Nothing beyond the tag was consumed.
    Unknown { tag: u8 },
}

impl Packet {
    /// The type tag this packet was framed with.
    pub fn tag(&self) -> u8 {
        match self {
            Packet::Data(_) => DATA,
            Packet::Heartbeat(_) => HEARTBEAT,
            Packet::Unknown { tag } => *tag,
        }
    }

    /// Sending node, when the packet carries one.
    pub fn node_id(&self) -> Option<u16> {
        match self {
            Packet::Data(p) => Some(p.node_id),
            Packet::Heartbeat(p) => Some(p.node_id),
            Packet::Unknown { .. } => None,
        }
    }

    /// Number of bytes this packet occupied on the wire.
    pub fn wire_size(&self) -> usize {
        match self {
            Packet::Unknown { .. } => 1,
            _ => FRAME_SIZE,
        }
    }
}

/// Additive checksum used by node firmware: wrapping byte sum.
pub fn data_checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Interpret a complete payload for a recognized tag.
///
/// `payload` must hold at least [`PAYLOAD_SIZE`] bytes. Unrecognized tags
/// yield [`Packet::Unknown`].
pub fn parse_payload(tag: u8, payload: &[u8]) -> Packet {
    debug_assert!(payload.len() >= PAYLOAD_SIZE);
    let mut p = payload;
    match tag {
        DATA => Packet::Data(DataPacket {
            node_id: p.get_u16_le(),
            state: MachineState::from_wire(p.get_u8()),
            rms: p.get_f32_le(),
            freq: p.get_f32_le(),
            timestamp: p.get_u32_le(),
            checksum: p.get_u16_le(),
        }),
        // Heartbeats reuse the data frame size; only the node id is populated.
        HEARTBEAT => Packet::Heartbeat(HeartbeatPacket {
            node_id: p.get_u16_le(),
        }),
        other => Packet::Unknown { tag: other },
    }
}

/// Encode a packet into its wire form.
///
/// Wire format:
/// ```text
/// ┌─────┬─────────┬───────┬─────────┬─────────┬───────────┬──────────┐
/// │ tag │ node_id │ state │ rms     │ freq    │ timestamp │ checksum │
/// │ 1B  │ 2B LE   │ 1B    │ f32 LE  │ f32 LE  │ 4B LE     │ 2B LE    │
/// └─────┴─────────┴───────┴─────────┴─────────┴───────────┴──────────┘
/// ```
/// Heartbeats write the node id and pad the rest of the payload with zeros.
/// Unknown packets write only the tag byte.
pub fn encode_packet(packet: &Packet, dst: &mut BytesMut) {
    dst.reserve(packet.wire_size());
    match packet {
        Packet::Data(p) => {
            dst.put_u8(DATA);
            dst.put_u16_le(p.node_id);
            dst.put_u8(p.state.as_wire());
            dst.put_f32_le(p.rms);
            dst.put_f32_le(p.freq);
            dst.put_u32_le(p.timestamp);
            dst.put_u16_le(p.checksum);
        }
        Packet::Heartbeat(p) => {
            dst.put_u8(HEARTBEAT);
            dst.put_u16_le(p.node_id);
            dst.put_bytes(0, PAYLOAD_SIZE - 2);
        }
        Packet::Unknown { tag } => dst.put_u8(*tag),
    }
}

/// Decode one packet from a buffer.
///
/// Returns `None` if the buffer is empty or holds only part of a recognized
/// frame; nothing is consumed in that case. An unrecognized tag consumes one
/// byte and yields [`Packet::Unknown`].
pub fn decode_packet(src: &mut BytesMut) -> Option<Packet> {
    let tag = *src.first()?;

    let Some(len) = payload_len(tag) else {
        src.advance(1);
        return Some(Packet::Unknown { tag });
    };

    if src.len() < 1 + len {
        return None; // Need more data
    }

    src.advance(1);
    let payload = src.split_to(len);
    Some(parse_payload(tag, &payload))
}

/// Configuration for packet reading.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Time allowed for a payload to arrive once its tag has been read.
    pub frame_timeout: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_timeout: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tag::ACK;

    const SCENARIO: [u8; FRAME_SIZE] = [
        0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x20, 0x41, 0x00, 0x00, 0x48, 0x42, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00,
    ];

    #[test]
    fn decodes_reference_data_frame() {
        let mut buf = BytesMut::from(&SCENARIO[..]);
        let packet = decode_packet(&mut buf).unwrap();

        let Packet::Data(data) = packet else {
            panic!("expected data packet, got {packet:?}");
        };
        assert_eq!(data.node_id, 1);
        assert_eq!(data.state, MachineState::Idle);
        assert_eq!(data.rms, 10.0);
        assert_eq!(data.freq, 50.0);
        assert_eq!(data.timestamp, 0);
        assert_eq!(data.checksum, 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn heartbeat_reads_node_id_and_consumes_full_payload() {
        let mut buf = BytesMut::new();
        buf.put_u8(HEARTBEAT);
        buf.put_u16_le(0x0203);
        buf.put_slice(&[0xEE; PAYLOAD_SIZE - 2]);
        buf.put_u8(ACK);

        let packet = decode_packet(&mut buf).unwrap();
        assert_eq!(packet, Packet::Heartbeat(HeartbeatPacket { node_id: 0x0203 }));
        assert_eq!(buf.as_ref(), &[ACK]);
    }

    #[test]
    fn unknown_tag_consumes_only_tag_byte() {
        let mut buf = BytesMut::from(&[0x7F, 0x02][..]);
        assert_eq!(decode_packet(&mut buf), Some(Packet::Unknown { tag: 0x7F }));
        assert_eq!(buf.as_ref(), &[0x02]);
    }

    #[test]
    fn incomplete_frame_consumes_nothing() {
        let mut buf = BytesMut::from(&SCENARIO[..10]);
        assert_eq!(decode_packet(&mut buf), None);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        let mut buf = BytesMut::new();
        assert_eq!(decode_packet(&mut buf), None);
    }

    #[test]
    fn heartbeat_encodes_to_full_frame() {
        let mut buf = BytesMut::new();
        encode_packet(
            &Packet::Heartbeat(HeartbeatPacket { node_id: 9 }),
            &mut buf,
        );
        assert_eq!(buf.len(), FRAME_SIZE);
        assert_eq!(&buf[..3], &[HEARTBEAT, 9, 0]);
        assert!(buf[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn new_data_packet_carries_firmware_checksum() {
        let packet = DataPacket::new(1, MachineState::Idle, 10.0, 50.0, 0);
        // 0x01 + 0x01 + 0x20 + 0x41 + 0x48 + 0x42
        assert_eq!(packet.checksum, 0x00ED);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(data_checksum(&[0xFF; 300]), (0xFFu32 * 300 % 0x1_0000) as u16);
    }

    #[test]
    fn state_display_matches_wire_names() {
        assert_eq!(MachineState::Spinning.to_string(), "SPINNING");
        assert_eq!(MachineState::Unknown.as_wire(), 4);
    }

    proptest! {
        #[test]
        fn state_bytes_map_to_known_states_or_unknown(byte in any::<u8>()) {
            let state = MachineState::from_wire(byte);
            match byte {
                0 => prop_assert_eq!(state, MachineState::Idle),
                1 => prop_assert_eq!(state, MachineState::Washing),
                2 => prop_assert_eq!(state, MachineState::Spinning),
                3 => prop_assert_eq!(state, MachineState::Done),
                _ => prop_assert_eq!(state, MachineState::Unknown),
            }
        }

        #[test]
        fn data_fields_reencode_to_original_bytes(
            node_id in any::<u16>(),
            state in 0u8..=4,
            rms_bits in any::<u32>(),
            freq_bits in any::<u32>(),
            timestamp in any::<u32>(),
            checksum in any::<u16>(),
        ) {
            let mut wire = BytesMut::new();
            wire.put_u8(DATA);
            wire.put_u16_le(node_id);
            wire.put_u8(state);
            wire.put_u32_le(rms_bits);
            wire.put_u32_le(freq_bits);
            wire.put_u32_le(timestamp);
            wire.put_u16_le(checksum);
            let original = wire.clone();

            let packet = decode_packet(&mut wire).unwrap();
            prop_assert!(wire.is_empty());

            let mut reencoded = BytesMut::new();
            encode_packet(&packet, &mut reencoded);
            prop_assert_eq!(reencoded.as_ref(), original.as_ref());
        }
    }
}
