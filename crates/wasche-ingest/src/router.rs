use chrono::{DateTime, Utc};
use wasche_frame::Packet;
use wasche_store::MachineReading;

/// A state change requested by one packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Append the reading and set the node's current state.
    RecordReading(MachineReading),
    /// Refresh the node's last-seen time.
    TouchLastSeen {
        node_id: u16,
        observed_at: DateTime<Utc>,
    },
    /// No state effect.
    LogOnly { tag: u8 },
}

impl Command {
    /// Node affected by the command, if any.
    pub fn node_id(&self) -> Option<u16> {
        match self {
            Command::RecordReading(reading) => Some(reading.node_id),
            Command::TouchLastSeen { node_id, .. } => Some(*node_id),
            Command::LogOnly { .. } => None,
        }
    }
}

/// Map a decoded packet to its command. `observed_at` is the arrival time.
pub fn route(packet: Packet, observed_at: DateTime<Utc>) -> Command {
    match packet {
        Packet::Data(data) => Command::RecordReading(MachineReading::from_packet(&data, observed_at)),
        Packet::Heartbeat(heartbeat) => Command::TouchLastSeen {
            node_id: heartbeat.node_id,
            observed_at,
        },
        Packet::Unknown { tag } => Command::LogOnly { tag },
    }
}

#[cfg(test)]
mod tests {
    use wasche_frame::{DataPacket, HeartbeatPacket, MachineState};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn data_routes_to_record_reading() {
        let data = DataPacket::new(12, MachineState::Spinning, 1.7, 16.0, 300);
        let command = route(Packet::Data(data), now());

        let Command::RecordReading(reading) = command else {
            panic!("expected RecordReading, got {command:?}");
        };
        assert_eq!(reading.node_id, 12);
        assert_eq!(reading.state, MachineState::Spinning);
        assert_eq!(reading.rms, 1.7);
        assert_eq!(reading.freq, 16.0);
        assert_eq!(reading.timestamp, now());
        assert_eq!(reading.device_timestamp, 300);
    }

    #[test]
    fn heartbeat_routes_to_touch() {
        let command = route(Packet::Heartbeat(HeartbeatPacket { node_id: 5 }), now());
        assert_eq!(
            command,
            Command::TouchLastSeen {
                node_id: 5,
                observed_at: now()
            }
        );
        assert_eq!(command.node_id(), Some(5));
    }

    #[test]
    fn unknown_routes_to_log_only() {
        let command = route(Packet::Unknown { tag: 0x03 }, now());
        assert_eq!(command, Command::LogOnly { tag: 0x03 });
        assert_eq!(command.node_id(), None);
    }
}
