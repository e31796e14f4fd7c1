use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use wasche_frame::{DataPacket, MachineState};

/// Latest known state of one node. One row per node id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineStatus {
    pub node_id: u16,
    pub current_state: MachineState,
    pub last_updated: DateTime<Utc>,
}

/// One vibration reading as received at the gateway. Never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineReading {
    pub node_id: u16,
    pub state: MachineState,
    /// Raw wire value; may be non-finite.
    #[serde(with = "wire_f32")]
    pub rms: f32,
    /// Raw wire value; may be non-finite.
    #[serde(with = "wire_f32")]
    pub freq: f32,
    /// Gateway arrival time.
    pub timestamp: DateTime<Utc>,
    /// Node-local timestamp carried in the frame.
    pub device_timestamp: u32,
}

impl MachineReading {
    /// Reading for a data packet received at `observed_at`.
    pub fn from_packet(packet: &DataPacket, observed_at: DateTime<Utc>) -> Self {
        Self {
            node_id: packet.node_id,
            state: packet.state,
            rms: packet.rms,
            freq: packet.freq,
            timestamp: observed_at,
            device_timestamp: packet.timestamp,
        }
    }
}

/// `f32` fields that keep non-finite values through JSON.
///
/// Finite values are plain numbers. NaN and the infinities are written as the
/// strings `"NaN"`, `"inf"` and `"-inf"`; `null` reads back as NaN.
mod wire_f32 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f32(*value)
        } else {
            serializer.collect_str(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        deserializer.deserialize_any(WireF32)
    }

    struct WireF32;

    impl Visitor<'_> for WireF32 {
        type Value = f32;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a number, \"NaN\", \"inf\" or \"-inf\"")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<f32, E> {
            Ok(v as f32)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<f32, E> {
            match v.parse::<f32>() {
                Ok(value) if !value.is_finite() => Ok(value),
                _ => Err(E::invalid_value(Unexpected::Str(v), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<f32, E> {
            Ok(f32::NAN)
        }
    }
}
