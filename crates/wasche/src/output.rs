use std::io::{IsTerminal, Write};

use bytes::BytesMut;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use wasche_frame::{encode_packet, tag, Packet};
use wasche_ingest::HealthSnapshot;
use wasche_store::{MachineReading, MachineStatus};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn print_statuses(statuses: &[MachineStatus], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(statuses),
        OutputFormat::Table => {
            let mut out = table(vec!["NODE", "STATE", "LAST UPDATED"]);
            for status in statuses {
                out.add_row(vec![
                    status.node_id.to_string(),
                    status.current_state.to_string(),
                    time(status.last_updated),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            if statuses.is_empty() {
                println!("no machines reported yet");
            }
            for status in statuses {
                println!(
                    "node {:>5}  {:<8}  since {}",
                    status.node_id,
                    status.current_state,
                    time(status.last_updated)
                );
            }
        }
        OutputFormat::Raw => {
            for status in statuses {
                println!(
                    "{}\t{}\t{}",
                    status.node_id,
                    status.current_state,
                    time(status.last_updated)
                );
            }
        }
    }
}

#[derive(Serialize)]
struct DetailOutput<'a> {
    #[serde(flatten)]
    status: &'a MachineStatus,
    recent_readings: &'a [MachineReading],
}

/// One node's status followed by its recent readings.
pub fn print_status_detail(
    status: &MachineStatus,
    readings: &[MachineReading],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&DetailOutput {
            status,
            recent_readings: readings,
        }),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Machine {}:", status.node_id);
            println!("  State:        {}", status.current_state);
            println!("  Last updated: {}", time(status.last_updated));
            println!("  Readings:     {}", readings.len());
            if !readings.is_empty() {
                print_readings(readings, format);
            }
        }
        OutputFormat::Raw => {
            print_statuses(std::slice::from_ref(status), format);
            print_readings(readings, format);
        }
    }
}

pub fn print_readings(readings: &[MachineReading], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(readings),
        OutputFormat::Table => {
            let mut out = table(vec!["RECEIVED", "STATE", "RMS (g)", "FREQ (Hz)", "DEVICE TS"]);
            for reading in readings {
                out.add_row(vec![
                    time(reading.timestamp),
                    reading.state.to_string(),
                    format!("{:.3}", reading.rms),
                    format!("{:.2}", reading.freq),
                    reading.device_timestamp.to_string(),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            for reading in readings {
                println!(
                    "  {}  {:<8} rms={:.3}g freq={:.2}Hz",
                    time(reading.timestamp),
                    reading.state,
                    reading.rms,
                    reading.freq
                );
            }
        }
        OutputFormat::Raw => {
            for reading in readings {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    reading.node_id,
                    time(reading.timestamp),
                    reading.state,
                    reading.rms,
                    reading.freq,
                    reading.device_timestamp
                );
            }
        }
    }
}

#[derive(Serialize)]
struct PacketOutput {
    offset: usize,
    kind: &'static str,
    tag: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    node_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<wasche_frame::MachineState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rms: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    freq: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<u16>,
}

impl PacketOutput {
    fn new(offset: usize, packet: &Packet) -> Self {
        let mut out = Self {
            offset,
            kind: tag::tag_name(packet.tag()),
            tag: packet.tag(),
            node_id: packet.node_id(),
            state: None,
            rms: None,
            freq: None,
            timestamp: None,
            checksum: None,
        };
        if let Packet::Data(data) = packet {
            out.state = Some(data.state);
            out.rms = Some(data.rms);
            out.freq = Some(data.freq);
            out.timestamp = Some(data.timestamp);
            out.checksum = Some(data.checksum);
        }
        out
    }
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Decoded packets, each with its byte offset in the input.
pub fn print_packets(packets: &[(usize, Packet)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for (offset, packet) in packets {
                print_json(&PacketOutput::new(*offset, packet));
            }
        }
        OutputFormat::Table => {
            let mut out = table(vec![
                "OFFSET", "KIND", "NODE", "STATE", "RMS", "FREQ", "TIMESTAMP", "CHECKSUM",
            ]);
            for (offset, packet) in packets {
                let row = PacketOutput::new(*offset, packet);
                out.add_row(vec![
                    row.offset.to_string(),
                    row.kind.to_string(),
                    opt(row.node_id),
                    opt(row.state),
                    opt(row.rms),
                    opt(row.freq),
                    opt(row.timestamp),
                    opt(row.checksum.map(|c| format!("{c:#06x}"))),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            for (offset, packet) in packets {
                match packet {
                    Packet::Data(data) => println!(
                        "@{offset:<6} DATA      node={} state={} rms={} freq={} ts={} checksum={:#06x}",
                        data.node_id, data.state, data.rms, data.freq, data.timestamp, data.checksum
                    ),
                    Packet::Heartbeat(heartbeat) => {
                        println!("@{offset:<6} HEARTBEAT node={}", heartbeat.node_id)
                    }
                    Packet::Unknown { tag } => println!("@{offset:<6} UNKNOWN   tag={tag:#04x}"),
                }
            }
        }
        OutputFormat::Raw => {
            // Re-emit the frames on stdout, without inter-frame noise.
            let mut wire = BytesMut::new();
            for (_, packet) in packets {
                encode_packet(packet, &mut wire);
            }
            print_raw(&wire);
        }
    }
}

pub fn print_health(health: &HealthSnapshot, format: OutputFormat) {
    let last = health
        .last_packet_at
        .map(time)
        .unwrap_or_else(|| "never".to_string());
    let rows = [
        ("link", health.state.to_string()),
        ("data packets", health.data_packets.to_string()),
        ("heartbeats", health.heartbeats.to_string()),
        ("unknown packets", health.unknown_packets.to_string()),
        ("framing errors", health.framing_errors.to_string()),
        ("link failures", health.link_failures.to_string()),
        ("open failures", health.open_failures.to_string()),
        ("persisted", health.persisted.to_string()),
        ("persist dropped", health.persist_dropped.to_string()),
        ("persist failed", health.persist_failed.to_string()),
        ("last packet", last),
    ];

    match format {
        OutputFormat::Json => print_json(health),
        OutputFormat::Table => {
            let mut out = table(vec!["METRIC", "VALUE"]);
            for (name, value) in rows {
                out.add_row(vec![name.to_string(), value]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            println!("Ingestion summary:");
            for (name, value) in rows {
                println!("  {:<16} {value}", format!("{name}:"));
            }
        }
        OutputFormat::Raw => {
            for (name, value) in rows {
                println!("{}\t{value}", name.replace(' ', "_"));
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}
