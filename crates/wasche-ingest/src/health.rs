use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use wasche_frame::Packet;

/// Link phase of the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// No open link. The loop is opening or waiting to reopen.
    Disconnected,
    /// Reading packets.
    Connected,
    /// Stop requested or the loop has exited.
    Stopping,
}

impl LinkState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LinkState::Connected,
            2 => LinkState::Stopping,
            _ => LinkState::Disconnected,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LinkState::Disconnected => 0,
            LinkState::Connected => 1,
            LinkState::Stopping => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connected => "connected",
            LinkState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live counters shared between the ingestion threads and readers.
#[derive(Debug, Default)]
pub struct IngestHealth {
    state: AtomicU8,
    data_packets: AtomicU64,
    heartbeats: AtomicU64,
    unknown_packets: AtomicU64,
    framing_errors: AtomicU64,
    link_failures: AtomicU64,
    open_failures: AtomicU64,
    persisted: AtomicU64,
    persist_dropped: AtomicU64,
    persist_failed: AtomicU64,
    /// Unix millis of the last decoded packet, 0 if none.
    last_packet_ms: AtomicI64,
}

/// Point-in-time copy of [`IngestHealth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub state: LinkState,
    pub data_packets: u64,
    pub heartbeats: u64,
    pub unknown_packets: u64,
    pub framing_errors: u64,
    pub link_failures: u64,
    pub open_failures: u64,
    pub persisted: u64,
    pub persist_dropped: u64,
    pub persist_failed: u64,
    pub last_packet_at: Option<DateTime<Utc>>,
}

impl HealthSnapshot {
    /// Total decoded packets of any kind.
    pub fn packets(&self) -> u64 {
        self.data_packets + self.heartbeats + self.unknown_packets
    }
}

impl IngestHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: LinkState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    pub(crate) fn record_packet(&self, packet: &Packet, at: DateTime<Utc>) {
        let counter = match packet {
            Packet::Data(_) => &self.data_packets,
            Packet::Heartbeat(_) => &self.heartbeats,
            Packet::Unknown { .. } => &self.unknown_packets,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.last_packet_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub(crate) fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_link_failure(&self) {
        self.link_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persisted(&self) {
        self.persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_dropped(&self) {
        self.persist_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failed(&self) {
        self.persist_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Time the last packet was decoded.
    pub fn last_packet_at(&self) -> Option<DateTime<Utc>> {
        match self.last_packet_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }

    /// Connected and a packet arrived within `max_silence`.
    pub fn is_live(&self, max_silence: Duration) -> bool {
        if self.state() != LinkState::Connected {
            return false;
        }
        let Some(last) = self.last_packet_at() else {
            return false;
        };
        match (Utc::now() - last).to_std() {
            Ok(silence) => silence <= max_silence,
            // Last packet stamped slightly in the future.
            Err(_) => true,
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            state: self.state(),
            data_packets: self.data_packets.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            unknown_packets: self.unknown_packets.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
            link_failures: self.link_failures.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            persist_dropped: self.persist_dropped.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
            last_packet_at: self.last_packet_at(),
        }
    }
}
