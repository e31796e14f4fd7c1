use std::time::Duration;

use wasche_frame::FrameConfig;

/// What the ingestion thread does when the persistence queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackpressurePolicy {
    /// Drop the newest event and report it. Frame reading never waits.
    #[default]
    DropNewest,
    /// Wait for queue space. Frame reading stalls while the store catches up.
    Block,
}

/// Controls ingestion loop behavior.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Wait between failed attempts to open the transport.
    pub reconnect_delay: Duration,
    /// Capacity of the persistence queue, in events.
    pub queue_capacity: usize,
    /// Full-queue behavior.
    pub backpressure: BackpressurePolicy,
    /// Packet reader settings.
    pub frame: FrameConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            queue_capacity: 1024,
            backpressure: BackpressurePolicy::DropNewest,
            frame: FrameConfig::default(),
        }
    }
}
