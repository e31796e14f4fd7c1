use std::io::Read;
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default device node of the USB coordinator.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default coordinator baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial port settings for the coordinator link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0`, `COM3`).
    pub path: String,
    /// Line speed. The link is always 8N1 without flow control.
    pub baud_rate: u32,
    /// Upper bound on a single read attempt.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Serial-port transport to the mesh coordinator.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    config: SerialConfig,
}

impl SerialTransport {
    /// Create a transport for the given port settings.
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }

    /// Port settings used by `open`.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl Transport for SerialTransport {
    type Link = SerialLink;

    fn open(&mut self) -> Result<SerialLink> {
        let port = serialport::new(&self.config.path, self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.config.read_timeout)
            .open()
            .map_err(|source| TransportError::Serial {
                path: self.config.path.clone(),
                source,
            })?;
        // Bytes queued before we attached belong to no frame we can align with.
        if let Err(err) = port.clear(serialport::ClearBuffer::Input) {
            warn!(path = %self.config.path, %err, "could not clear serial input buffer");
        }

        info!(
            path = %self.config.path,
            baud = self.config.baud_rate,
            "connected to coordinator"
        );
        Ok(SerialLink {
            port,
            path: self.config.path.clone(),
        })
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.config.path, self.config.baud_rate)
    }
}

/// An open serial connection. Closed on drop.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialLink {
    /// Device path this link was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        debug!(path = %self.path, "serial link closed");
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_coordinator() {
        let config = SerialConfig::default();
        assert_eq!(config.path, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
    }

    #[test]
    fn describe_includes_path_and_baud() {
        let transport = SerialTransport::new(SerialConfig {
            path: "/dev/ttyACM3".to_string(),
            baud_rate: 57_600,
            ..SerialConfig::default()
        });
        assert_eq!(transport.describe(), "serial:/dev/ttyACM3@57600");
    }

    #[test]
    #[cfg(unix)]
    fn open_missing_device_reports_path() {
        let mut transport = SerialTransport::new(SerialConfig {
            path: "/dev/wasche-no-such-port".to_string(),
            ..SerialConfig::default()
        });
        let err = transport.open().unwrap_err();
        assert!(matches!(err, TransportError::Serial { ref path, .. } if path == "/dev/wasche-no-such-port"));
        assert!(err.to_string().contains("/dev/wasche-no-such-port"));
    }
}
