//! Byte transports for the wasche gateway link.
//!
//! The coordinator radio is attached over a serial port; recorded captures of
//! the same byte stream can be replayed from a file. Both hand out a
//! [`Transport::Link`] that implements [`std::io::Read`] with a bounded read
//! attempt, which is all the frame decoder needs.
//!
//! This is the lowest layer of wasche. Everything else builds on the
//! [`Transport`] trait provided here.

pub mod capture;
pub mod error;
pub mod serial;
pub mod traits;

pub use capture::{CaptureLink, CaptureTransport};
pub use error::{Result, TransportError};
pub use serial::{SerialConfig, SerialLink, SerialTransport};
pub use traits::Transport;
