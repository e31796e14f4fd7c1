use std::io::Read;

use crate::error::Result;

/// A source of gateway links.
///
/// `open` is called by the ingestion loop every time it needs a fresh
/// connection, so implementations must be reusable after a link is dropped.
/// Each returned link reads with a bounded attempt: a read either yields
/// bytes, yields zero bytes, or fails with `TimedOut`/`WouldBlock` when the
/// line is idle. Dropping the link closes the underlying handle.
pub trait Transport: Send {
    /// The connected byte stream.
    type Link: Read + Send;

    /// Open a new link.
    fn open(&mut self) -> Result<Self::Link>;

    /// Human-readable endpoint description for logs.
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    type Link = T::Link;

    fn open(&mut self) -> Result<Self::Link> {
        (**self).open()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
