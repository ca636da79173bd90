//! Byte-channel links to the phone.
//!
//! The engine never touches a port directly; it drives a [`TransportLink`]
//! from its connection worker thread and from nowhere else. Opening and
//! platform quirks are the link's business.

use std::io;
use std::time::Duration;

mod memory;
mod tcp;

pub use memory::{echo_ok, memory_link, MemoryDevice, MemoryLink};
pub use tcp::TcpLink;

/// Settings applied to a link when a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    /// Baud rate, for links that have one.
    pub baud_rate: u32,
    /// Read timeout.
    pub read_timeout: Duration,
}

/// A byte channel to a phone or modem.
pub trait TransportLink: Send {
    /// Apply settings. Called once before the worker starts.
    fn configure(&mut self, settings: &LinkSettings) -> io::Result<()>;

    /// Write the whole buffer.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Number of bytes that can be read right now without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read whatever is currently available without blocking. May be empty.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Release the underlying channel.
    fn close(&mut self) -> io::Result<()>;
}
