//! Serial-over-TCP link.
//!
//! Talks to a phone exposed by a serial-to-network bridge (ser2net, a
//! terminal server, or a modem with a raw TCP port). Baud rate is the
//! bridge's concern and is ignored here.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

use tracing::debug;

use super::{LinkSettings, TransportLink};

const READ_CHUNK: usize = 1024;

/// A [`TransportLink`] over a TCP connection.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    /// Bytes already pulled off the socket but not yet handed out.
    pending: Vec<u8>,
}

impl TcpLink {
    /// Connect to `host:port`.
    pub fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        debug!(addr, "TCP link connected");
        Ok(TcpLink {
            stream,
            pending: Vec::new(),
        })
    }

    /// Pull everything the socket has buffered into `pending`.
    fn fill_pending(&mut self) -> io::Result<()> {
        self.stream.set_nonblocking(true)?;
        let result = self.drain_socket();
        self.stream.set_nonblocking(false)?;
        result
    }

    fn drain_socket(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection closed by peer",
                    ))
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

impl TransportLink for TcpLink {
    fn configure(&mut self, settings: &LinkSettings) -> io::Result<()> {
        self.stream.set_read_timeout(Some(settings.read_timeout))?;
        self.stream.set_write_timeout(Some(settings.read_timeout * 10))?;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        self.fill_pending()?;
        Ok(self.pending.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        self.fill_pending()?;
        Ok(std::mem::take(&mut self.pending))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}
