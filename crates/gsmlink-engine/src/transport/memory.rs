//! In-process link pair.
//!
//! [`memory_link`] returns the host end ([`MemoryLink`], handed to a session)
//! and the device end ([`MemoryDevice`], kept by whoever plays the phone).
//! The device end can answer writes through a responder, inject bytes at any
//! time to simulate unsolicited notifications, and make reads or writes fail.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{LinkSettings, TransportLink};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct MemoryState {
    inbound: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    responder: Option<Responder>,
    settings: Option<LinkSettings>,
    failing_reads: u32,
    failing_writes: u32,
    closed: bool,
}

/// Create a connected host/device pair.
pub fn memory_link() -> (MemoryLink, MemoryDevice) {
    let state = Arc::new(Mutex::new(MemoryState::default()));
    (
        MemoryLink {
            state: Arc::clone(&state),
        },
        MemoryDevice { state },
    )
}

/// Host end of an in-process link.
pub struct MemoryLink {
    state: Arc<Mutex<MemoryState>>,
}

impl TransportLink for MemoryLink {
    fn configure(&mut self, settings: &LinkSettings) -> io::Result<()> {
        self.state.lock().settings = Some(*settings);
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        state.written.push(data.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            let reply = responder(data);
            state.inbound.extend(reply);
        }
        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let state = self.state.lock();
        if state.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        Ok(state.inbound.len())
    }

    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock();
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        Ok(state.inbound.drain(..).collect())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.inbound.clear();
        Ok(())
    }
}

/// Device end of an in-process link.
#[derive(Clone)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDevice {
    /// Make bytes available to the host.
    pub fn push(&self, data: &[u8]) {
        self.state.lock().inbound.extend(data.iter().copied());
    }

    /// Make text available to the host.
    pub fn push_str(&self, text: &str) {
        self.push(text.as_bytes());
    }

    /// Answer every host write with whatever `responder` returns.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(responder));
    }

    /// Stop answering writes.
    pub fn clear_responder(&self) {
        self.state.lock().responder = None;
    }

    /// Everything the host has written, one entry per write.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    /// Host writes as (lossy) text.
    pub fn written_text(&self) -> Vec<String> {
        self.written()
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect()
    }

    /// Forget recorded writes.
    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Make the next `count` host reads fail.
    pub fn fail_reads(&self, count: u32) {
        self.state.lock().failing_reads = count;
    }

    /// Make the next `count` host writes fail. A failed write is neither
    /// recorded nor answered.
    pub fn fail_writes(&self, count: u32) {
        self.state.lock().failing_writes = count;
    }

    /// Settings the host applied, if any.
    pub fn settings(&self) -> Option<LinkSettings> {
        self.state.lock().settings
    }

    /// Whether the host closed the link.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// A responder that behaves like a phone with echo on which accepts every
/// command: it echoes the line and appends `\r\nOK\r\n`.
pub fn echo_ok(data: &[u8]) -> Vec<u8> {
    let mut reply = data.to_vec();
    reply.extend_from_slice(b"\r\nOK\r\n");
    reply
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responder_answers_writes() {
        let (mut link, device) = memory_link();
        device.set_responder(echo_ok);
        link.write_all(b"AT\r").unwrap();
        assert_eq!(link.bytes_available().unwrap(), 9);
        assert_eq!(link.read_available().unwrap(), b"AT\r\r\nOK\r\n");
        assert_eq!(device.written_text(), vec!["AT\r".to_string()]);
    }

    #[test]
    fn test_injected_failure_then_recovery() {
        let (mut link, device) = memory_link();
        device.push_str("\r\nRING\r\n");
        device.fail_reads(1);
        assert!(link.read_available().is_err());
        assert_eq!(link.read_available().unwrap(), b"\r\nRING\r\n");
    }

    #[test]
    fn test_injected_write_failure_is_not_answered() {
        let (mut link, device) = memory_link();
        device.set_responder(echo_ok);
        device.fail_writes(1);
        assert!(link.write_all(b"AT\r").is_err());
        assert_eq!(link.bytes_available().unwrap(), 0);
        assert!(device.written().is_empty());

        link.write_all(b"AT\r").unwrap();
        assert_eq!(device.written_text(), vec!["AT\r".to_string()]);
    }

    #[test]
    fn test_closed_link_rejects_writes() {
        let (mut link, device) = memory_link();
        link.close().unwrap();
        assert!(device.is_closed());
        assert!(link.write_all(b"AT\r").is_err());
    }
}
