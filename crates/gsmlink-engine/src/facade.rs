//! Blocking call surface.
//!
//! Every operation here enters the session gate for its whole duration, so
//! transactions from different threads never interleave. A transaction is a
//! [`send`](Session::send) followed by one or more
//! [`receive`](Session::receive) calls; the `exec_*` helpers compose the two
//! and classify the accumulated response.

use std::sync::OnceLock;
use std::time::Instant;

use gsmlink_at_protocol::{
    encode_command, is_final_response, strip_echo, trim_line_breaks, AtError, Response,
};
use regex::Regex;
use tracing::debug;

use crate::config::MAX_EMPTY_READS;
use crate::error::{EngineError, EngineResult};
use crate::events::{EventHub, LogLevel};
use crate::gate::RawAccess;
use crate::session::{LinkState, Session};
use crate::worker::{InboundSignal, OutboundRequest};

static VERSION_LOGGED: OnceLock<()> = OnceLock::new();

/// Log the library name and version, once per process. Returns whether this
/// call was the one that logged it.
pub(crate) fn log_version_once(events: &EventHub) -> bool {
    let mut logged = false;
    VERSION_LOGGED.get_or_init(|| {
        events.log(
            LogLevel::Info,
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        );
        logged = true;
    });
    logged
}

impl Session {
    /// Write `payload` to the link exactly as given (no terminator is
    /// appended). Blocks until the worker has written it.
    pub fn send(&self, payload: &str) -> EngineResult<()> {
        self.send_bytes(payload.as_bytes())
    }

    fn send_bytes(&self, payload: &[u8]) -> EngineResult<()> {
        let _token = self.shared.gate.enter();
        self.ensure_open()?;

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        self.request_tx
            .send(OutboundRequest {
                payload: payload.to_vec(),
                done: done_tx,
            })
            .map_err(|_| EngineError::NotOpen)?;
        done_rx.recv().map_err(|_| EngineError::NotOpen)
    }

    /// Wait for inbound response text.
    ///
    /// Returns everything queued since the last `send` once the worker
    /// reports data, or `None` if it reports that nothing arrived or the
    /// receive timeout elapses.
    pub fn receive(&self) -> EngineResult<Option<String>> {
        let _token = self.shared.gate.enter();
        self.ensure_open()?;

        let deadline = Instant::now() + self.config.receive_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.inbound_rx.recv_timeout(remaining) {
                Ok(InboundSignal::DataReady) => {
                    let text: String = self.shared.input_queue.lock().drain(..).collect();
                    if !text.is_empty() {
                        return Ok(Some(text));
                    }
                }
                Ok(InboundSignal::NoData) => return Ok(None),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(None),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    return Err(EngineError::NotOpen)
                }
            }
        }
    }

    /// Send `cmd`, receive once and classify what came back.
    pub fn exec_and_receive_once(&self, cmd: &str) -> EngineResult<String> {
        let _token = self.shared.gate.enter();
        self.send_bytes(&encode_command(cmd))?;

        let mut text = self.receive()?.unwrap_or_default();
        self.shared.dispatch_unsolicited(&mut text);
        self.classify(&text, cmd)
    }

    /// Send `cmd` and receive until a final response arrives.
    pub fn exec_and_receive_until_terminator(&self, cmd: &str) -> EngineResult<String> {
        let _token = self.shared.gate.enter();
        self.send_bytes(&encode_command(cmd))?;
        self.receive_until(cmd, None)
    }

    /// Send `cmd` and receive until a final response arrives or the
    /// accumulated text matches `pattern`.
    ///
    /// On a pattern match the text is returned with the echo stripped but
    /// otherwise unclassified, which suits commands that answer with a
    /// prompt for a data block.
    pub fn exec_and_receive_until_pattern(
        &self,
        cmd: &str,
        pattern: &Regex,
    ) -> EngineResult<String> {
        let _token = self.shared.gate.enter();
        self.send_bytes(&encode_command(cmd))?;
        self.receive_until(cmd, Some(pattern))
    }

    /// Receive until a final response arrives, without sending anything
    /// first. `echo` is the text the phone is expected to echo back.
    pub fn receive_until_terminator(&self, echo: &str) -> EngineResult<String> {
        let _token = self.shared.gate.enter();
        self.receive_until(echo, None)
    }

    /// Take the session for a multi-step exchange.
    ///
    /// Blocks until any transaction in progress finishes. Until the returned
    /// access is released, no other thread's transaction and no liveness
    /// probe touches the link. The holder may use every other operation on
    /// this session from the same thread.
    pub fn acquire_raw_access(&self) -> EngineResult<RawAccess> {
        let token = self.shared.gate.enter();
        self.ensure_open()?;
        Ok(RawAccess::new(token))
    }

    /// Give the session back.
    pub fn release_raw_access(&self, access: RawAccess) {
        drop(access);
    }

    fn receive_until(&self, echo: &str, pattern: Option<&Regex>) -> EngineResult<String> {
        let started = Instant::now();
        let mut empty_reads = 0;
        let mut text = String::new();

        loop {
            match self.receive()? {
                Some(chunk) => {
                    text.push_str(&chunk);
                    empty_reads = 0;
                }
                None => empty_reads += 1,
            }

            if is_final_response(&text) {
                break;
            }
            if pattern.is_some_and(|p| p.is_match(&text)) {
                self.shared.dispatch_unsolicited(&mut text);
                return Ok(trim_line_breaks(strip_echo(&text, echo)).to_string());
            }
            let timed_out = started.elapsed() >= self.config.command_timeout();
            if empty_reads >= MAX_EMPTY_READS || timed_out {
                debug!(
                    command = echo,
                    empty_reads,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "No final response"
                );
                return Err(self.timeout_error());
            }
        }

        self.shared.dispatch_unsolicited(&mut text);
        self.classify(&text, echo)
    }

    fn classify(&self, text: &str, echo: &str) -> EngineResult<String> {
        match Response::parse_echoed(text, echo).into_result() {
            Ok(payload) => Ok(payload),
            Err(AtError::Timeout) => Err(self.timeout_error()),
            Err(e) => {
                self.shared
                    .events
                    .log(LogLevel::Debug, format!("{} failed: {}", echo.escape_debug(), e));
                Err(e.into())
            }
        }
    }

    fn timeout_error(&self) -> EngineError {
        if self.shared.state() == LinkState::OpenDisconnected {
            EngineError::NotConnected
        } else {
            EngineError::Protocol(AtError::Timeout)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_logged_once() {
        let hub = EventHub::new(8);
        log_version_once(&hub);
        assert!(!log_version_once(&hub));
    }
}
