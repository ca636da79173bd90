//! The connection worker.
//!
//! One thread per open session owns the [`TransportLink`] and performs all of
//! its I/O. Each loop iteration handles exactly one wake cause:
//!
//! - **Shutdown**: drain signals and requests, clear the input queue, close
//!   the link and exit.
//! - **Outbound request**: clear stale inbound state, write the payload, then
//!   complete the request.
//! - **Inbound bytes**: read until the link goes quiet (waiting briefly for
//!   the rest of a notification that has started arriving), dispatch
//!   unsolicited notifications, queue the remainder for the caller.
//! - **Probe due**: run a liveness probe if no transaction holds the gate.
//!
//! Inbound bytes are detected by polling the link between the other wake
//! causes at the configured poll interval.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use gsmlink_at_protocol::{has_pending_partial, is_final_response, Command, InboundAccumulator};
use tracing::{debug, trace, warn};

use crate::config::{EngineConfig, PARTIAL_NOTIFICATION_RETRIES};
use crate::events::{LogLevel, ReceiveProgress};
use crate::liveness::LivenessMonitor;
use crate::session::SessionShared;
use crate::telemetry::metric_defs::{
    COMMANDS_SENT, INBOUND_BYTES, PROBES_RUN, PROBES_SKIPPED, READ_FAILURES,
};
use crate::transport::TransportLink;

/// A probe waits this many response timeouts for the phone's answer.
const PROBE_RESPONSE_FACTOR: u32 = 4;

/// One raw payload to write, plus its completion signal.
pub(crate) struct OutboundRequest {
    pub(crate) payload: Vec<u8>,
    pub(crate) done: Sender<()>,
}

/// Outcome of an inbound cycle, as seen by a waiting `receive()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InboundSignal {
    /// Response text was queued.
    DataReady,
    /// The cycle produced nothing.
    NoData,
}

enum Wake {
    Shutdown,
    Request(OutboundRequest),
    ProbeDue,
    Poll,
}

/// Handle kept by the session to stop its worker.
pub(crate) struct WorkerHandle {
    shutdown_tx: Sender<()>,
    finished_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Ask the worker to stop without waiting for it.
    pub(crate) fn signal_stop(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    /// Ask the worker to stop and wait up to `timeout` for it to finish.
    /// Returns false if it did not finish in time; the thread is then
    /// detached.
    pub(crate) fn stop(self, timeout: Duration) -> bool {
        self.signal_stop();
        match self.finished_rx.recv_timeout(timeout) {
            Ok(()) => {
                if self.thread.join().is_err() {
                    warn!("Connection worker panicked during shutdown");
                }
                true
            }
            Err(_) => false,
        }
    }
}

/// Spawn the worker thread for one session.
pub(crate) fn spawn_worker(
    link: Box<dyn TransportLink>,
    config: EngineConfig,
    shared: Arc<SessionShared>,
    requests: Receiver<OutboundRequest>,
    inbound_tx: Sender<InboundSignal>,
    inbound_rx: Receiver<InboundSignal>,
) -> io::Result<WorkerHandle> {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    let (finished_tx, finished_rx) = crossbeam_channel::bounded(1);

    let worker = ConnectionWorker {
        liveness: LivenessMonitor::new(config.liveness_period(), Arc::clone(&shared.liveness)),
        link,
        config,
        shared,
        requests,
        shutdown: shutdown_rx,
        inbound_tx,
        inbound_rx,
        finished: finished_tx,
        link_error_reported: false,
    };

    let thread = thread::Builder::new()
        .name("gsmlink-worker".to_string())
        .spawn(move || worker.run())?;

    Ok(WorkerHandle {
        shutdown_tx,
        finished_rx,
        thread,
    })
}

struct ConnectionWorker {
    link: Box<dyn TransportLink>,
    config: EngineConfig,
    shared: Arc<SessionShared>,
    liveness: LivenessMonitor,
    requests: Receiver<OutboundRequest>,
    shutdown: Receiver<()>,
    inbound_tx: Sender<InboundSignal>,
    /// Used only to discard signals nobody consumed.
    inbound_rx: Receiver<InboundSignal>,
    finished: Sender<()>,
    link_error_reported: bool,
}

impl ConnectionWorker {
    fn run(mut self) {
        debug!(port = %self.config.port, "Connection worker started");
        loop {
            match self.next_wake() {
                Wake::Shutdown => break,
                Wake::Request(request) => self.handle_request(request),
                Wake::ProbeDue => self.handle_probe(),
                Wake::Poll => self.poll_inbound(),
            }
        }
        self.shutdown();
    }

    fn next_wake(&self) -> Wake {
        select! {
            recv(self.shutdown) -> _ => Wake::Shutdown,
            recv(self.requests) -> msg => match msg {
                Ok(request) => Wake::Request(request),
                Err(_) => Wake::Shutdown,
            },
            recv(self.liveness.timer()) -> _ => Wake::ProbeDue,
            default(self.config.poll_interval()) => Wake::Poll,
        }
    }

    fn handle_request(&mut self, request: OutboundRequest) {
        self.shared.input_queue.lock().clear();
        while self.inbound_rx.try_recv().is_ok() {}

        self.shared.events.log(
            LogLevel::Trace,
            format!("TX: {}", String::from_utf8_lossy(&request.payload).escape_debug()),
        );
        match self.link.write_all(&request.payload) {
            Ok(()) => COMMANDS_SENT.increment(1),
            // The missing response surfaces on the caller's receive.
            Err(e) => self
                .shared
                .events
                .log(LogLevel::Warn, format!("Write failed: {}", e)),
        }
        let _ = request.done.send(());
    }

    fn poll_inbound(&mut self) {
        match self.link.bytes_available() {
            Ok(0) => self.link_error_reported = false,
            Ok(_) => {
                self.link_error_reported = false;
                self.handle_inbound();
            }
            Err(e) => {
                if !self.link_error_reported {
                    self.shared
                        .events
                        .log(LogLevel::Warn, format!("Link unavailable: {}", e));
                    self.link_error_reported = true;
                }
            }
        }
    }

    fn handle_inbound(&mut self) {
        let mut buffer = InboundAccumulator::new();
        let mut retries = 0;

        loop {
            match self.link.read_available() {
                Ok(chunk) if !chunk.is_empty() => {
                    buffer.push(&chunk);
                    self.shared
                        .events
                        .receive_progress(ReceiveProgress::Progress(buffer.len()));
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    READ_FAILURES.increment(1);
                    self.shared.events.log(
                        LogLevel::Warn,
                        format!("Read failed, discarding {} buffered bytes: {}", buffer.len(), e),
                    );
                    self.signal(InboundSignal::NoData);
                    return;
                }
            }

            if retries < PARTIAL_NOTIFICATION_RETRIES && has_pending_partial(&buffer.as_text()) {
                retries += 1;
                debug!(retries, "Waiting for the rest of an unsolicited notification");
                thread::sleep(self.config.response_timeout());
                continue;
            }
            break;
        }

        let total = buffer.len();
        if total == 0 {
            self.signal(InboundSignal::NoData);
            return;
        }
        INBOUND_BYTES.increment(total as u64);

        let mut text = buffer.take_text();
        self.shared
            .events
            .log(LogLevel::Trace, format!("RX: {}", text.escape_debug()));
        self.shared.dispatch_unsolicited(&mut text);
        self.shared
            .events
            .receive_progress(ReceiveProgress::Complete(total));

        // A cycle made only of notifications says nothing about the
        // transaction in progress, so it raises no signal.
        if !text.is_empty() {
            self.shared.input_queue.lock().push_back(text);
            self.signal(InboundSignal::DataReady);
        }
    }

    fn handle_probe(&mut self) {
        match self.shared.gate.try_enter() {
            Some(token) => {
                let responsive = self.run_probe();
                drop(token);
                PROBES_RUN.increment(1);
                trace!(responsive, "Liveness probe finished");
                if let Some(transition) = self.liveness.record_probe(responsive) {
                    self.shared.apply_transition(transition);
                }
            }
            None => {
                PROBES_SKIPPED.increment(1);
                self.liveness.record_skip();
                debug!("Session busy, skipping liveness probe");
            }
        }
        self.liveness.rearm();
    }

    /// Write `AT` straight to the link and wait for any final response.
    fn run_probe(&mut self) -> bool {
        if let Err(e) = self.link.write_all(&Command::Attention.encode()) {
            debug!(error = %e, "Probe write failed");
            return false;
        }

        let deadline = Instant::now() + self.config.response_timeout() * PROBE_RESPONSE_FACTOR;
        let mut buffer = InboundAccumulator::new();
        loop {
            match self.link.read_available() {
                Ok(chunk) => buffer.push(&chunk),
                Err(e) => {
                    READ_FAILURES.increment(1);
                    debug!(error = %e, "Probe read failed");
                    return false;
                }
            }
            if is_final_response(&buffer.as_text()) || Instant::now() >= deadline {
                break;
            }
            thread::sleep(self.config.poll_interval());
        }

        let mut text = buffer.take_text();
        self.shared.dispatch_unsolicited(&mut text);
        is_final_response(&text)
    }

    fn signal(&self, signal: InboundSignal) {
        let _ = self.inbound_tx.send(signal);
    }

    fn shutdown(&mut self) {
        while self.inbound_rx.try_recv().is_ok() {}
        // Dropping a pending request fails its caller with NotOpen.
        while self.requests.try_recv().is_ok() {}
        self.shared.input_queue.lock().clear();

        if let Err(e) = self.link.close() {
            warn!(error = %e, "Failed to close link");
        }
        debug!(port = %self.config.port, "Connection worker stopped");
        let _ = self.finished.send(());
    }
}
