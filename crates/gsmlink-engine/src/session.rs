//! Session lifecycle.
//!
//! A [`Session`] is created by [`Session::open`], which configures the link,
//! spawns the connection worker and starts liveness probing. [`Session::close`]
//! stops the worker and releases the link. The blocking call surface lives in
//! the facade module; the supplementary phone operations in the phone module.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use gsmlink_at_protocol::dispatch_unsolicited;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{ConnectionTransition, EventHub, EventReceivers, LogLevel};
use crate::facade::log_version_once;
use crate::gate::SessionGate;
use crate::liveness::{LivenessSnapshot, LivenessStats};
use crate::telemetry::metric_defs::UNSOLICITED_DISPATCHED;
use crate::transport::{LinkSettings, TcpLink, TransportLink};
use crate::worker::{spawn_worker, InboundSignal, OutboundRequest, WorkerHandle};

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not open; every operation fails with `NotOpen`.
    Closed,
    /// Open, but the last liveness probe found no responsive phone (or none
    /// has run yet).
    OpenDisconnected,
    /// Open and the last liveness probe got an answer.
    OpenConnected,
}

/// State shared between the caller-facing session and its worker.
pub(crate) struct SessionShared {
    pub(crate) gate: SessionGate,
    pub(crate) input_queue: Mutex<VecDeque<String>>,
    pub(crate) state: Mutex<LinkState>,
    pub(crate) events: EventHub,
    pub(crate) liveness: Arc<LivenessStats>,
}

impl SessionShared {
    fn new(event_capacity: usize) -> Self {
        SessionShared {
            gate: SessionGate::new(),
            input_queue: Mutex::new(VecDeque::new()),
            state: Mutex::new(LinkState::OpenDisconnected),
            events: EventHub::new(event_capacity),
            liveness: Arc::new(LivenessStats::default()),
        }
    }

    /// Strip every complete unsolicited notification out of `text` and
    /// publish each one.
    pub(crate) fn dispatch_unsolicited(&self, text: &mut String) {
        for notification in dispatch_unsolicited(text) {
            UNSOLICITED_DISPATCHED.increment(1);
            self.events
                .log(LogLevel::Info, format!("Unsolicited: {}", notification.description));
            self.events.message_received(notification);
        }
    }

    /// Record a reachability change observed by the liveness probe.
    pub(crate) fn apply_transition(&self, transition: ConnectionTransition) {
        {
            let mut state = self.state.lock();
            if *state == LinkState::Closed {
                return;
            }
            *state = match transition {
                ConnectionTransition::Connected => LinkState::OpenConnected,
                ConnectionTransition::Disconnected => LinkState::OpenDisconnected,
            };
        }
        let text = match transition {
            ConnectionTransition::Connected => "Phone connected",
            ConnectionTransition::Disconnected => "Phone disconnected",
        };
        self.events.log(LogLevel::Info, text);
        self.events.connection_changed(transition);
    }

    pub(crate) fn state(&self) -> LinkState {
        *self.state.lock()
    }
}

/// An open connection to a phone.
///
/// `Session` is `Sync`: any number of threads may share it, and their
/// transactions are serialized by the session gate.
pub struct Session {
    pub(crate) config: EngineConfig,
    pub(crate) shared: Arc<SessionShared>,
    pub(crate) request_tx: Sender<OutboundRequest>,
    pub(crate) inbound_rx: Receiver<InboundSignal>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl Session {
    /// Open a session over `link`.
    ///
    /// The config is validated first (see [`EngineConfig::validated`]). The
    /// link is configured with the baud rate and response timeout, then the
    /// connection worker starts; the first liveness probe runs immediately.
    pub fn open<L>(config: EngineConfig, mut link: L) -> EngineResult<Session>
    where
        L: TransportLink + 'static,
    {
        let config = config.validated()?;
        link.configure(&LinkSettings {
            baud_rate: config.baud_rate,
            read_timeout: config.response_timeout(),
        })?;

        let shared = Arc::new(SessionShared::new(config.event_capacity));
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (inbound_tx, inbound_rx) = crossbeam_channel::unbounded();

        let worker = spawn_worker(
            Box::new(link),
            config.clone(),
            Arc::clone(&shared),
            request_rx,
            inbound_tx,
            inbound_rx.clone(),
        )?;

        log_version_once(&shared.events);
        shared
            .events
            .log(LogLevel::Info, format!("Session opened on {}", config.port));

        Ok(Session {
            config,
            shared,
            request_tx,
            inbound_rx,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Open a session over a serial-over-TCP bridge at `config.port`.
    pub fn open_tcp(config: EngineConfig) -> EngineResult<Session> {
        let link = TcpLink::connect(&config.port)?;
        Self::open(config, link)
    }

    /// Stop the worker and release the link.
    ///
    /// Waits up to the configured shutdown timeout for the worker to finish;
    /// a worker that does not finish in time is detached. Closing a closed
    /// session does nothing.
    pub fn close(&self) -> EngineResult<()> {
        let Some(worker) = self.worker.lock().take() else {
            debug!("Close on a closed session ignored");
            return Ok(());
        };

        *self.shared.state.lock() = LinkState::Closed;
        if !worker.stop(self.config.shutdown_timeout()) {
            warn!(
                timeout_ms = self.config.shutdown_timeout_ms,
                "Connection worker did not stop in time, detaching it"
            );
        }
        self.shared
            .events
            .log(LogLevel::Info, format!("Session on {} closed", self.config.port));
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.shared.state()
    }

    /// Whether the session is open, regardless of phone reachability.
    pub fn is_open(&self) -> bool {
        self.state() != LinkState::Closed
    }

    /// Receivers for the session's event channels.
    ///
    /// Each channel keeps the newest `event_capacity` undrained events and
    /// evicts older ones.
    pub fn events(&self) -> EventReceivers {
        self.shared.events.subscribe()
    }

    /// Liveness probe counters.
    pub fn liveness_stats(&self) -> LivenessSnapshot {
        self.shared.liveness.snapshot()
    }

    /// The validated configuration this session runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn ensure_open(&self) -> EngineResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(EngineError::NotOpen)
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            *self.shared.state.lock() = LinkState::Closed;
            worker.signal_stop();
        }
    }
}
