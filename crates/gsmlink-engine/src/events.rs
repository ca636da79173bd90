//! Events published by the engine.
//!
//! Each event kind gets its own bounded channel. The worker publishes with
//! `try_send` and never blocks on a subscriber. When a channel is full the
//! oldest undrained event is evicted to make room, so a channel always holds
//! the most recent `capacity` events. The hub keeps a receiver for every
//! channel, so events published before anyone subscribes are retained the
//! same way. Receivers are multi-consumer: two subscribers on the same kind
//! share the stream rather than each seeing every event.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use gsmlink_at_protocol::UnsolicitedNotification;
use tracing::{debug, error, info, trace, warn};

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Something failed.
    Error,
    /// Something failed but was recovered from.
    Warn,
    /// Lifecycle information.
    Info,
    /// Per-cycle decisions.
    Debug,
    /// Wire traffic.
    Trace,
}

/// One line for the diagnostics sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// When the line was produced.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// The message.
    pub text: String,
}

/// Change in the phone's reachability, as observed by the liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
    /// A phone started answering.
    Connected,
    /// The phone stopped answering.
    Disconnected,
}

/// Inbound transfer progress for one read cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveProgress {
    /// Bytes read so far in the current cycle.
    Progress(usize),
    /// The cycle finished having read this many bytes.
    Complete(usize),
}

/// Subscriber side of the event channels.
#[derive(Debug, Clone)]
pub struct EventReceivers {
    /// Diagnostics log lines.
    pub log_lines: Receiver<LogRecord>,
    /// Incoming message and status report notifications.
    pub messages: Receiver<UnsolicitedNotification>,
    /// Phone connected / disconnected.
    pub connection: Receiver<ConnectionTransition>,
    /// Receive progress and completion.
    pub progress: Receiver<ReceiveProgress>,
}

/// Publisher side of the event channels.
#[derive(Debug, Clone)]
pub struct EventHub {
    log_tx: Sender<LogRecord>,
    message_tx: Sender<UnsolicitedNotification>,
    connection_tx: Sender<ConnectionTransition>,
    progress_tx: Sender<ReceiveProgress>,
    receivers: EventReceivers,
}

impl EventHub {
    /// Create the channels, each holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (log_tx, log_lines) = crossbeam_channel::bounded(capacity);
        let (message_tx, messages) = crossbeam_channel::bounded(capacity);
        let (connection_tx, connection) = crossbeam_channel::bounded(capacity);
        let (progress_tx, progress) = crossbeam_channel::bounded(capacity);
        EventHub {
            log_tx,
            message_tx,
            connection_tx,
            progress_tx,
            receivers: EventReceivers {
                log_lines,
                messages,
                connection,
                progress,
            },
        }
    }

    /// Receivers for all event kinds, sharing the hub's channels.
    pub fn subscribe(&self) -> EventReceivers {
        self.receivers.clone()
    }

    /// Emit a tracing event and publish it to the diagnostics sink.
    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            LogLevel::Error => error!("{}", text),
            LogLevel::Warn => warn!("{}", text),
            LogLevel::Info => info!("{}", text),
            LogLevel::Debug => debug!("{}", text),
            LogLevel::Trace => trace!("{}", text),
        }
        let record = LogRecord {
            timestamp: Utc::now(),
            level,
            text,
        };
        publish(&self.log_tx, &self.receivers.log_lines, record, "log line");
    }

    /// Publish a message notification.
    pub fn message_received(&self, notification: UnsolicitedNotification) {
        publish(
            &self.message_tx,
            &self.receivers.messages,
            notification,
            "message notification",
        );
    }

    /// Publish a connection transition.
    pub fn connection_changed(&self, transition: ConnectionTransition) {
        publish(
            &self.connection_tx,
            &self.receivers.connection,
            transition,
            "connection transition",
        );
    }

    /// Publish receive progress.
    pub fn receive_progress(&self, progress: ReceiveProgress) {
        publish(&self.progress_tx, &self.receivers.progress, progress, "receive progress");
    }
}

/// Send without blocking, evicting the oldest event when the channel is full.
fn publish<T>(tx: &Sender<T>, rx: &Receiver<T>, mut event: T, what: &str) {
    // Another publisher may take the freed slot before the resend.
    for _ in 0..2 {
        match tx.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(rejected)) => {
                trace!("Event channel full, evicting oldest {}", what);
                let _ = rx.try_recv();
                event = rejected;
            }
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
    trace!("Event channel still full, dropping {}", what);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_reaches_sink() {
        let hub = EventHub::new(4);
        let events = hub.subscribe();
        hub.log(LogLevel::Info, "opened");
        let record = events.log_lines.try_recv().unwrap();
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.text, "opened");
    }

    #[test]
    fn test_full_channel_evicts_oldest_without_blocking() {
        let hub = EventHub::new(2);
        let events = hub.subscribe();
        for i in 0..10 {
            hub.receive_progress(ReceiveProgress::Progress(i));
        }
        assert_eq!(events.progress.len(), 2);
        assert_eq!(events.progress.try_recv().unwrap(), ReceiveProgress::Progress(8));
        assert_eq!(events.progress.try_recv().unwrap(), ReceiveProgress::Progress(9));
    }

    #[test]
    fn test_late_subscriber_sees_latest_connection_state() {
        let hub = EventHub::new(1);
        hub.connection_changed(ConnectionTransition::Connected);
        hub.connection_changed(ConnectionTransition::Disconnected);

        let events = hub.subscribe();
        assert_eq!(events.connection.try_recv().unwrap(), ConnectionTransition::Disconnected);
        assert!(events.connection.try_recv().is_err());
    }

    #[test]
    fn test_undrained_messages_keep_newest() {
        let hub = EventHub::new(2);
        let events = hub.subscribe();
        for index in 1..=3 {
            let mut text = format!("\r\n+CMTI: \"SM\",{}\r\n", index);
            for notification in gsmlink_at_protocol::dispatch_unsolicited(&mut text) {
                hub.message_received(notification);
            }
        }
        let kept: Vec<String> = events.messages.try_iter().map(|n| n.description).collect();
        assert_eq!(
            kept,
            vec![
                "new message stored at SM index 2",
                "new message stored at SM index 3"
            ]
        );
    }

    #[test]
    fn test_connection_events_in_order() {
        let hub = EventHub::new(4);
        let events = hub.subscribe();
        hub.connection_changed(ConnectionTransition::Connected);
        hub.connection_changed(ConnectionTransition::Disconnected);
        assert_eq!(events.connection.try_recv().unwrap(), ConnectionTransition::Connected);
        assert_eq!(events.connection.try_recv().unwrap(), ConnectionTransition::Disconnected);
    }
}
