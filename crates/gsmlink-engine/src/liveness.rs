//! Liveness probing state.
//!
//! The worker owns a [`LivenessMonitor`]: a restartable one-shot timer plus the
//! last observed reachability. The first probe is due as soon as the worker
//! starts; afterwards the timer is re-armed one period after each probe
//! attempt, whether the probe ran or was skipped because the session was busy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{after, Receiver};

use crate::events::ConnectionTransition;

/// Probe counters shared between the worker and the session.
#[derive(Debug, Default)]
pub(crate) struct LivenessStats {
    probes_run: AtomicU64,
    probes_skipped: AtomicU64,
}

impl LivenessStats {
    pub(crate) fn snapshot(&self) -> LivenessSnapshot {
        LivenessSnapshot {
            probes_run: self.probes_run.load(Ordering::Relaxed),
            probes_skipped: self.probes_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the probe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessSnapshot {
    /// Probes that actually talked to the link.
    pub probes_run: u64,
    /// Probes skipped because a transaction held the session.
    pub probes_skipped: u64,
}

pub(crate) struct LivenessMonitor {
    period: Duration,
    timer: Receiver<Instant>,
    connected: bool,
    stats: Arc<LivenessStats>,
}

impl LivenessMonitor {
    pub(crate) fn new(period: Duration, stats: Arc<LivenessStats>) -> Self {
        LivenessMonitor {
            period,
            timer: after(Duration::ZERO),
            connected: false,
            stats,
        }
    }

    /// Fires once when the next probe is due.
    pub(crate) fn timer(&self) -> &Receiver<Instant> {
        &self.timer
    }

    pub(crate) fn rearm(&mut self) {
        self.timer = after(self.period);
    }

    /// Record a probe outcome. Returns the transition if reachability changed.
    pub(crate) fn record_probe(&mut self, responsive: bool) -> Option<ConnectionTransition> {
        self.stats.probes_run.fetch_add(1, Ordering::Relaxed);
        if responsive == self.connected {
            return None;
        }
        self.connected = responsive;
        Some(if responsive {
            ConnectionTransition::Connected
        } else {
            ConnectionTransition::Disconnected
        })
    }

    pub(crate) fn record_skip(&mut self) {
        self.stats.probes_skipped.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(period_ms: u64) -> (LivenessMonitor, Arc<LivenessStats>) {
        let stats = Arc::new(LivenessStats::default());
        (
            LivenessMonitor::new(Duration::from_millis(period_ms), Arc::clone(&stats)),
            stats,
        )
    }

    #[test]
    fn test_first_probe_due_immediately() {
        let (monitor, _) = monitor(60_000);
        assert!(monitor.timer().recv_timeout(Duration::from_millis(50)).is_ok());
    }

    #[test]
    fn test_rearm_waits_for_period() {
        let (mut monitor, _) = monitor(200);
        monitor.timer().recv().unwrap();
        monitor.rearm();
        assert!(monitor.timer().recv_timeout(Duration::from_millis(50)).is_err());
        assert!(monitor.timer().recv_timeout(Duration::from_millis(500)).is_ok());
    }

    #[test]
    fn test_transitions_only_on_change() {
        let (mut monitor, stats) = monitor(1000);
        assert_eq!(monitor.record_probe(false), None);
        assert_eq!(monitor.record_probe(true), Some(ConnectionTransition::Connected));
        assert_eq!(monitor.record_probe(true), None);
        assert_eq!(monitor.record_probe(false), Some(ConnectionTransition::Disconnected));
        monitor.record_skip();
        assert_eq!(
            stats.snapshot(),
            LivenessSnapshot {
                probes_run: 4,
                probes_skipped: 1
            }
        );
    }
}
