//! Session gate: one logical transaction at a time.
//!
//! Every public session operation enters the gate for its whole duration.
//! The gate is re-entrant, so a helper that is itself built from `send` and
//! `receive` can call them while already holding it. Entering returns a
//! [`GateToken`]; dropping the token leaves the gate, whichever way the
//! holder exits. Tokens are tied to the thread that took them.

use std::sync::Arc;

use parking_lot::lock_api::ArcReentrantMutexGuard;
use parking_lot::{RawMutex, RawThreadId, ReentrantMutex};

/// Proof of holding the session gate. Leaves the gate when dropped.
pub struct GateToken {
    _guard: ArcReentrantMutexGuard<RawMutex, RawThreadId, ()>,
}

/// Re-entrant mutual exclusion around session transactions.
#[derive(Clone, Default)]
pub struct SessionGate {
    lock: Arc<ReentrantMutex<()>>,
}

impl SessionGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the gate, blocking while another thread holds it.
    pub fn enter(&self) -> GateToken {
        GateToken {
            _guard: self.lock.lock_arc(),
        }
    }

    /// Enter the gate only if nobody else holds it.
    pub fn try_enter(&self) -> Option<GateToken> {
        self.lock
            .try_lock_arc()
            .map(|guard| GateToken { _guard: guard })
    }
}

/// Exclusive access to the session for a multi-step raw exchange.
///
/// While a caller holds this, no other transaction and no liveness probe can
/// touch the link; the holder drives the exchange with
/// [`Session::send`](crate::Session::send) and
/// [`Session::receive`](crate::Session::receive). Release it with
/// [`Session::release_raw_access`](crate::Session::release_raw_access) or by
/// dropping it.
#[must_use = "raw access is released as soon as it is dropped"]
pub struct RawAccess {
    _token: GateToken,
}

impl RawAccess {
    pub(crate) fn new(token: GateToken) -> Self {
        RawAccess { _token: token }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reentrant_on_same_thread() {
        let gate = SessionGate::new();
        let outer = gate.enter();
        let inner = gate.try_enter();
        assert!(inner.is_some());
        drop(inner);
        drop(outer);

        let other = gate.clone();
        let entered = std::thread::spawn(move || other.try_enter().is_some())
            .join()
            .unwrap();
        assert!(entered);
    }

    #[test]
    fn test_other_thread_cannot_enter() {
        let gate = SessionGate::new();
        let token = gate.enter();

        let other = gate.clone();
        let entered = std::thread::spawn(move || other.try_enter().is_some())
            .join()
            .unwrap();
        assert!(!entered);

        drop(token);
        let other = gate.clone();
        let entered = std::thread::spawn(move || other.try_enter().is_some())
            .join()
            .unwrap();
        assert!(entered);
    }

    #[test]
    fn test_enter_blocks_until_released() {
        let gate = SessionGate::new();
        let token = gate.enter();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let other = gate.clone();
        let waiter = std::thread::spawn(move || {
            let _token = other.enter();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(token);
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_ok());
        waiter.join().unwrap();
    }
}
