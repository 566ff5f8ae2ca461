//! engine::gate
//!
//! The write gate: at most one mutation in flight per store.
//!
//! # Architecture
//!
//! Every mutation enters the gate before it validates, stages or commits
//! anything, and holds it until the commit is done and the push worker has
//! been notified. Waiting is bounded: a caller that cannot enter within the
//! configured timeout gets [`MemoryError::Busy`], which is retriable.
//!
//! Reads never enter the gate.
//!
//! # Example
//!
//! ```
//! use memvault::engine::gate::WriteGate;
//! use std::time::Duration;
//!
//! let gate = WriteGate::new(Duration::from_millis(10));
//! let held = gate.enter().unwrap();
//! assert!(gate.enter().is_err());
//! drop(held);
//! assert!(gate.enter().is_ok());
//! ```

use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::MemoryError;

/// Serializes mutations with a bounded wait.
#[derive(Debug)]
pub struct WriteGate {
    lock: Mutex<()>,
    timeout: Duration,
}

/// Proof that the holder is the only mutation in flight.
#[must_use = "the gate is released when the guard is dropped"]
#[derive(Debug)]
pub struct GateGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl WriteGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Enter the gate, waiting at most the configured timeout.
    pub fn enter(&self) -> Result<GateGuard<'_>, MemoryError> {
        match self.lock.try_lock_for(self.timeout) {
            Some(guard) => Ok(GateGuard { _guard: guard }),
            None => {
                debug!(timeout = ?self.timeout, "write gate busy");
                Err(MemoryError::Busy(self.timeout))
            }
        }
    }

    /// Wait without a bound until any in-flight mutation has finished.
    pub fn drain(&self) {
        drop(self.lock.lock());
    }

    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn second_entry_is_busy() {
        let gate = WriteGate::new(Duration::from_millis(20));
        let _held = gate.enter().unwrap();
        let started = Instant::now();
        let err = gate.enter().unwrap_err();
        assert!(matches!(err, MemoryError::Busy(_)));
        assert!(err.is_retriable());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn waiter_enters_once_released() {
        let gate = Arc::new(WriteGate::new(Duration::from_secs(5)));
        let held = gate.enter().unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.enter().map(|_| ()).is_ok())
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn drain_waits_for_holder() {
        let gate = Arc::new(WriteGate::new(Duration::from_secs(5)));
        let guard_gate = Arc::clone(&gate);
        let holder = thread::spawn(move || {
            let _held = guard_gate.enter().unwrap();
            thread::sleep(Duration::from_millis(100));
        });
        while !gate.is_held() {
            thread::yield_now();
        }
        let started = Instant::now();
        gate.drain();
        assert!(started.elapsed() >= Duration::from_millis(50));
        holder.join().unwrap();
        assert!(!gate.is_held());
    }
}
