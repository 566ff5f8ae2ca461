//! git::push
//!
//! Background push with bounded exponential backoff.
//!
//! # Architecture
//!
//! The commit path never waits on the network. After each commit the git
//! manager calls [`PushWorker::notify`], which marks the head as pending and
//! wakes a dedicated thread. The thread pushes HEAD, so any number of
//! pending commits collapse into one push and no commit is ever sent twice.
//!
//! On failure the worker sleeps [`RetryPolicy::delay_for_attempt`] and tries
//! again, up to `max_attempts` per cycle. When a cycle is exhausted the head
//! stays pending and a new cycle starts after `retry_cycle`, or sooner if a
//! new commit arrives. Local commits are never touched by a failed push.
//!
//! # Shutdown
//!
//! Every sleep is a channel wait, so shutdown interrupts it immediately. A
//! push in flight sees the cancel flag at its next poll and is abandoned.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::transport::{PushError, PushTransport};
use crate::core::config::PushConfig;
use crate::core::types::Version;

/// Backoff schedule for push attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per cycle.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Wait between exhausted cycles.
    pub retry_cycle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PushConfig::default())
    }
}

impl From<&PushConfig> for RetryPolicy {
    fn from(config: &PushConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1.0),
            retry_cycle: Duration::from_secs(config.retry_cycle_secs),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_retry_cycle(mut self, cycle: Duration) -> Self {
        self.retry_cycle = cycle;
        self
    }

    /// Delay after the failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let clamped = base.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(clamped as u64)
    }
}

/// Observable state of the push pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushStatus {
    /// A committed head has not reached the remote yet.
    pub pending: bool,
    pub pending_head: Option<Version>,
    pub last_pushed: Option<Version>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub total_pushes: u64,
}

impl PushStatus {
    /// Pushes are failing and work is waiting.
    pub fn is_degraded(&self) -> bool {
        self.pending && self.consecutive_failures > 0
    }
}

enum Signal {
    Pending,
    Shutdown,
}

enum Pause {
    Elapsed,
    Nudged,
    Shutdown,
}

struct Shared {
    status: Mutex<PushStatus>,
    changed: Condvar,
    cancel: AtomicBool,
    /// Serializes worker attempts with manual pushes.
    in_flight: Mutex<()>,
    transport: Arc<dyn PushTransport>,
    workdir: PathBuf,
    branch: String,
}

impl Shared {
    /// One push attempt of whatever HEAD is now.
    fn attempt(&self) -> Result<(), PushError> {
        let _flight = self.in_flight.lock();
        let target = self.status.lock().pending_head.clone();

        let result = self
            .transport
            .push(&self.workdir, &self.branch, &self.cancel);

        let mut status = self.status.lock();
        status.last_attempt_at = Some(Utc::now());
        match &result {
            Ok(()) => {
                status.consecutive_failures = 0;
                status.last_error = None;
                status.last_success_at = status.last_attempt_at;
                status.total_pushes += 1;
                if target.is_some() {
                    status.last_pushed = target.clone();
                }
                if status.pending_head == target {
                    status.pending = false;
                }
                info!(head = ?target, "pushed to remote");
            }
            Err(PushError::Cancelled) => {}
            Err(e) => {
                status.consecutive_failures += 1;
                status.last_error = Some(e.to_string());
                warn!(
                    failures = status.consecutive_failures,
                    error = %e,
                    "push failed; commits stay local"
                );
            }
        }
        drop(status);
        self.changed.notify_all();
        result
    }

    fn is_pending(&self) -> bool {
        self.status.lock().pending
    }
}

/// Owner of the background push thread.
pub struct PushWorker {
    shared: Arc<Shared>,
    sender: Mutex<Option<Sender<Signal>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for PushWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushWorker")
            .field("branch", &self.shared.branch)
            .field("status", &*self.shared.status.lock())
            .finish()
    }
}

impl PushWorker {
    /// Start the worker thread.
    pub fn spawn(
        transport: Arc<dyn PushTransport>,
        workdir: PathBuf,
        branch: String,
        policy: RetryPolicy,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            status: Mutex::new(PushStatus::default()),
            changed: Condvar::new(),
            cancel: AtomicBool::new(false),
            in_flight: Mutex::new(()),
            transport,
            workdir,
            branch,
        });
        let (tx, rx) = mpsc::channel();

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("memvault-push".into())
            .spawn(move || run(worker_shared, rx, policy))?;

        Ok(Self {
            shared,
            sender: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Mark `head` as pending and wake the worker.
    ///
    /// The status is updated before this returns, so a caller that commits
    /// and then reads [`PushWorker::status`] always sees the pending head.
    pub fn notify(&self, head: Version) {
        {
            let mut status = self.shared.status.lock();
            status.pending = true;
            status.pending_head = Some(head);
        }
        self.shared.changed.notify_all();
        if let Some(tx) = self.sender.lock().as_ref() {
            let _ = tx.send(Signal::Pending);
        }
    }

    /// Push synchronously on the calling thread.
    pub fn push_now(&self) -> Result<(), PushError> {
        self.shared.attempt()
    }

    pub fn status(&self) -> PushStatus {
        self.shared.status.lock().clone()
    }

    /// Block until nothing is pending or `timeout` passes. Returns whether
    /// the pipeline is idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while status.pending {
            if self
                .shared
                .changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                return !status.pending;
            }
        }
        true
    }

    /// Stop the worker, waiting up to `grace` for it to exit.
    ///
    /// Idempotent. A worker that does not exit in time is detached; its
    /// in-flight push has already been told to cancel.
    pub fn shutdown(&self, grace: Duration) {
        self.shared.cancel.store(true, Ordering::SeqCst);
        if let Some(tx) = self.sender.lock().take() {
            let _ = tx.send(Signal::Shutdown);
        }

        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            debug!("push worker stopped");
        } else {
            warn!("push worker did not stop in time; detaching");
        }
    }
}

impl Drop for PushWorker {
    fn drop(&mut self) {
        self.shutdown(Duration::from_secs(1));
    }
}

fn run(shared: Arc<Shared>, rx: Receiver<Signal>, policy: RetryPolicy) {
    loop {
        match rx.recv() {
            Ok(Signal::Pending) => {}
            Ok(Signal::Shutdown) | Err(_) => return,
        }
        if !push_until_clean(&shared, &rx, &policy) {
            return;
        }
    }
}

/// Push until nothing is pending. Returns `false` on shutdown.
fn push_until_clean(shared: &Shared, rx: &Receiver<Signal>, policy: &RetryPolicy) -> bool {
    while shared.is_pending() {
        let mut attempt = 0;
        let mut pushed = false;
        while attempt < policy.max_attempts {
            if shared.cancel.load(Ordering::SeqCst) {
                return false;
            }
            match shared.attempt() {
                Ok(()) => {
                    pushed = true;
                    break;
                }
                Err(PushError::Cancelled) => return false,
                Err(_) => {}
            }
            attempt += 1;
            if attempt < policy.max_attempts {
                if let Pause::Shutdown = pause(rx, policy.delay_for_attempt(attempt - 1), false) {
                    return false;
                }
            }
        }

        // A commit may have landed during the push; loop to send it.
        if pushed {
            continue;
        }

        warn!(
            attempts = policy.max_attempts,
            retry_in = ?policy.retry_cycle,
            "push attempts exhausted"
        );
        if let Pause::Shutdown = pause(rx, policy.retry_cycle, true) {
            return false;
        }
    }
    true
}

/// Wait for `duration` on the channel.
///
/// With `wake_on_pending`, a new commit ends the wait early.
fn pause(rx: &Receiver<Signal>, duration: Duration, wake_on_pending: bool) -> Pause {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Pause::Elapsed;
        }
        match rx.recv_timeout(remaining) {
            Ok(Signal::Pending) if wake_on_pending => return Pause::Nudged,
            Ok(Signal::Pending) => continue,
            Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => return Pause::Shutdown,
            Err(RecvTimeoutError::Timeout) => return Pause::Elapsed,
        }
    }
}
