//! Single-threaded cooperative scheduler.
//!
//! Only one guest thread ever runs core-instrumented code at a time; all
//! others sit at a suspension point waiting for the run-lock. A proxy
//! exists per guest thread to receive and forward asynchronous signals
//! without having to interrupt the lock holder mid-instruction, so a
//! signal can be queued and the holder cancelled without the proxy
//! delivering the signal directly itself.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

use crate::thread::ThreadId;

/// Why a thread last gave up the run-lock, used to decide how
/// [`RunLock::acquire`] should report cancellation back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// Voluntarily yielded at a suspension point (syscall entry, a
    /// blocking client request).
    Yielded,
    /// An "internal interrupt" cancelled the acquisition attempt — the
    /// caller should unwind rather than proceed as if it held the lock.
    Cancelled,
}

struct LockState {
    holder: Option<ThreadId>,
    cancelled: std::collections::HashSet<ThreadId>,
}

/// The run-lock: exactly one [`ThreadId`] may hold it at a time.
pub struct RunLock {
    state: Mutex<LockState>,
    cond: Condvar,
}

impl RunLock {
    pub fn new() -> Self {
        RunLock { state: Mutex::new(LockState { holder: None, cancelled: Default::default() }), cond: Condvar::new() }
    }

    /// Block until `tid` holds the run-lock, or its acquisition is
    /// cancelled by [`RunLock::cancel`] from another thread — the
    /// "internal interrupt" mechanism used to unstick a waiter.
    pub fn acquire(&self, tid: ThreadId) -> Result<(), SuspendReason> {
        let mut state = self.state.lock();
        loop {
            if state.cancelled.remove(&tid) {
                return Err(SuspendReason::Cancelled);
            }
            if state.holder.is_none() {
                state.holder = Some(tid);
                return Ok(());
            }
            self.cond.wait(&mut state);
        }
    }

    /// Same as [`acquire`](Self::acquire) but gives up after `timeout`,
    /// used by suspension points that must periodically re-check other
    /// conditions (e.g. a pending signal) rather than block forever.
    pub fn acquire_timeout(&self, tid: ThreadId, timeout: Duration) -> Option<Result<(), SuspendReason>> {
        let mut state = self.state.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if state.cancelled.remove(&tid) {
                return Some(Err(SuspendReason::Cancelled));
            }
            if state.holder.is_none() {
                state.holder = Some(tid);
                return Some(Ok(()));
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let timed_out = self.cond.wait_for(&mut state, remaining).timed_out();
            if timed_out {
                return None;
            }
        }
    }

    /// Release the lock, waking one waiter. Panics if `tid` is not the
    /// current holder — releasing a lock you don't hold is a core bug,
    /// not a recoverable condition.
    pub fn release(&self, tid: ThreadId) {
        let mut state = self.state.lock();
        assert_eq!(state.holder, Some(tid), "release called by non-holder");
        state.holder = None;
        self.cond.notify_one();
    }

    /// Voluntarily give up the lock at a suspension point (syscall entry,
    /// a blocking client request) and re-acquire it afterward via a
    /// caller-supplied closure run while the lock is free.
    pub fn suspend_for<T>(&self, tid: ThreadId, during: impl FnOnce() -> T) -> Result<T, SuspendReason> {
        self.release(tid);
        let result = during();
        self.acquire(tid)?;
        Ok(result)
    }

    /// Mark `tid`'s next (or in-progress) [`acquire`](Self::acquire) call
    /// as cancelled — the "internal interrupt" mechanism used to unwind a
    /// thread out of a blocked wait (e.g. on shutdown or a fatal signal
    /// in another thread).
    pub fn cancel(&self, tid: ThreadId) {
        let mut state = self.state.lock();
        state.cancelled.insert(tid);
        self.cond.notify_all();
    }

    pub fn current_holder(&self) -> Option<ThreadId> {
        self.state.lock().holder
    }
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new()
    }
}
