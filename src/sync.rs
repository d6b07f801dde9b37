// src/sync.rs  —  Condvar wake/wait primitive shared by queue and waiters
//
// The original design woke the consumer with a per-thread POSIX signal and
// parked callers in sigsuspend.  Here the same discipline is an explicit
// generation-counted condvar event: notify() bumps a counter and wakes
// everyone; waiters either wait for the next bump or wait for a predicate,
// re-checking on every bump.  The "wake only on the Idle→Busy edge" rule
// lives with the callers — this type never filters notifications.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub(crate) struct WaitPoint {
    seq:  Mutex<u64>,
    cond: Condvar,
}

impl WaitPoint {
    pub(crate) fn new() -> Self {
        Self { seq: Mutex::new(0), cond: Condvar::new() }
    }

    /// Wake every current waiter.
    pub(crate) fn notify(&self) {
        let mut seq = self.seq.lock().unwrap();
        *seq = seq.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Block until the next notify() after this call.
    pub(crate) fn wait(&self) {
        let mut seq = self.seq.lock().unwrap();
        let start = *seq;
        while *seq == start {
            seq = self.cond.wait(seq).unwrap();
        }
    }

    /// Block until the next notify(), or until `timeout` elapses.
    /// Returns false on timeout.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut seq = self.seq.lock().unwrap();
        let start = *seq;
        while *seq == start {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cond.wait_timeout(seq, deadline - now).unwrap();
            seq = guard;
        }
        true
    }

    /// Block until `pred` holds, re-checking after every notify().
    ///
    /// `pred` reads state guarded by some other lock (the tone queue's,
    /// typically).  Notifiers always update that state before calling
    /// notify(), so re-checking `pred` under this lock before sleeping
    /// closes the missed-wakeup window.
    pub(crate) fn wait_until<F: Fn() -> bool>(&self, pred: F) {
        loop {
            let mut seq = self.seq.lock().unwrap();
            if pred() {
                return;
            }
            let start = *seq;
            while *seq == start {
                seq = self.cond.wait(seq).unwrap();
            }
        }
    }
}
