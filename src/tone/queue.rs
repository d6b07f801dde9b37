// src/tone/queue.rs  —  Bounded circular queue of tone requests
//
// One producer-facing mutex guards head/tail/len/state; the consumer
// (generator thread) is woken through `consumer_wake` only on the
// Idle→Busy edge, and every dequeue pulses `tone_flow` so that callers
// blocked in wait_for_tone / wait_for_drain / wait_for_level make
// progress.  Callbacks and notifications always fire after the mutex
// has been released.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::WaitPoint;
use crate::tone::Tone;

/// Hard upper bound on queue capacity.
pub const CAPACITY_MAX: usize = 3000;
/// Default capacity.
const CAPACITY_DEFAULT: usize = 3000;
/// Default high water mark — enqueue helpers report a backlog above this.
const HIGH_WATER_DEFAULT: usize = 2900;

/// Highest tone frequency a queue accepts, in Hz.
pub const FREQUENCY_MAX: u32 = 4000;

/// Result of one dequeue attempt.  Three-valued on purpose: the consumer
/// must write one more silence buffer on `JustEmptied` but must not spin
/// on `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dequeued {
    /// A tone to synthesize.
    Tone(Tone),
    /// The queue ran dry on this very call — reported exactly once per
    /// drain.
    JustEmptied,
    /// Nothing to do, and nothing has been to do since the last drain.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Busy,
}

type LowWaterCallback = Arc<dyn Fn(usize) + Send + Sync>;

struct Inner {
    slots: Vec<Option<Tone>>,
    head: usize,
    tail: usize,
    len: usize,
    state: State,
    high_water_mark: usize,
    low_water_mark: usize,
    callback: Option<LowWaterCallback>,
    /// Thread id of the registered consumer, if one is running.
    consumer: Option<ThreadId>,
}

impl Inner {
    fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = self.tail;
        self.len = 0;
    }
}

pub struct ToneQueue {
    inner: Mutex<Inner>,
    /// Pulsed on the Idle→Busy enqueue edge only.
    consumer_wake: WaitPoint,
    /// Pulsed after every dequeue (including JustEmptied).
    tone_flow: WaitPoint,
}

impl ToneQueue {
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY_DEFAULT)
    }

    /// Capacity is clamped to `CAPACITY_MAX`; the high water mark keeps
    /// its default proportion below capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, CAPACITY_MAX);
        let high = HIGH_WATER_DEFAULT.min(capacity.saturating_sub(1)).max(1);
        Self {
            inner: Mutex::new(Inner {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
                len: 0,
                state: State::Idle,
                high_water_mark: high,
                low_water_mark: 0,
                callback: None,
                consumer: None,
            }),
            consumer_wake: WaitPoint::new(),
            tone_flow: WaitPoint::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the queue is backlogged past its high water mark.
    /// Producers of multi-tone sequences use this as backpressure and
    /// surface `QueueFull` as "try again shortly".
    pub fn is_backlogged(&self) -> bool {
        let inner = self.lock();
        inner.len >= inner.high_water_mark
    }

    /// Register the callback fired when a dequeue takes the length from
    /// strictly above `level` to at-or-below it.  Crossings only — the
    /// callback does not repeat while the queue stays below the mark.
    pub fn register_low_water_callback(
        &self,
        level: usize,
        callback: impl Fn(usize) + Send + Sync + 'static,
    ) -> Result<()> {
        let mut inner = self.lock();
        if level >= inner.slots.len() {
            return Err(Error::InvalidArgument);
        }
        inner.low_water_mark = level;
        inner.callback = Some(Arc::new(callback));
        Ok(())
    }

    /// Append a tone.  Zero-duration tones are accepted and dropped.
    /// Only the Idle→Busy edge wakes the consumer.
    pub fn enqueue(&self, tone: Tone) -> Result<()> {
        if tone.frequency > FREQUENCY_MAX {
            return Err(Error::InvalidArgument);
        }
        if tone.duration_usec == 0 && !tone.forever {
            return Ok(());
        }

        let was_idle;
        {
            let mut inner = self.lock();
            if inner.len == inner.slots.len() {
                return Err(Error::QueueFull);
            }
            let tail = inner.tail;
            inner.slots[tail] = Some(tone);
            inner.tail = (tail + 1) % inner.slots.len();
            inner.len += 1;
            was_idle = inner.state == State::Idle;
            if was_idle {
                inner.state = State::Busy;
            }
        }
        if was_idle {
            log::debug!("tone queue: idle -> busy, waking consumer");
            self.consumer_wake.notify();
        }
        Ok(())
    }

    /// Pop the head tone; see `Dequeued` for the three outcomes.
    ///
    /// A forever tone that is alone in the queue is re-delivered without
    /// being popped, so a held straight key never busy-waits on the
    /// enqueue side.  Enqueueing behind it ends its reign on the *next*
    /// dequeue.
    pub fn dequeue(&self) -> Dequeued {
        let result;
        let mut fire = None;
        {
            let mut inner = self.lock();
            match inner.state {
                State::Idle => return Dequeued::Idle,
                State::Busy => {
                    if inner.len == 0 {
                        inner.state = State::Idle;
                        result = Dequeued::JustEmptied;
                    } else {
                        let head = inner.head;
                        let tone = match inner.slots[head] {
                            Some(t) => t,
                            None => {
                                debug_assert!(false, "busy queue with empty head slot");
                                Tone::silence(0)
                            }
                        };
                        if tone.forever && inner.len == 1 {
                            // Retained: copy out, leave head/len alone.
                            result = Dequeued::Tone(tone);
                        } else {
                            let len_before = inner.len;
                            inner.slots[head] = None;
                            inner.head = (head + 1) % inner.slots.len();
                            inner.len -= 1;
                            if len_before > inner.low_water_mark
                                && inner.len <= inner.low_water_mark
                            {
                                fire = inner.callback.clone().map(|cb| (cb, inner.len));
                            }
                            result = Dequeued::Tone(tone);
                        }
                    }
                }
            }
            debug_assert!(inner.len != 0 || inner.head == inner.tail);
        }

        // Mutex released: the callback may re-enter the queue freely.
        if let Some((cb, level)) = fire {
            cb(level);
        }
        self.tone_flow.notify();
        result
    }

    /// Empty the queue, then block until the consumer acknowledges the
    /// drain — unless waiting is impossible, in which case the flush
    /// itself still happens and the wait is skipped.
    pub fn flush(&self) {
        {
            let mut inner = self.lock();
            inner.clear();
        }
        self.tone_flow.notify();
        if self.can_wait().is_ok() {
            let _ = self.wait_for_drain();
        }
    }

    /// Hard reset: empty the queue and force the Idle state without
    /// involving the consumer.  Used when tearing a generator down.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.clear();
        inner.state = State::Idle;
    }

    // ── Blocking waits ───────────────────────────────────────────────────

    /// Block until one tone has been dequeued.
    pub fn wait_for_tone(&self) -> Result<()> {
        self.can_wait()?;
        self.tone_flow.wait();
        Ok(())
    }

    /// Block until the queue is empty and the consumer has gone idle.
    pub fn wait_for_drain(&self) -> Result<()> {
        if self.drained() {
            return Ok(());
        }
        self.can_wait()?;
        self.tone_flow.wait_until(|| self.drained());
        Ok(())
    }

    /// Block until the queue length falls to `level` or below.
    pub fn wait_for_level(&self, level: usize) -> Result<()> {
        if self.lock().len <= level {
            return Ok(());
        }
        self.can_wait()?;
        self.tone_flow.wait_until(|| self.lock().len <= level);
        Ok(())
    }

    fn drained(&self) -> bool {
        let inner = self.lock();
        inner.len == 0 && inner.state == State::Idle
    }

    // ── Consumer registration ────────────────────────────────────────────

    /// Called by the generator before its thread runs, so that waits
    /// issued right after start() already see a consumer.
    pub(crate) fn register_consumer(&self, id: ThreadId) {
        self.lock().consumer = Some(id);
    }

    pub(crate) fn unregister_consumer(&self) {
        self.lock().consumer = None;
    }

    /// Park the consumer until the next Idle→Busy enqueue, or until the
    /// timeout expires (the generator re-checks its run flag on wake).
    pub(crate) fn wait_for_enqueue(&self, timeout: Duration) {
        self.consumer_wake.wait_timeout(timeout);
    }

    /// Wake a consumer parked in `wait_for_enqueue` regardless of queue
    /// state — used on shutdown.
    pub(crate) fn force_wake_consumer(&self) {
        self.consumer_wake.notify();
    }

    /// Fail fast instead of hanging: a wait can never be satisfied when
    /// issued from the consumer thread itself, or when no consumer is
    /// running at all.
    fn can_wait(&self) -> Result<()> {
        match self.lock().consumer {
            Some(id) if id == thread::current().id() => Err(Error::WouldDeadlock),
            Some(_) => Ok(()),
            None => Err(Error::WouldDeadlock),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }
}

impl Default for ToneQueue {
    fn default() -> Self {
        Self::new()
    }
}
