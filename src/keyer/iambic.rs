// src/keyer/iambic.rs  —  Curtis A/B iambic keyer state machine
//
// The machine is re-entered from exactly two places: paddle events
// (any caller thread) and the generator's tone-complete hook (the
// consumer thread).  Paddle events take the state mutex blocking; the
// hook takes it with try_lock and surfaces contention as
// ReentrancyBlocked, retried once and otherwise logged and dropped.
//
// Latches are sticky: set on a paddle's press edge, cleared only inside
// the machine when the paddle is found released at an "after" state —
// never directly by paddle release.  That stickiness is what keeps a
// tapped paddle's element from being lost while the opposite mark is
// still sounding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::gen::Generator;
use crate::keyer::{ElementTimer, KeyValue};

type KeyValueCallback = Box<dyn Fn(KeyValue) + Send + Sync>;

/// The keying graph.  `_B` variants mark positions reached while a
/// Curtis mode B squeeze is being honored; they differ from `_A` only
/// in what the following "after" state decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    Idle,
    InDotA,
    InDashA,
    AfterDotA,
    AfterDashA,
    InDotB,
    InDashB,
    AfterDotB,
    AfterDashB,
}

struct KeyerInner {
    graph_state: GraphState,
    key_value: KeyValue,
    dot_paddle: bool,
    dash_paddle: bool,
    dot_latch: bool,
    dash_latch: bool,
    curtis_b_latch: bool,
}

/// Turns raw paddle contact state into a legal sequence of dots and
/// dashes enqueued on a [`Generator`]'s tone queue.  The generator
/// re-enters the machine after every completed tone; that re-entry is
/// the machine's only clock.
pub struct IambicKeyer {
    gen: Arc<Generator>,
    inner: Mutex<KeyerInner>,
    curtis_mode_b: AtomicBool,
    callback: Mutex<Option<KeyValueCallback>>,
    timer: Mutex<Option<Arc<ElementTimer>>>,
}

impl IambicKeyer {
    /// Create the keyer and wire it into the generator's tone-complete
    /// hook.  The generator keeps only a weak reference.
    pub fn new(gen: &Arc<Generator>) -> Arc<Self> {
        let keyer = Arc::new(Self {
            gen: Arc::clone(gen),
            inner: Mutex::new(KeyerInner {
                graph_state: GraphState::Idle,
                key_value: KeyValue::Open,
                dot_paddle: false,
                dash_paddle: false,
                dot_latch: false,
                dash_latch: false,
                curtis_b_latch: false,
            }),
            curtis_mode_b: AtomicBool::new(false),
            callback: Mutex::new(None),
            timer: Mutex::new(None),
        });

        let weak: Weak<IambicKeyer> = Arc::downgrade(&keyer);
        gen.set_tone_complete_hook(Some(Box::new(move |tone| {
            if let Some(keyer) = weak.upgrade() {
                keyer.on_tone_complete(tone.duration_usec);
            }
        })));
        keyer
    }

    /// Enable Curtis mode B: a squeeze released mid-element appends one
    /// extra alternate element.
    pub fn set_curtis_mode_b(&self, enabled: bool) {
        self.curtis_mode_b.store(enabled, Ordering::SeqCst);
    }

    pub fn curtis_mode_b(&self) -> bool {
        self.curtis_mode_b.load(Ordering::SeqCst)
    }

    /// Called with every key state change, before the corresponding
    /// tone is enqueued.  The callback must not call back into the
    /// keyer.
    pub fn register_key_callback(&self, callback: impl Fn(KeyValue) + Send + Sync + 'static) {
        *self.callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// Attach the externally owned mark/space timer.
    pub fn set_timer(&self, timer: Arc<ElementTimer>) {
        *self.timer.lock().unwrap() = Some(timer);
    }

    /// Feed the current contact state of both paddles.  Press edges set
    /// the sticky latches; if the machine was idle this also performs
    /// the initial kick that starts the first element.
    pub fn notify_paddle_event(&self, dot: bool, dash: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        let dot_edge = dot && !inner.dot_paddle;
        let dash_edge = dash && !inner.dash_paddle;
        inner.dot_paddle = dot;
        inner.dash_paddle = dash;
        if dot_edge {
            inner.dot_latch = true;
        }
        if dash_edge {
            inner.dash_latch = true;
        }
        if self.curtis_mode_b.load(Ordering::SeqCst) && dot && dash {
            inner.curtis_b_latch = true;
        }
        log::debug!(
            "paddles: dot={dot} dash={dash} latches=({},{}) state={:?}",
            inner.dot_latch,
            inner.dash_latch,
            inner.graph_state
        );

        if inner.graph_state == GraphState::Idle && (dot || dash) {
            // Initial kick: pretend we just finished the opposite
            // element, then run one transition step.
            let b = inner.curtis_b_latch;
            inner.graph_state = if dot {
                if b { GraphState::AfterDashB } else { GraphState::AfterDashA }
            } else if b {
                GraphState::AfterDotB
            } else {
                GraphState::AfterDotA
            };
            self.step(&mut inner)?;
        }
        Ok(())
    }

    /// Return all latches and paddles to rest and the machine to idle.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.graph_state = GraphState::Idle;
        inner.key_value = KeyValue::Open;
        inner.dot_paddle = false;
        inner.dash_paddle = false;
        inner.dot_latch = false;
        inner.dash_latch = false;
        inner.curtis_b_latch = false;
    }

    pub fn is_idle(&self) -> bool {
        self.inner.lock().unwrap().graph_state == GraphState::Idle
    }

    // ── Generator re-entry ───────────────────────────────────────────────

    /// One tone finished playing.  Advance the element timer and run
    /// one transition step; on contention retry once, then drop.
    pub(crate) fn on_tone_complete(&self, duration_usec: u32) {
        for attempt in 0..2 {
            match self.drive(duration_usec) {
                Ok(()) => return,
                Err(Error::ReentrancyBlocked) if attempt == 0 => {
                    thread::sleep(Duration::from_micros(500));
                }
                Err(e) => {
                    log::warn!("keyer step dropped: {e}");
                    return;
                }
            }
        }
    }

    fn drive(&self, duration_usec: u32) -> Result<()> {
        let mut inner = self
            .inner
            .try_lock()
            .map_err(|_| Error::ReentrancyBlocked)?;
        if inner.graph_state != GraphState::Idle {
            if let Some(timer) = self.timer.lock().unwrap().as_ref() {
                timer.advance(duration_usec);
            }
        }
        self.step(&mut inner)
    }

    // ── The transition step ──────────────────────────────────────────────

    fn step(&self, inner: &mut KeyerInner) -> Result<()> {
        use GraphState::*;
        match inner.graph_state {
            Idle => Ok(()),

            // A mark just finished: end it with the inter-mark space.
            InDotA | InDotB => {
                self.set_key(inner, KeyValue::Open);
                self.gen.enqueue_inter_mark_space()?;
                inner.graph_state = if inner.graph_state == InDotA { AfterDotA } else { AfterDotB };
                Ok(())
            }
            InDashA | InDashB => {
                self.set_key(inner, KeyValue::Open);
                self.gen.enqueue_inter_mark_space()?;
                inner.graph_state =
                    if inner.graph_state == InDashA { AfterDashA } else { AfterDashB };
                Ok(())
            }

            // The space after a dot finished: decide the next element.
            AfterDotA | AfterDotB => {
                if !inner.dot_paddle {
                    inner.dot_latch = false;
                }
                if inner.graph_state == AfterDotB {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dash()?;
                    inner.graph_state = InDashA;
                } else if inner.dash_latch {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dash()?;
                    inner.graph_state = if inner.curtis_b_latch {
                        inner.curtis_b_latch = false;
                        InDashB
                    } else {
                        InDashA
                    };
                } else if inner.dot_latch {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dot()?;
                    inner.graph_state = InDotA;
                } else {
                    inner.graph_state = Idle;
                }
                Ok(())
            }

            // Mirror image for the space after a dash.
            AfterDashA | AfterDashB => {
                if !inner.dash_paddle {
                    inner.dash_latch = false;
                }
                if inner.graph_state == AfterDashB {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dot()?;
                    inner.graph_state = InDotA;
                } else if inner.dot_latch {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dot()?;
                    inner.graph_state = if inner.curtis_b_latch {
                        inner.curtis_b_latch = false;
                        InDotB
                    } else {
                        InDotA
                    };
                } else if inner.dash_latch {
                    self.set_key(inner, KeyValue::Closed);
                    self.gen.enqueue_dash()?;
                    inner.graph_state = InDashA;
                } else {
                    inner.graph_state = Idle;
                }
                Ok(())
            }
        }
    }

    /// Record a key state change and tell the outside world — but only
    /// on a real change, not on the repeated notifications a retained
    /// forever tone produces.
    fn set_key(&self, inner: &mut KeyerInner, value: KeyValue) {
        if inner.key_value == value {
            return;
        }
        inner.key_value = value;
        if let Some(cb) = self.callback.lock().unwrap().as_ref() {
            cb(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use crate::tone::Dequeued;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Element {
        Dot,
        Dash,
        Space,
    }

    /// Generator left unstarted: the test pumps its queue by hand,
    /// playing the consumer-thread role deterministically.
    struct Harness {
        gen: Arc<Generator>,
        keyer: Arc<IambicKeyer>,
        dot_len: u32,
        dash_len: u32,
    }

    fn harness() -> Harness {
        let gen = Generator::new(Box::new(BufferSink::new(8000)));
        gen.set_speed(20).unwrap();
        let keyer = IambicKeyer::new(&gen);
        let t = gen.sync_parameters();
        Harness {
            gen,
            keyer,
            dot_len: t.dot_len,
            dash_len: t.dash_len,
        }
    }

    impl Harness {
        /// Dequeue one tone, classify it, and re-enter the keyer the
        /// way the generator thread would.
        fn pump(&self) -> Option<Element> {
            match self.gen.queue().dequeue() {
                Dequeued::Tone(t) => {
                    let el = if t.frequency == 0 {
                        Element::Space
                    } else if t.duration_usec == self.dot_len {
                        Element::Dot
                    } else {
                        assert_eq!(t.duration_usec, self.dash_len, "unexpected mark length");
                        Element::Dash
                    };
                    self.keyer.on_tone_complete(t.duration_usec);
                    Some(el)
                }
                Dequeued::JustEmptied | Dequeued::Idle => None,
            }
        }

        /// Pump until the queue drains, collecting marks only.
        fn marks_until_idle(&self, limit: usize) -> Vec<Element> {
            let mut out = Vec::new();
            for _ in 0..limit {
                match self.pump() {
                    Some(Element::Space) => {}
                    Some(mark) => out.push(mark),
                    None => return out,
                }
            }
            panic!("machine did not go idle within {limit} pumps: {out:?}");
        }
    }

    #[test]
    fn held_dot_paddle_streams_dots_mode_a() {
        let h = harness();
        h.keyer.notify_paddle_event(true, false).unwrap();
        let mut marks = Vec::new();
        for _ in 0..10 {
            if let Some(el) = h.pump() {
                if el != Element::Space {
                    marks.push(el);
                }
            }
        }
        assert!(marks.len() >= 4);
        assert!(marks.iter().all(|&m| m == Element::Dot), "{marks:?}");
        // Release: the machine winds down to idle with no dash.
        h.keyer.notify_paddle_event(false, false).unwrap();
        let tail = h.marks_until_idle(10);
        assert!(tail.iter().all(|&m| m == Element::Dot), "{tail:?}");
        assert!(h.keyer.is_idle());
    }

    #[test]
    fn held_dash_paddle_streams_dashes() {
        let h = harness();
        h.keyer.notify_paddle_event(false, true).unwrap();
        let mut marks = Vec::new();
        for _ in 0..10 {
            if let Some(el) = h.pump() {
                if el != Element::Space {
                    marks.push(el);
                }
            }
        }
        assert!(marks.len() >= 4);
        assert!(marks.iter().all(|&m| m == Element::Dash), "{marks:?}");
    }

    #[test]
    fn squeeze_alternates_starting_with_dot() {
        let h = harness();
        h.keyer.notify_paddle_event(true, true).unwrap();
        let mut marks = Vec::new();
        for _ in 0..12 {
            if let Some(el) = h.pump() {
                if el != Element::Space {
                    marks.push(el);
                }
            }
        }
        assert!(marks.len() >= 5);
        for (i, &m) in marks.iter().enumerate() {
            let expect = if i % 2 == 0 { Element::Dot } else { Element::Dash };
            assert_eq!(m, expect, "position {i} in {marks:?}");
        }
    }

    #[test]
    fn mark_and_space_enqueues_interleave() {
        let h = harness();
        h.keyer.notify_paddle_event(true, false).unwrap();
        // Every mark is followed by exactly one inter-mark space.
        let mut last_was_mark = false;
        for _ in 0..8 {
            match h.pump() {
                Some(Element::Space) => {
                    assert!(last_was_mark, "space without preceding mark");
                    last_was_mark = false;
                }
                Some(_) => {
                    assert!(!last_was_mark, "two marks without a space");
                    last_was_mark = true;
                }
                None => break,
            }
        }
    }

    #[test]
    fn mode_a_squeeze_release_stops_after_current_pair() {
        let h = harness();
        h.keyer.notify_paddle_event(true, true).unwrap();
        // First mark (dot) is in flight; release both before it ends.
        h.keyer.notify_paddle_event(false, false).unwrap();
        let marks = h.marks_until_idle(12);
        // Mode A: the latched dash still plays, nothing more.
        assert_eq!(marks, vec![Element::Dot, Element::Dash]);
    }

    #[test]
    fn mode_b_squeeze_release_adds_one_alternate_element() {
        let h = harness();
        h.keyer.set_curtis_mode_b(true);
        h.keyer.notify_paddle_event(true, true).unwrap();
        h.keyer.notify_paddle_event(false, false).unwrap();
        let marks = h.marks_until_idle(12);
        // Same squeeze as the mode A test, one extra trailing element.
        assert_eq!(marks, vec![Element::Dot, Element::Dash, Element::Dot]);
    }

    #[test]
    fn mode_b_held_squeeze_still_alternates_cleanly() {
        let h = harness();
        h.keyer.set_curtis_mode_b(true);
        h.keyer.notify_paddle_event(true, true).unwrap();
        let mut marks = Vec::new();
        for _ in 0..12 {
            if let Some(el) = h.pump() {
                if el != Element::Space {
                    marks.push(el);
                }
            }
        }
        for (i, &m) in marks.iter().enumerate() {
            let expect = if i % 2 == 0 { Element::Dot } else { Element::Dash };
            assert_eq!(m, expect, "position {i} in {marks:?}");
        }
    }

    #[test]
    fn initial_kick_honors_the_pressed_paddle() {
        let h = harness();
        h.keyer.notify_paddle_event(false, true).unwrap();
        assert_eq!(h.pump(), Some(Element::Dash));

        let h = harness();
        h.keyer.notify_paddle_event(true, false).unwrap();
        assert_eq!(h.pump(), Some(Element::Dot));
    }

    #[test]
    fn key_callback_fires_on_changes_only() {
        let h = harness();
        let edges = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&edges);
        h.keyer.register_key_callback(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });
        h.keyer.notify_paddle_event(true, false).unwrap();
        // One dot: Closed at the kick, Open when the mark completes.
        h.keyer.notify_paddle_event(false, false).unwrap();
        let _ = h.marks_until_idle(10);
        let n = edges.load(Ordering::SeqCst);
        assert_eq!(n % 2, 0, "unbalanced key edges");
        assert!(n >= 2);
    }

    #[test]
    fn timer_accumulates_only_while_keying() {
        let h = harness();
        let timer = Arc::new(ElementTimer::new());
        h.keyer.set_timer(Arc::clone(&timer));
        assert_eq!(timer.elapsed_usec(), 0);

        h.keyer.notify_paddle_event(true, false).unwrap();
        h.keyer.notify_paddle_event(false, false).unwrap();
        let _ = h.marks_until_idle(10);
        // One dot plus its trailing space at 20 WPM.
        assert_eq!(timer.elapsed_usec(), u64::from(h.dot_len) + 60_000);

        // Idle machine: further tones do not advance the timer.
        let before = timer.elapsed_usec();
        h.keyer.on_tone_complete(99_000);
        assert_eq!(timer.elapsed_usec(), before);
    }

    #[test]
    fn reset_returns_everything_to_rest() {
        let h = harness();
        h.keyer.notify_paddle_event(true, true).unwrap();
        assert!(!h.keyer.is_idle());
        h.keyer.reset();
        assert!(h.keyer.is_idle());
        // The queue may still hold the first mark; drain it without the
        // machine producing more.
        let marks = h.marks_until_idle(4);
        assert!(marks.len() <= 1);
    }
}
