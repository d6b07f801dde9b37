// src/keyer/straight.rs  —  Straight key: no state machine, no latches
//
// Key down enqueues a rising-slope forever tone that the queue retains
// until something supersedes it; key up enqueues the falling edge.
// Repeated identical notifications (switch bounce, polling) are
// swallowed before they reach the queue.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::gen::{Generator, QUANTUM_USEC};
use crate::keyer::KeyValue;
use crate::tone::{SlopeMode, Tone};

type KeyValueCallback = Box<dyn Fn(KeyValue) + Send + Sync>;

pub struct StraightKey {
    gen: Arc<Generator>,
    key_value: Mutex<KeyValue>,
    callback: Mutex<Option<KeyValueCallback>>,
}

impl StraightKey {
    pub fn new(gen: &Arc<Generator>) -> Self {
        Self {
            gen: Arc::clone(gen),
            key_value: Mutex::new(KeyValue::Open),
            callback: Mutex::new(None),
        }
    }

    /// Called with every key state change, before the corresponding
    /// tone is enqueued.
    pub fn register_key_callback(&self, callback: impl Fn(KeyValue) + Send + Sync + 'static) {
        *self.callback.lock().unwrap() = Some(Box::new(callback));
    }

    pub fn value(&self) -> KeyValue {
        *self.key_value.lock().unwrap()
    }

    /// Feed the key contact state.  Only actual transitions enqueue.
    pub fn notify_key_event(&self, closed: bool) -> Result<()> {
        let value = if closed { KeyValue::Closed } else { KeyValue::Open };
        let mut current = self.key_value.lock().unwrap();
        if *current == value {
            return Ok(());
        }
        *current = value;
        if let Some(cb) = self.callback.lock().unwrap().as_ref() {
            cb(value);
        }

        match value {
            KeyValue::Closed => self.gen.queue().enqueue(Tone::forever(
                self.gen.frequency(),
                QUANTUM_USEC,
                SlopeMode::Rising,
            )),
            KeyValue::Open => {
                let (_, slope_len) = self.gen.tone_slope();
                if slope_len == 0 {
                    // Rectangular keying: any tone ends the held one.
                    self.gen.queue().enqueue(Tone::silence(1))
                } else {
                    self.gen.queue().enqueue(Tone::new(
                        self.gen.frequency(),
                        slope_len,
                        SlopeMode::Falling,
                    ))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferSink;
    use crate::tone::Dequeued;

    fn key() -> (Arc<Generator>, StraightKey) {
        let gen = Generator::new(Box::new(BufferSink::new(8000)));
        let key = StraightKey::new(&gen);
        (gen, key)
    }

    #[test]
    fn key_down_enqueues_a_held_rising_tone() {
        let (gen, key) = key();
        key.notify_key_event(true).unwrap();
        assert_eq!(key.value(), KeyValue::Closed);
        match gen.queue().dequeue() {
            Dequeued::Tone(t) => {
                assert!(t.forever);
                assert_eq!(t.slope_mode, SlopeMode::Rising);
                assert_eq!(t.frequency, gen.frequency());
            }
            other => panic!("expected held tone, got {other:?}"),
        }
        // Still retained.
        assert_eq!(gen.queue().len(), 1);
    }

    #[test]
    fn key_up_supersedes_with_a_falling_edge() {
        let (gen, key) = key();
        key.notify_key_event(true).unwrap();
        key.notify_key_event(false).unwrap();
        // One last delivery of the held tone, then the falling edge.
        assert!(matches!(gen.queue().dequeue(), Dequeued::Tone(t) if t.forever));
        match gen.queue().dequeue() {
            Dequeued::Tone(t) => {
                assert!(!t.forever);
                assert_eq!(t.slope_mode, SlopeMode::Falling);
            }
            other => panic!("expected falling tone, got {other:?}"),
        }
        assert_eq!(gen.queue().dequeue(), Dequeued::JustEmptied);
    }

    #[test]
    fn repeated_notifications_do_not_enqueue() {
        let (gen, key) = key();
        key.notify_key_event(true).unwrap();
        key.notify_key_event(true).unwrap();
        key.notify_key_event(true).unwrap();
        assert_eq!(gen.queue().len(), 1);
        key.notify_key_event(false).unwrap();
        key.notify_key_event(false).unwrap();
        assert_eq!(gen.queue().len(), 2);
    }

    #[test]
    fn callback_sees_each_transition_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let (_gen, key) = key();
        let edges = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&edges);
        key.register_key_callback(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });
        key.notify_key_event(true).unwrap();
        key.notify_key_event(true).unwrap();
        key.notify_key_event(false).unwrap();
        assert_eq!(edges.load(Ordering::SeqCst), 2);
    }
}
