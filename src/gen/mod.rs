// src/gen/mod.rs  —  Generator: the consumer thread behind the tone queue

pub mod slope;
pub mod synth;
pub mod timing;

pub use slope::SlopeShape;
pub use timing::{
    ElementTiming, FREQUENCY_MAX, FREQUENCY_MIN, GAP_MAX, GAP_MIN, SPEED_MAX, SPEED_MIN,
    VOLUME_MAX, VOLUME_MIN, WEIGHTING_MAX, WEIGHTING_MIN,
};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sink::AudioSink;
use crate::tone::{Dequeued, SlopeMode, Tone, ToneQueue};
use slope::SLOPE_LEN_INITIAL_USEC;
use synth::ToneSynthesizer;

/// Synthesis length of one forever-tone delivery.  Also bounds key-up
/// latency for a held straight key.
pub(crate) const QUANTUM_USEC: u32 = 10_000;

/// How long the consumer parks on an idle queue before re-checking its
/// run flag.
const IDLE_PARK: Duration = Duration::from_millis(100);

type ToneCompleteHook = Box<dyn Fn(&Tone) + Send + Sync>;

struct Params {
    send_speed: u32,
    frequency: u32,
    volume: u32,
    gap: u32,
    weighting: u32,
    /// False whenever speed/gap/weighting changed since the last
    /// recomputation of `timing`.
    in_sync: bool,
    timing: ElementTiming,
}

struct SlopeSpec {
    shape: SlopeShape,
    len_usec: u32,
}

/// Owns the tone queue and the background thread that turns dequeued
/// tones into PCM written to an [`AudioSink`].  All setters may be
/// called from any thread; the synthesis state (slope table, scratch
/// buffer, phase) never leaves the consumer thread.
pub struct Generator {
    queue: Arc<ToneQueue>,
    params: Mutex<Params>,
    slope_spec: Mutex<SlopeSpec>,
    /// Bumped on any change that requires a slope-table rebuild
    /// (shape, length, volume) — timing stays untouched.
    slope_generation: AtomicU64,
    running: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
    sink_slot: Mutex<Option<Box<dyn AudioSink>>>,
    hook: Mutex<Option<ToneCompleteHook>>,
}

impl Generator {
    pub fn new(sink: Box<dyn AudioSink>) -> Arc<Self> {
        let initial = ElementTiming::derive(
            timing::SPEED_INITIAL,
            timing::GAP_INITIAL,
            timing::WEIGHTING_INITIAL,
        );
        Arc::new(Self {
            queue: Arc::new(ToneQueue::new()),
            params: Mutex::new(Params {
                send_speed: timing::SPEED_INITIAL,
                frequency: timing::FREQUENCY_INITIAL,
                volume: timing::VOLUME_INITIAL,
                gap: timing::GAP_INITIAL,
                weighting: timing::WEIGHTING_INITIAL,
                in_sync: true,
                timing: initial,
            }),
            slope_spec: Mutex::new(SlopeSpec {
                shape: SlopeShape::RaisedCosine,
                len_usec: SLOPE_LEN_INITIAL_USEC,
            }),
            slope_generation: AtomicU64::new(0),
            running: AtomicBool::new(false),
            thread: Mutex::new(None),
            sink_slot: Mutex::new(Some(sink)),
            hook: Mutex::new(None),
        })
    }

    /// The queue this generator consumes.  Exposed for direct enqueue
    /// and for the blocking wait operations.
    pub fn queue(&self) -> &Arc<ToneQueue> {
        &self.queue
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Open the sink and start the consumer thread.  A generator starts
    /// at most once; a second call is `Busy`.
    pub fn start(self: &Arc<Self>, device: &str) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::Busy);
        }
        // The sink stays in its slot until the thread is known to have
        // spawned, so a failed start leaves it recoverable for a retry.
        {
            let mut slot = self.sink_slot.lock().unwrap();
            let sink = match slot.as_mut() {
                Some(s) => s,
                None => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(Error::Busy);
                }
            };
            if let Err(e) = sink.open(device) {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }

        let gen = Arc::clone(self);
        let spawned = thread::Builder::new().name("cw-generator".into()).spawn(move || {
            let sink = gen.sink_slot.lock().unwrap().take();
            if let Some(sink) = sink {
                gen.run(sink);
            }
        });
        match spawned {
            Ok(handle) => {
                self.queue.register_consumer(handle.thread().id());
                *self.thread.lock().unwrap() = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("generator thread spawn failed: {e}");
                if let Some(sink) = self.sink_slot.lock().unwrap().as_mut() {
                    sink.close();
                }
                self.running.store(false, Ordering::SeqCst);
                Err(Error::ThreadStartFailure)
            }
        }
    }

    /// Flush pending tones, play a short silence tail, stop and join
    /// the consumer thread.  A no-op when not running.
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.queue.reset();
        let _ = self.queue.enqueue(Tone::silence(QUANTUM_USEC));
        let _ = self.queue.wait_for_drain();

        self.running.store(false, Ordering::SeqCst);
        self.queue.force_wake_consumer();

        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                log::warn!("generator stop from its own thread; skipping join");
                return;
            }
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Parameters ───────────────────────────────────────────────────────

    pub fn set_speed(&self, wpm: u32) -> Result<()> {
        timing::check_speed(wpm)?;
        let mut p = self.params.lock().unwrap();
        if p.send_speed != wpm {
            p.send_speed = wpm;
            p.in_sync = false;
        }
        Ok(())
    }

    pub fn set_frequency(&self, hz: u32) -> Result<()> {
        timing::check_frequency(hz)?;
        self.params.lock().unwrap().frequency = hz;
        Ok(())
    }

    /// Volume changes rebuild the slope table but never the timing.
    pub fn set_volume(&self, percent: u32) -> Result<()> {
        timing::check_volume(percent)?;
        self.params.lock().unwrap().volume = percent;
        self.slope_generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn set_gap(&self, dots: u32) -> Result<()> {
        timing::check_gap(dots)?;
        let mut p = self.params.lock().unwrap();
        if p.gap != dots {
            p.gap = dots;
            p.in_sync = false;
        }
        Ok(())
    }

    pub fn set_weighting(&self, percent: u32) -> Result<()> {
        timing::check_weighting(percent)?;
        let mut p = self.params.lock().unwrap();
        if p.weighting != percent {
            p.weighting = percent;
            p.in_sync = false;
        }
        Ok(())
    }

    pub fn speed(&self) -> u32 {
        self.params.lock().unwrap().send_speed
    }

    pub fn frequency(&self) -> u32 {
        self.params.lock().unwrap().frequency
    }

    pub fn volume(&self) -> u32 {
        self.params.lock().unwrap().volume
    }

    pub fn gap(&self) -> u32 {
        self.params.lock().unwrap().gap
    }

    pub fn weighting(&self) -> u32 {
        self.params.lock().unwrap().weighting
    }

    /// Select the tone edge envelope.  A rectangular shape with a
    /// non-zero slope length is a conflict.
    pub fn set_tone_slope(&self, shape: SlopeShape, len_usec: u32) -> Result<()> {
        slope::SlopeTable::check_conflict(shape, len_usec)?;
        {
            let mut s = self.slope_spec.lock().unwrap();
            s.shape = shape;
            s.len_usec = len_usec;
        }
        self.slope_generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn tone_slope(&self) -> (SlopeShape, u32) {
        let s = self.slope_spec.lock().unwrap();
        (s.shape, s.len_usec)
    }

    /// Recompute derived element lengths if any of speed/gap/weighting
    /// changed, and return the current set.  Idempotent and safe to
    /// race: each caller writes a fully derived value.
    pub fn sync_parameters(&self) -> ElementTiming {
        let mut p = self.params.lock().unwrap();
        if !p.in_sync {
            p.timing = ElementTiming::derive(p.send_speed, p.gap, p.weighting);
            p.in_sync = true;
            log::debug!(
                "timing resynced: dot {} us, dash {} us",
                p.timing.dot_len,
                p.timing.dash_len
            );
        }
        p.timing
    }

    // ── Enqueue operations ───────────────────────────────────────────────

    /// Queue an arbitrary tone.
    pub fn enqueue_tone(&self, frequency: u32, duration_usec: u32, slope_mode: SlopeMode) -> Result<()> {
        timing::check_frequency(frequency)?;
        self.queue.enqueue(Tone::new(frequency, duration_usec, slope_mode))
    }

    /// Queue one dot mark at the current frequency and speed.
    pub fn enqueue_dot(&self) -> Result<()> {
        let t = self.sync_parameters();
        self.queue
            .enqueue(Tone::new(self.frequency(), t.dot_len, SlopeMode::Standard))
    }

    /// Queue one dash mark at the current frequency and speed.
    pub fn enqueue_dash(&self) -> Result<()> {
        let t = self.sync_parameters();
        self.queue
            .enqueue(Tone::new(self.frequency(), t.dash_len, SlopeMode::Standard))
    }

    /// Queue the silence that ends a mark.
    pub fn enqueue_inter_mark_space(&self) -> Result<()> {
        let t = self.sync_parameters();
        self.queue.enqueue(Tone::silence(t.eom_space_len))
    }

    /// Queue the silence that ends a character, including the
    /// Farnsworth extra gap.
    pub fn enqueue_eoc_space(&self) -> Result<()> {
        let t = self.sync_parameters();
        self.queue.enqueue(Tone::silence(t.eoc_space_len))?;
        self.queue.enqueue(Tone::silence(t.additional_space_len))
    }

    /// Queue the silence that ends a word, including the matching
    /// Farnsworth adjustment.
    pub fn enqueue_eow_space(&self) -> Result<()> {
        let t = self.sync_parameters();
        self.queue.enqueue(Tone::silence(t.eow_space_len))?;
        self.queue.enqueue(Tone::silence(t.adjustment_space_len))
    }

    // ── Blocking waits ───────────────────────────────────────────────────

    /// Block until one tone finishes.
    pub fn wait_for_tone(&self) -> Result<()> {
        self.queue.wait_for_tone()
    }

    /// Block until every queued tone has played out.
    pub fn wait_for_queue_drain(&self) -> Result<()> {
        self.queue.wait_for_drain()
    }

    /// Drop all pending tones, then wait for the consumer to go quiet.
    pub fn flush(&self) {
        self.queue.flush();
    }

    pub fn register_low_water_callback(
        &self,
        level: usize,
        callback: impl Fn(usize) + Send + Sync + 'static,
    ) -> Result<()> {
        self.queue.register_low_water_callback(level, callback)
    }

    // ── Keyer coupling ───────────────────────────────────────────────────

    /// Invoked by the consumer thread after every dequeue, including
    /// re-deliveries of a retained forever tone.  The keyer uses this
    /// as its only clock tick.
    pub(crate) fn set_tone_complete_hook(&self, hook: Option<ToneCompleteHook>) {
        *self.hook.lock().unwrap() = hook;
    }

    // ── Consumer thread ──────────────────────────────────────────────────

    fn run(self: Arc<Self>, mut sink: Box<dyn AudioSink>) {
        let rate = sink.sample_rate();
        let (mut synth, mut seen_generation) = {
            let s = self.slope_spec.lock().unwrap();
            let volume_abs = self.volume() as f32 / 100.0;
            (
                ToneSynthesizer::new(rate, s.shape, s.len_usec, volume_abs),
                self.slope_generation.load(Ordering::SeqCst),
            )
        };
        log::info!("generator running at {rate} Hz");

        while self.running.load(Ordering::SeqCst) {
            match self.queue.dequeue() {
                Dequeued::Tone(tone) => {
                    let generation = self.slope_generation.load(Ordering::SeqCst);
                    if generation != seen_generation {
                        let s = self.slope_spec.lock().unwrap();
                        let volume_abs = self.volume() as f32 / 100.0;
                        synth.set_slope(s.shape, s.len_usec, volume_abs);
                        seen_generation = generation;
                    }
                    synth.synthesize(&tone, &mut *sink);
                    if let Some(hook) = self.hook.lock().unwrap().as_ref() {
                        hook(&tone);
                    }
                }
                Dequeued::JustEmptied => synth.write_silence_tail(&mut *sink),
                Dequeued::Idle => self.queue.wait_for_enqueue(IDLE_PARK),
            }
        }

        self.queue.unregister_consumer();
        sink.close();
        log::info!("generator stopped");
    }
}
