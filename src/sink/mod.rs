// src/sink/mod.rs  —  AudioSink trait + backends
//
// The generator only ever sees this trait: open, close, write, and the
// sample rate negotiated at open time.  Backend-specific types never
// cross the boundary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

/// Platform-agnostic PCM output.  Samples are f32 in [-1, 1].
pub trait AudioSink: Send {
    /// Open the device.  An empty `device` string selects the default.
    fn open(&mut self, device: &str) -> Result<()>;
    fn close(&mut self);
    /// Write one buffer of samples.  May block to pace the producer.
    fn write(&mut self, samples: &[f32]) -> Result<()>;
    /// Valid after `open`.
    fn sample_rate(&self) -> u32;
}

#[cfg(feature = "audio-cpal")]
mod cpal_backend;
#[cfg(feature = "audio-cpal")]
pub use cpal_backend::CpalSink;

const NULL_SAMPLE_RATE: u32 = 44_100;

/// No sound — `write` sleeps through the samples so timing feels real.
pub struct NullSink {
    open: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self { open: false }
    }
}

impl Default for NullSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSink for NullSink {
    fn open(&mut self, _device: &str) -> Result<()> {
        if self.open {
            return Err(Error::Busy);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let usec = samples.len() as u64 * 1_000_000 / u64::from(NULL_SAMPLE_RATE);
        std::thread::sleep(Duration::from_micros(usec));
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        NULL_SAMPLE_RATE
    }
}

/// Collects every written sample in memory, with no pacing.  Used for
/// offline rendering (WAV export) and for observing generator output in
/// tests.
pub struct BufferSink {
    sample_rate: u32,
    open: bool,
    samples: Arc<Mutex<Vec<f32>>>,
}

impl BufferSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            open: false,
            samples: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to the captured samples; stays valid after the
    /// sink has been moved into a generator.
    pub fn samples(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.samples)
    }
}

impl AudioSink for BufferSink {
    fn open(&mut self, _device: &str) -> Result<()> {
        if self.open {
            return Err(Error::Busy);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.samples.lock().unwrap().extend_from_slice(samples);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Factory: returns the best available backend for a name, falling back
/// to `NullSink` when real audio cannot be used.
pub fn create_sink(backend: &str) -> Box<dyn AudioSink> {
    match backend {
        #[cfg(feature = "audio-cpal")]
        "cpal" | "" => match CpalSink::new() {
            Ok(s) => return Box::new(s),
            Err(e) => log::warn!("cpal init failed: {e}  →  using NullSink"),
        },
        #[cfg(not(feature = "audio-cpal"))]
        "cpal" | "" => log::warn!("built without cpal support  →  using NullSink"),
        "null" => {}
        other => log::warn!("unknown audio backend '{other}'  →  using NullSink"),
    }
    Box::new(NullSink::new())
}
