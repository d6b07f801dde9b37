// src/gen/synth.rs  —  Tone → PCM samples, phase-continuous across everything
//
// One running phase accumulator is carried across tones and across
// buffer flushes, so a write() boundary can fall anywhere inside a tone
// without a waveform discontinuity.  Amplitude comes from the slope
// table inside a ramp region and is the flat volume otherwise.

use std::f32::consts::TAU;

use crate::gen::slope::{SlopeShape, SlopeTable};
use crate::sink::AudioSink;
use crate::tone::{SlopeMode, Tone};

/// Samples per sink write.
pub(crate) const BUFFER_SAMPLES: usize = 512;

pub(crate) struct ToneSynthesizer {
    sample_rate: u32,
    buffer: Vec<f32>,
    cursor: usize,
    phase: f32,
    slope: SlopeTable,
    volume_abs: f32,
    /// True while the retained forever tone is being re-delivered, so
    /// the rising ramp is applied only on its first delivery.
    forever_active: bool,
}

impl ToneSynthesizer {
    pub(crate) fn new(
        sample_rate: u32,
        shape: SlopeShape,
        slope_len_usec: u32,
        volume_abs: f32,
    ) -> Self {
        Self {
            sample_rate,
            buffer: vec![0.0; BUFFER_SAMPLES],
            cursor: 0,
            phase: 0.0,
            slope: SlopeTable::build(shape, slope_len_usec, sample_rate, volume_abs),
            volume_abs,
            forever_active: false,
        }
    }

    /// Rebuild the amplitude table.  Called by the consumer thread only,
    /// whenever shape, slope length, or volume has changed.
    pub(crate) fn set_slope(&mut self, shape: SlopeShape, slope_len_usec: u32, volume_abs: f32) {
        self.volume_abs = volume_abs;
        self.slope = SlopeTable::build(shape, slope_len_usec, self.sample_rate, volume_abs);
    }

    /// Synthesize one dequeued tone into the rolling buffer, writing to
    /// the sink every time the buffer fills.  A tone shorter than one
    /// buffer simply leaves samples pending for the next tone.
    pub(crate) fn synthesize(&mut self, tone: &Tone, sink: &mut dyn AudioSink) {
        let n_samples = self.usec_to_samples(tone.duration_usec);
        let slope_n = self.slope.n_amplitudes();
        let (mut rising_n, mut falling_n) = match tone.slope_mode {
            SlopeMode::NoSlopes => (0, 0),
            SlopeMode::Rising => (slope_n, 0),
            SlopeMode::Falling => (0, slope_n),
            SlopeMode::Standard => (slope_n, slope_n),
        };

        if tone.forever {
            // Re-deliveries of the retained tone continue at full
            // amplitude; the falling edge belongs to whatever tone
            // supersedes it.
            if self.forever_active {
                rising_n = 0;
            }
            falling_n = 0;
            self.forever_active = true;
        } else {
            self.forever_active = false;
        }

        let phase_step = TAU * tone.frequency as f32 / self.sample_rate as f32;
        for i in 0..n_samples {
            let sample = if tone.frequency == 0 {
                0.0
            } else {
                // Overlapping ramps on a very short tone resolve to the
                // lower amplitude, never a step.
                let mut amp = self.volume_abs;
                if i < rising_n {
                    amp = amp.min(self.slope.rising(i));
                }
                let remaining = n_samples - 1 - i;
                if remaining < falling_n {
                    amp = amp.min(self.slope.falling(remaining));
                }
                let s = self.phase.sin() * amp;
                self.phase += phase_step;
                if self.phase >= TAU {
                    self.phase -= TAU;
                }
                s
            };

            self.buffer[self.cursor] = sample;
            self.cursor += 1;
            if self.cursor == BUFFER_SAMPLES {
                self.flush(sink);
            }
        }
    }

    /// The queue just drained: pad whatever is pending with silence and
    /// push one final buffer so the sink falls quiet.
    pub(crate) fn write_silence_tail(&mut self, sink: &mut dyn AudioSink) {
        for s in &mut self.buffer[self.cursor..] {
            *s = 0.0;
        }
        self.cursor = BUFFER_SAMPLES;
        self.flush(sink);
        self.forever_active = false;
    }

    fn flush(&mut self, sink: &mut dyn AudioSink) {
        if let Err(e) = sink.write(&self.buffer) {
            log::error!("audio sink write failed: {e}");
        }
        self.cursor = 0;
    }

    fn usec_to_samples(&self, usec: u32) -> usize {
        (u64::from(usec) * u64::from(self.sample_rate) / 1_000_000) as usize
    }
}
