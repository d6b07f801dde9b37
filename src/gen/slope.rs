// src/gen/slope.rs  —  Precomputed amplitude ramps for click-free keying

use crate::error::{Error, Result};

/// Default slope duration.
pub const SLOPE_LEN_INITIAL_USEC: u32 = 5000;

/// Envelope of the amplitude ramp at tone edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopeShape {
    Linear,
    RaisedCosine,
    Sine,
    /// Hard keying — no ramp at all.
    Rectangular,
}

/// One precomputed rising ramp, read backwards for the falling edge.
/// Rebuilt whenever shape, slope length, sample rate, or volume changes.
pub struct SlopeTable {
    shape: SlopeShape,
    len_usec: u32,
    amplitudes: Vec<f32>,
}

impl SlopeTable {
    /// `volume_abs` is the flat-top amplitude in [0, 1].
    /// Rectangular shape always yields an empty table.
    pub fn build(shape: SlopeShape, len_usec: u32, sample_rate: u32, volume_abs: f32) -> Self {
        let n = if shape == SlopeShape::Rectangular {
            0
        } else {
            (u64::from(len_usec) * u64::from(sample_rate) / 1_000_000) as usize
        };

        let mut amplitudes = Vec::with_capacity(n);
        for i in 0..n {
            // 0 at index 0, volume_abs at index n-1.
            let x = if n > 1 { i as f32 / (n - 1) as f32 } else { 1.0 };
            let a = match shape {
                SlopeShape::Linear => x,
                SlopeShape::Sine => (x * std::f32::consts::FRAC_PI_2).sin(),
                SlopeShape::RaisedCosine => (1.0 - (x * std::f32::consts::PI).cos()) / 2.0,
                SlopeShape::Rectangular => unreachable!(),
            };
            amplitudes.push(a * volume_abs);
        }

        Self { shape, len_usec, amplitudes }
    }

    /// Reject the conflicting request of a rectangular shape with a
    /// non-zero slope length before building anything.
    pub fn check_conflict(shape: SlopeShape, len_usec: u32) -> Result<()> {
        if shape == SlopeShape::Rectangular && len_usec != 0 {
            Err(Error::InvalidArgument)
        } else {
            Ok(())
        }
    }

    pub fn shape(&self) -> SlopeShape {
        self.shape
    }

    pub fn len_usec(&self) -> u32 {
        self.len_usec
    }

    /// Number of samples in one ramp.
    pub fn n_amplitudes(&self) -> usize {
        self.amplitudes.len()
    }

    /// Amplitude of the rising ramp at sample `i`; saturates at the top.
    pub fn rising(&self, i: usize) -> f32 {
        match self.amplitudes.get(i) {
            Some(a) => *a,
            None => self.amplitudes.last().copied().unwrap_or(0.0),
        }
    }

    /// Amplitude of the falling ramp `i` samples before the tone ends.
    pub fn falling(&self, remaining: usize) -> f32 {
        self.rising(remaining)
    }
}
