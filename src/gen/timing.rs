// src/gen/timing.rs  —  WPM/gap/weighting → element durations (PARIS standard)

use crate::error::{Error, Result};

pub const SPEED_MIN: u32 = 4;
pub const SPEED_MAX: u32 = 60;
pub const SPEED_INITIAL: u32 = 12;

pub const FREQUENCY_MIN: u32 = 0;
pub use crate::tone::queue::FREQUENCY_MAX;
pub const FREQUENCY_INITIAL: u32 = 800;

pub const VOLUME_MIN: u32 = 0;
pub const VOLUME_MAX: u32 = 100;
pub const VOLUME_INITIAL: u32 = 70;

pub const GAP_MIN: u32 = 0;
pub const GAP_MAX: u32 = 60;
pub const GAP_INITIAL: u32 = 0;

pub const WEIGHTING_MIN: u32 = 20;
pub const WEIGHTING_MAX: u32 = 80;
pub const WEIGHTING_INITIAL: u32 = 50;

/// PARIS calibration: one unit (dot) is 1,200,000/WPM microseconds.
const DOT_CALIBRATION_USEC: i64 = 1_200_000;

/// All element lengths, in microseconds, derived from one (speed, gap,
/// weighting) triple.  Weighting shifts duration between marks and the
/// space that follows them; the character and word spaces absorb the
/// remainder so that overall character timing stays on the PARIS grid.
/// `additional` is the Farnsworth extra inter-character gap and
/// `adjustment` its matching extra inter-word gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementTiming {
    pub dot_len: u32,
    pub dash_len: u32,
    pub eom_space_len: u32,
    pub eoc_space_len: u32,
    pub eow_space_len: u32,
    pub additional_space_len: u32,
    pub adjustment_space_len: u32,
}

impl ElementTiming {
    pub fn derive(speed_wpm: u32, gap_dots: u32, weighting_percent: u32) -> Self {
        let unit = DOT_CALIBRATION_USEC / i64::from(speed_wpm);
        let weighting = (2 * i64::from(weighting_percent) - 100) * unit / 100;

        let dot_len = unit + weighting;
        let dash_len = 3 * dot_len;
        let eom_space_len = unit - (28 * weighting) / 22;
        let eoc_space_len = 3 * unit - eom_space_len;
        let eow_space_len = 7 * unit - eoc_space_len;
        let additional_space_len = i64::from(gap_dots) * unit;
        let adjustment_space_len = (7 * additional_space_len) / 3;

        Self {
            dot_len: dot_len.max(0) as u32,
            dash_len: dash_len.max(0) as u32,
            eom_space_len: eom_space_len.max(0) as u32,
            eoc_space_len: eoc_space_len.max(0) as u32,
            eow_space_len: eow_space_len.max(0) as u32,
            additional_space_len: additional_space_len.max(0) as u32,
            adjustment_space_len: adjustment_space_len.max(0) as u32,
        }
    }
}

pub fn check_speed(wpm: u32) -> Result<()> {
    range_check(wpm, SPEED_MIN, SPEED_MAX)
}

pub fn check_frequency(hz: u32) -> Result<()> {
    range_check(hz, FREQUENCY_MIN, FREQUENCY_MAX)
}

pub fn check_volume(percent: u32) -> Result<()> {
    range_check(percent, VOLUME_MIN, VOLUME_MAX)
}

pub fn check_gap(dots: u32) -> Result<()> {
    range_check(dots, GAP_MIN, GAP_MAX)
}

pub fn check_weighting(percent: u32) -> Result<()> {
    range_check(percent, WEIGHTING_MIN, WEIGHTING_MAX)
}

fn range_check(value: u32, min: u32, max: u32) -> Result<()> {
    if value < min || value > max {
        Err(Error::InvalidArgument)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paris_dot_lengths() {
        // 1200 ms / wpm, neutral weighting.
        let t = ElementTiming::derive(20, 0, 50);
        assert_eq!(t.dot_len, 60_000);
        assert_eq!(t.dash_len, 180_000);
        assert_eq!(t.eom_space_len, 60_000);
        assert_eq!(t.eoc_space_len, 120_000);
        assert_eq!(t.eow_space_len, 300_000);

        let t = ElementTiming::derive(12, 0, 50);
        assert_eq!(t.dot_len, 100_000);
    }

    #[test]
    fn character_grid_is_weighting_invariant() {
        // Marks lengthen and the following space shrinks, but a full
        // dot+space pair and a full character stay on the PARIS grid.
        let unit = 1_200_000 / 20;
        for w in [WEIGHTING_MIN, 35, 50, 65, WEIGHTING_MAX] {
            let t = ElementTiming::derive(20, 0, w);
            assert_eq!(
                i64::from(t.eoc_space_len) + i64::from(t.eom_space_len),
                3 * unit,
                "weighting {w}"
            );
            assert_eq!(
                i64::from(t.eow_space_len) + i64::from(t.eoc_space_len),
                7 * unit,
                "weighting {w}"
            );
        }
    }

    #[test]
    fn heavier_weighting_lengthens_marks() {
        let light = ElementTiming::derive(20, 0, 30);
        let neutral = ElementTiming::derive(20, 0, 50);
        let heavy = ElementTiming::derive(20, 0, 70);
        assert!(light.dot_len < neutral.dot_len);
        assert!(neutral.dot_len < heavy.dot_len);
        assert!(light.eom_space_len > heavy.eom_space_len);
    }

    #[test]
    fn farnsworth_gap_scales_word_spacing() {
        let t = ElementTiming::derive(20, 3, 50);
        let unit = 60_000;
        assert_eq!(t.additional_space_len, 3 * unit);
        assert_eq!(t.adjustment_space_len, 7 * unit);
        let t0 = ElementTiming::derive(20, 0, 50);
        assert_eq!(t0.additional_space_len, 0);
        assert_eq!(t0.adjustment_space_len, 0);
    }

    #[test]
    fn range_checks() {
        assert!(check_speed(SPEED_MIN).is_ok());
        assert!(check_speed(SPEED_MAX).is_ok());
        assert_eq!(check_speed(SPEED_MIN - 1), Err(Error::InvalidArgument));
        assert_eq!(check_speed(SPEED_MAX + 1), Err(Error::InvalidArgument));
        assert!(check_volume(0).is_ok());
        assert_eq!(check_volume(101), Err(Error::InvalidArgument));
        assert_eq!(check_weighting(10), Err(Error::InvalidArgument));
        assert_eq!(check_gap(61), Err(Error::InvalidArgument));
        assert!(check_frequency(FREQUENCY_MAX).is_ok());
        assert_eq!(check_frequency(FREQUENCY_MAX + 1), Err(Error::InvalidArgument));
    }
}
