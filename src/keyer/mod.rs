// src/keyer/mod.rs  —  Key state types shared by the iambic and straight keys

pub mod iambic;
pub mod straight;

pub use iambic::IambicKeyer;
pub use straight::StraightKey;

use std::sync::atomic::{AtomicU64, Ordering};

/// Logical key contact state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyValue {
    Open,
    Closed,
}

/// Externally owned microsecond accumulator.  The iambic keyer advances
/// it by each completed tone's length while keying is in progress; a
/// receiver/decoder reads it independently.
#[derive(Debug, Default)]
pub struct ElementTimer {
    usec: AtomicU64,
}

impl ElementTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, usec: u32) {
        self.usec.fetch_add(u64::from(usec), Ordering::Relaxed);
    }

    pub fn elapsed_usec(&self) -> u64 {
        self.usec.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.usec.store(0, Ordering::Relaxed);
    }
}
