// src/error.rs  —  Library error taxonomy

use std::fmt;

/// Everything the library can report to a caller.  All variants are
/// recoverable — no component aborts the process on any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Out-of-range frequency/duration/speed/volume/gap/weighting,
    /// or a slope shape/length conflict.
    InvalidArgument,
    /// Enqueue against a saturated tone queue.  Try again shortly —
    /// playback keeps draining in the background.
    QueueFull,
    /// A blocking wait that could never be woken: called from the
    /// generator's own consumer thread, or with no consumer running.
    WouldDeadlock,
    /// The operation needs exclusive use of the sink while another
    /// subsystem is using it (e.g. starting a generator twice).
    Busy,
    /// The consumer thread could not be created.
    ThreadStartFailure,
    /// A keyer transition step was invoked while one was already in
    /// progress.  Non-fatal; callers retry once.
    ReentrancyBlocked,
}

impl Error {
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidArgument   => "argument out of range",
            Self::QueueFull         => "tone queue full",
            Self::WouldDeadlock     => "wait would deadlock",
            Self::Busy              => "sink busy",
            Self::ThreadStartFailure => "cannot start generator thread",
            Self::ReentrancyBlocked => "keyer step already in progress",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
