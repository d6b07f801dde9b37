// src/lib.rs  —  cw-keyer: CW keying and sidetone generation
//
// Three pieces carry the weight: a bounded tone queue with a
// high/low-water backpressure protocol, a generator thread that turns
// queued tones into phase-continuous PCM for an audio sink, and an
// iambic keyer state machine (Curtis A/B) driven once per completed
// tone.  A straight key, a Morse text sender, and cpal/null/buffer
// sinks round out the crate.
//
// Everything is instance-owned: create as many generators as you have
// sinks, wire a keyer to each.
//
//   let gen = Generator::new(create_sink("null"));
//   gen.start("")?;
//   gen.set_speed(20)?;
//   gen.send_text("CQ CQ DE N0CALL")?;
//   gen.wait_for_queue_drain()?;
//   gen.stop();

pub mod error;
pub mod gen;
pub mod keyer;
pub mod morse;
pub mod sink;
mod sync;
pub mod tone;

pub use error::{Error, Result};
pub use gen::{ElementTiming, Generator, SlopeShape};
pub use keyer::{ElementTimer, IambicKeyer, KeyValue, StraightKey};
pub use sink::{create_sink, AudioSink, BufferSink, NullSink};
pub use tone::{Dequeued, SlopeMode, Tone, ToneQueue};
