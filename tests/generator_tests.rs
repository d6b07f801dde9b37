// tests/generator_tests.rs  —  Generator lifecycle, parameters, PCM output

use cw_keyer::{
    create_sink, BufferSink, Error, Generator, NullSink, SlopeMode, SlopeShape,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const VOLUME_MIN: u32 = 0;
const VOLUME_MAX: u32 = 100;

#[test]
fn volume_round_trips_across_the_whole_range() {
    let gen = Generator::new(Box::new(NullSink::new()));
    for v in VOLUME_MIN..=VOLUME_MAX {
        gen.set_volume(v).unwrap();
        assert_eq!(gen.volume(), v);
    }
}

#[test]
fn parameter_setters_reject_out_of_range() {
    let gen = Generator::new(Box::new(NullSink::new()));
    assert_eq!(gen.set_speed(3), Err(Error::InvalidArgument));
    assert_eq!(gen.set_speed(61), Err(Error::InvalidArgument));
    assert_eq!(gen.set_frequency(4001), Err(Error::InvalidArgument));
    assert_eq!(gen.set_volume(101), Err(Error::InvalidArgument));
    assert_eq!(gen.set_gap(61), Err(Error::InvalidArgument));
    assert_eq!(gen.set_weighting(19), Err(Error::InvalidArgument));
    assert_eq!(gen.set_weighting(81), Err(Error::InvalidArgument));
    // Nothing was clobbered by the rejected values.
    assert_eq!(gen.speed(), 12);
    assert_eq!(gen.weighting(), 50);
}

#[test]
fn slope_conflict_is_rejected() {
    let gen = Generator::new(Box::new(NullSink::new()));
    assert_eq!(
        gen.set_tone_slope(SlopeShape::Rectangular, 5000),
        Err(Error::InvalidArgument)
    );
    gen.set_tone_slope(SlopeShape::Rectangular, 0).unwrap();
    gen.set_tone_slope(SlopeShape::Linear, 2000).unwrap();
    assert_eq!(gen.tone_slope(), (SlopeShape::Linear, 2000));
}

#[test]
fn speed_change_resyncs_element_lengths() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.set_speed(20).unwrap();
    let t = gen.sync_parameters();
    assert_eq!(t.dot_len, 60_000);
    gen.set_speed(40).unwrap();
    let t = gen.sync_parameters();
    assert_eq!(t.dot_len, 30_000);
    assert_eq!(t.dash_len, 90_000);
}

#[test]
fn waits_fail_fast_when_not_running() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.enqueue_tone(700, 50_000, SlopeMode::Standard).unwrap();
    assert_eq!(gen.wait_for_tone(), Err(Error::WouldDeadlock));
    assert_eq!(gen.wait_for_queue_drain(), Err(Error::WouldDeadlock));
}

#[test]
fn stop_without_start_is_a_noop() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.stop();
    gen.stop();
}

#[test]
fn double_start_is_busy() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.start("").unwrap();
    assert_eq!(gen.start(""), Err(Error::Busy));
    gen.stop();
}

#[test]
fn end_to_end_single_tone_drains() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.start("").unwrap();
    gen.set_speed(20).unwrap();
    gen.enqueue_tone(700, 300_000, SlopeMode::Standard).unwrap();
    gen.wait_for_tone().unwrap();
    assert_eq!(gen.queue().len(), 0);
    gen.wait_for_queue_drain().unwrap();
    gen.stop();
}

#[test]
fn send_text_produces_the_expected_keyed_samples() {
    let sink = BufferSink::new(8000);
    let samples = sink.samples();
    let gen = Generator::new(Box::new(sink));
    gen.start("").unwrap();
    gen.set_speed(20).unwrap();
    gen.set_volume(70).unwrap();

    gen.send_text("SOS").unwrap();
    gen.wait_for_queue_drain().unwrap();
    gen.stop();

    // SOS at 20 WPM: 6 dots (60 ms) + 3 dashes (180 ms) of mark time
    // = 0.9 s = 7200 samples at 8 kHz.  Ramp starts and sine zero
    // crossings account for the slack.
    let data = samples.lock().unwrap();
    let keyed = data.iter().filter(|&&s| s != 0.0).count();
    assert!(keyed > 6900, "keyed {keyed}");
    assert!(keyed <= 7200, "keyed {keyed}");
}

#[test]
fn flush_discards_pending_tones() {
    let gen = Generator::new(Box::new(NullSink::new()));
    gen.start("").unwrap();
    for _ in 0..10 {
        gen.enqueue_tone(700, 200_000, SlopeMode::Standard).unwrap();
    }
    gen.flush();
    assert_eq!(gen.queue().len(), 0);
    gen.stop();
}

#[test]
fn low_water_callback_through_the_generator() {
    let gen = Generator::new(Box::new(NullSink::new()));
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    gen.register_low_water_callback(1, move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    // Enqueue before starting so the drain is a deterministic
    // 3 -> 2 -> 1 -> 0 walk: exactly one crossing of level 1.
    for _ in 0..3 {
        gen.enqueue_tone(700, 100_000, SlopeMode::Standard).unwrap();
    }
    gen.start("").unwrap();
    gen.wait_for_queue_drain().unwrap();
    gen.stop();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn factory_null_backend_always_works() {
    let gen = Generator::new(create_sink("null"));
    gen.start("").unwrap();
    gen.send_character('E').unwrap();
    gen.wait_for_queue_drain().unwrap();
    gen.stop();
}
