// src/main.rs  —  cw-keyer  demo binary
//
// Three ways to drive the library: send --text through a live sink,
// render --text to a WAV file, or key interactively with --paddle.

mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppConfig, Cli, PaddleMode};
use cw_keyer::{create_sink, BufferSink, Generator};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // ── --print-config  ───────────────────────────────────────────────────────
    if cli.print_config {
        print!("{}", config::DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // ── --write-config  ───────────────────────────────────────────────────────
    if cli.write_config {
        let path = AppConfig::write_default_config(&cli)?;
        println!("Config written to: {}", path.display());
        return Ok(());
    }

    let cfg = AppConfig::load(&cli)?;

    // ── Offline WAV render ────────────────────────────────────────────────────
    if let Some(path) = &cli.wav {
        let text = cli.text.as_deref().context("--wav needs --text")?;
        let n = render_wav(&cfg, text, path)?;
        println!("Wrote {} samples to {}", n, path.display());
        return Ok(());
    }

    // ── Live generator ────────────────────────────────────────────────────────
    let gen = Generator::new(create_sink(&cfg.backend));
    gen.start("")?;
    apply_config(&gen, &cfg)?;

    if cli.paddle {
        run_paddle(&gen, cfg.mode)?;
    } else if let Some(text) = &cli.text {
        println!("Sending at {} WPM: {}", cfg.wpm, text);
        gen.send_text(text)?;
        gen.wait_for_queue_drain()?;
    } else {
        println!("Nothing to do — try --text \"CQ CQ\" or --paddle.  See --help.");
    }

    gen.stop();
    Ok(())
}

fn apply_config(gen: &Arc<Generator>, cfg: &AppConfig) -> Result<()> {
    gen.set_speed(cfg.wpm)?;
    gen.set_frequency(cfg.tone_hz)?;
    gen.set_volume(cfg.volume)?;
    gen.set_gap(cfg.gap)?;
    gen.set_weighting(cfg.weighting)?;
    Ok(())
}

/// Render text through a BufferSink and write a mono 16-bit WAV.
fn render_wav(cfg: &AppConfig, text: &str, path: &std::path::Path) -> Result<usize> {
    const RATE: u32 = 44_100;
    let sink = BufferSink::new(RATE);
    let samples = sink.samples();

    let gen = Generator::new(Box::new(sink));
    gen.start("")?;
    apply_config(&gen, cfg)?;
    gen.send_text(text)?;
    gen.wait_for_queue_drain()?;
    gen.stop();

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Creating {}", path.display()))?;
    let data = samples.lock().unwrap();
    for &s in data.iter() {
        writer.write_sample((s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;
    Ok(data.len())
}

// ── Interactive paddle mode ───────────────────────────────────────────────────
// '.' is the dot paddle, '-' the dash paddle (press both for a squeeze);
// in straight mode '.' is the key contact.  Needs a terminal that
// reports key release events (kitty keyboard protocol).

#[cfg(feature = "paddle-keys")]
fn run_paddle(gen: &Arc<Generator>, mode: PaddleMode) -> Result<()> {
    use crossterm::event::{
        self, Event, KeyCode, KeyEventKind, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    };
    use crossterm::{execute, terminal};
    use cw_keyer::{IambicKeyer, KeyValue, StraightKey};
    use std::time::Duration;

    let iambic = match mode {
        PaddleMode::Straight => None,
        PaddleMode::IambicA | PaddleMode::IambicB => {
            let keyer = IambicKeyer::new(gen);
            keyer.set_curtis_mode_b(mode == PaddleMode::IambicB);
            keyer.register_key_callback(|v| {
                log::debug!("key {}", if v == KeyValue::Closed { "down" } else { "up" });
            });
            Some(keyer)
        }
    };
    let straight = match mode {
        PaddleMode::Straight => Some(StraightKey::new(gen)),
        _ => None,
    };

    terminal::enable_raw_mode()?;
    let enhanced = execute!(
        std::io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    )
    .is_ok();
    if !enhanced {
        println!("Terminal does not report key releases — paddle feel will be poor.");
    }
    println!("Paddle mode ({mode:?}): '.'=dot  '-'=dash  Esc=quit\r");

    let mut dot = false;
    let mut dash = false;
    loop {
        if !event::poll(Duration::from_millis(5))? {
            continue;
        }
        let Event::Key(k) = event::read()? else { continue };
        let pressed = match k.kind {
            KeyEventKind::Press => true,
            KeyEventKind::Release => false,
            KeyEventKind::Repeat => continue,
        };
        match k.code {
            KeyCode::Esc => break,
            KeyCode::Char('.') => {
                dot = pressed;
                feed(&iambic, &straight, dot, dash);
            }
            KeyCode::Char('-') => {
                dash = pressed;
                feed(&iambic, &straight, dot, dash);
            }
            _ => {}
        }
    }

    if enhanced {
        let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
    }
    terminal::disable_raw_mode()?;
    return Ok(());

    fn feed(
        iambic: &Option<Arc<IambicKeyer>>,
        straight: &Option<StraightKey>,
        dot: bool,
        dash: bool,
    ) {
        let result = if let Some(keyer) = iambic {
            keyer.notify_paddle_event(dot, dash)
        } else if let Some(key) = straight {
            key.notify_key_event(dot)
        } else {
            Ok(())
        };
        if let Err(e) = result {
            log::warn!("paddle event dropped: {e}");
        }
    }
}

#[cfg(not(feature = "paddle-keys"))]
fn run_paddle(_gen: &Arc<Generator>, _mode: PaddleMode) -> Result<()> {
    anyhow::bail!("this build has no paddle-keys feature — rebuild with --features paddle-keys")
}
