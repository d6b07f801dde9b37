// src/sink/cpal_backend.rs  —  cpal output stream fed by a bounded channel
//
// The generator produces fixed-size PCM buffers; each write() sends one
// chunk into a bounded channel and blocks while the channel is full,
// which is what paces the generator thread in real time.  The cpal
// callback drains chunks and pads underruns with silence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use super::AudioSink;
use crate::error::{Error, Result};

/// Chunks buffered ahead of the device before write() blocks.
const CHANNEL_DEPTH: usize = 4;

pub struct CpalSink {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    sample_rate: u32,
    tx: Option<SyncSender<Vec<f32>>>,
    _stream: Option<Stream>,
}

// Stream is !Send on some platforms; the sink itself only moves between
// threads while the stream handle sits untouched inside it.
unsafe impl Send for CpalSink {}

impl CpalSink {
    /// Bind the default host and output device.  The stream itself is
    /// not created until `open`.
    pub fn new() -> std::result::Result<Self, String> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| "no output device".to_string())?;
        let config = device
            .default_output_config()
            .map_err(|e| format!("no output config: {e}"))?;
        let sample_rate = config.sample_rate().0;
        Ok(Self {
            device,
            config,
            sample_rate,
            tx: None,
            _stream: None,
        })
    }
}

impl AudioSink for CpalSink {
    fn open(&mut self, device: &str) -> Result<()> {
        if self._stream.is_some() {
            return Err(Error::Busy);
        }
        if !device.is_empty() {
            log::debug!("cpal sink ignores device name '{device}' (default device)");
        }

        let (tx, rx) = sync_channel::<Vec<f32>>(CHANNEL_DEPTH);
        let stream = match self.config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&self.device, &self.config.clone().into(), rx),
            SampleFormat::I16 => build_stream::<i16>(&self.device, &self.config.clone().into(), rx),
            SampleFormat::U16 => build_stream::<u16>(&self.device, &self.config.clone().into(), rx),
            other => {
                log::error!("unsupported cpal sample format {other:?}");
                return Err(Error::Busy);
            }
        }?;
        stream.play().map_err(|e| {
            log::error!("cpal stream play failed: {e}");
            Error::Busy
        })?;

        self.tx = Some(tx);
        self._stream = Some(stream);
        log::info!("cpal sink open at {} Hz", self.sample_rate);
        Ok(())
    }

    fn close(&mut self) {
        self.tx = None;
        self._stream = None;
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(Error::Busy);
        };
        // send() blocks while the device is ahead — that block IS the
        // real-time pacing of the generator thread.
        if tx.send(samples.to_vec()).is_err() {
            log::error!("cpal stream gone, dropping audio");
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn build_stream<S>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<Vec<f32>>,
) -> Result<Stream>
where
    S: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let ch = config.channels as usize;
    let mut pending: Vec<f32> = Vec::new();
    let mut cursor = 0usize;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [S], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(ch) {
                    if cursor >= pending.len() {
                        match rx.try_recv() {
                            Ok(chunk) => {
                                pending = chunk;
                                cursor = 0;
                            }
                            Err(_) => {
                                // Underrun: silence.
                                pending.clear();
                                cursor = 0;
                            }
                        }
                    }
                    let sample = if cursor < pending.len() {
                        let s = pending[cursor];
                        cursor += 1;
                        s
                    } else {
                        0.0
                    };
                    let out = S::from_sample(sample);
                    for smp in frame.iter_mut() {
                        *smp = out;
                    }
                }
            },
            |e| log::error!("cpal stream error: {e}"),
            None,
        )
        .map_err(|e| {
            log::error!("cpal build_output_stream failed: {e}");
            Error::Busy
        })?;
    Ok(stream)
}