//! The Capture Source (§4.1): opens an input device and wires its RT
//! callback directly to the [`ring`](super::ring) producer.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated (TIME_CRITICAL on
//! Windows) priority. It **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! This module satisfies that contract: downmixing and format conversion use
//! a pre-sized scratch buffer captured by the closure, and the only ring
//! operation is [`PcmProducer::push_pcm`], which is wait-free and never
//! allocates.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). [`AudioCapture`] must therefore be created and dropped on the
//! same thread — the application wires this up by opening the stream on the
//! Audio Worker thread itself, before entering its drain loop.

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

use super::device;
use super::ring::PcmProducer;
use crate::error::{Error, Result};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{error, info, warn};

/// Handle to an active audio capture stream.
///
/// **Not `Send`** — `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct AudioCapture {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz). May differ
    /// from the negotiated target rate `S`; the Audio Worker resamples.
    pub sample_rate: u32,
}

impl AudioCapture {
    /// Open an input device by preferred name (substring match per §6's
    /// `device` config key), otherwise fall back to the default input
    /// device and then the first available device.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        mut producer: PcmProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut devices: Vec<(String, cpal::Device)> = host
            .input_devices()
            .map_err(|e| Error::AudioDevice(e.to_string()))?
            .enumerate()
            .map(|(idx, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Input Device {}", idx + 1));
                (name, device)
            })
            .collect();
        if devices.is_empty() {
            return Err(Error::NoDefaultInputDevice);
        }

        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let preferred_idx = preferred_device_name.and_then(|preferred| {
            devices
                .iter()
                .position(|(name, _)| name.contains(preferred))
        });
        let default_idx = default_name
            .as_deref()
            .and_then(|name| devices.iter().position(|(n, _)| n.as_str() == name));
        let best_non_loopback_idx = devices
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| !device::is_loopback_like_name(name))
            .max_by_key(|(_, (name, _))| device::mic_preference_score(name))
            .map(|(idx, _)| idx);

        if preferred_device_name.is_some() && preferred_idx.is_none() {
            warn!(
                "preferred input device '{}' not found, falling back",
                preferred_device_name.unwrap_or_default()
            );
        }

        let selected_idx = preferred_idx
            .or(default_idx)
            .or(best_non_loopback_idx)
            .unwrap_or(0);

        let (selected_name, device) = devices.swap_remove(selected_idx);
        info!(device = selected_name.as_str(), "opening input device");

        let supported = device
            .default_input_config()
            .map_err(|e| Error::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();
        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let running_f32 = Arc::clone(&running);
        let running_i16 = Arc::clone(&running);
        let running_u8 = Arc::clone(&running);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                let ch = channels as usize;
                let mut mono_i16: Vec<u8> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _info| {
                        if !running_f32.load(Ordering::Relaxed) {
                            return;
                        }
                        downmix_f32_to_i16_bytes(data, ch, &mut mono_i16);
                        if !producer.push_pcm(&mono_i16) {
                            warn!("ring buffer full: dropped {} bytes", mono_i16.len());
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            SampleFormat::I16 => {
                let ch = channels as usize;
                let mut mono_i16: Vec<u8> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _info| {
                        if !running_i16.load(Ordering::Relaxed) {
                            return;
                        }
                        downmix_i16_to_i16_bytes(data, ch, &mut mono_i16);
                        if !producer.push_pcm(&mono_i16) {
                            warn!("ring buffer full: dropped {} bytes", mono_i16.len());
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            SampleFormat::U8 => {
                let ch = channels as usize;
                let mut mono_i16: Vec<u8> = Vec::new();
                device.build_input_stream(
                    &config,
                    move |data: &[u8], _info| {
                        if !running_u8.load(Ordering::Relaxed) {
                            return;
                        }
                        downmix_u8_to_i16_bytes(data, ch, &mut mono_i16);
                        if !producer.push_pcm(&mono_i16) {
                            warn!("ring buffer full: dropped {} bytes", mono_i16.len());
                        }
                    },
                    |err| error!("audio stream error: {err}"),
                    None,
                )
            }

            fmt => {
                return Err(Error::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| Error::AudioStream(e.to_string()))?;

        stream.play().map_err(|e| Error::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    #[cfg(feature = "audio-cpal")]
    pub fn open_default(producer: PcmProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: PcmProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(Error::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(producer: PcmProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(feature = "audio-cpal")]
fn downmix_f32_to_i16_bytes(data: &[f32], channels: usize, out: &mut Vec<u8>) {
    let frames = data.len() / channels.max(1);
    out.clear();
    out.reserve(frames * 2);
    for f in 0..frames {
        let base = f * channels;
        let mut sum = 0f32;
        for c in 0..channels {
            sum += data[base + c];
        }
        let mono = (sum / channels as f32).clamp(-1.0, 1.0);
        let sample = (mono * i16::MAX as f32) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

#[cfg(feature = "audio-cpal")]
fn downmix_i16_to_i16_bytes(data: &[i16], channels: usize, out: &mut Vec<u8>) {
    let frames = data.len() / channels.max(1);
    out.clear();
    out.reserve(frames * 2);
    for f in 0..frames {
        let base = f * channels;
        let mut sum = 0i32;
        for c in 0..channels {
            sum += data[base + c] as i32;
        }
        let sample = (sum / channels as i32) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

#[cfg(feature = "audio-cpal")]
fn downmix_u8_to_i16_bytes(data: &[u8], channels: usize, out: &mut Vec<u8>) {
    let frames = data.len() / channels.max(1);
    out.clear();
    out.reserve(frames * 2);
    for f in 0..frames {
        let base = f * channels;
        let mut sum = 0f32;
        for c in 0..channels {
            sum += data[base + c] as f32 - 128.0;
        }
        let mono = (sum / channels as f32) / 128.0;
        let sample = (mono.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&sample.to_le_bytes());
    }
}

#[cfg(all(test, feature = "audio-cpal"))]
mod tests {
    use super::*;

    #[test]
    fn downmix_f32_averages_channels() {
        let mut out = Vec::new();
        downmix_f32_to_i16_bytes(&[0.5, 0.5, -0.5, -0.5], 2, &mut out);
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![(0.5 * i16::MAX as f32) as i16, (-0.5 * i16::MAX as f32) as i16]);
    }
}
