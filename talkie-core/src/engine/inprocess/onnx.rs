//! Whisper ONNX in-process recognizer, via the `ort` crate.
//!
//! Targets the HuggingFace `optimum` separate encoder + decoder export:
//! - `encoder_model.onnx` — input `[1,80,3000]` → `last_hidden_state [1,1500,384]`
//! - `decoder_model.onnx` — `input_ids [1,seq]` + `encoder_hidden_states [1,1500,384]`
//!   → `logits [1,seq,vocab]`
//! - `tokenizer.json`     — HuggingFace fast tokenizer
//!
//! This is a condensed single-pass encoder + greedy-decode loop (no
//! decoder-with-past caching, no phrase-bias or cloud/platform fallback
//! paths) — enough to exercise the full pipeline against a real Whisper
//! export without the full production decoder's degeneracy heuristics.
//!
//! ## Mel spectrogram parameters (must match training)
//!
//! | Parameter       | Value          |
//! |-----------------|----------------|
//! | Hann window     | 400 samples    |
//! | FFT size        | 400            |
//! | Frequency bins  | 201 (400/2+1)  |
//! | Hop length      | 160 (10 ms)    |
//! | Mel bands       | 80             |
//! | Mel range       | 0–8 000 Hz     |
//! | Frames          | 3 000 (30 s)   |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array3;
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::Value;
use rustfft::{num_complex::Complex, FftPlanner};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::audio::chunk::PcmChunk;
use crate::engine::recognizer::{Alternative, InProcessModel, RecognitionResult};
use crate::error::{Error, Result};

const N_FFT: usize = 400;
const FFT_SIZE: usize = N_FFT;
const N_FREQS: usize = FFT_SIZE / 2 + 1;
const HOP: usize = 160;
const N_MELS: usize = 80;
const N_FRAMES: usize = 3_000;
const MEL_SAMPLES: usize = 480_000;

const EOT: i64 = 50257;
const SOT: i64 = 50258;
const ENGLISH: i64 = 50259;
const TRANSCRIBE: i64 = 50359;
const NO_TIMESTAMPS: i64 = 50363;
const MAX_TOKENS: usize = 224;
const PARTIAL_MAX_TOKENS: usize = 10;

#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub encoder_path: PathBuf,
    pub decoder_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl OnnxModelConfig {
    pub fn from_model_dir(dir: &Path) -> Self {
        Self {
            encoder_path: dir.join("encoder_model.onnx"),
            decoder_path: dir.join("decoder_model.onnx"),
            tokenizer_path: dir.join("tokenizer.json"),
        }
    }
}

pub struct OnnxModel {
    config: OnnxModelConfig,
    encoder: Option<Session>,
    decoder: Option<Session>,
    tokenizer: Option<Tokenizer>,
    mel_filters: Vec<Vec<f32>>,
    hann_window: Vec<f32>,
    fft: Arc<dyn rustfft::Fft<f32>>,
    accumulated: Vec<f32>,
    utterance_count: u64,
}

impl OnnxModel {
    pub fn new(config: OnnxModelConfig) -> Self {
        Self {
            config,
            encoder: None,
            decoder: None,
            tokenizer: None,
            mel_filters: build_mel_filters(FFT_SIZE, 16_000, N_MELS, 0.0, 8_000.0),
            hann_window: build_hann_window(N_FFT),
            fft: Arc::from(FftPlanner::<f32>::new().plan_fft_forward(FFT_SIZE)),
            accumulated: Vec::new(),
            utterance_count: 0,
        }
    }

    fn create_session(model_path: &Path) -> Result<Session> {
        if !model_path.exists() {
            return Err(Error::ModelNotFound {
                path: model_path.to_path_buf(),
            });
        }
        SessionBuilder::new()
            .map_err(|e| Error::EngineInit {
                detail: e.to_string(),
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| Error::EngineInit {
                detail: e.to_string(),
            })?
            .commit_from_file(model_path)
            .map_err(|e| Error::EngineInit {
                detail: e.to_string(),
            })
    }

    fn log_mel_spectrogram(&self, samples: &[f32]) -> Array3<f32> {
        let mut normalized = samples.to_vec();
        normalize_rms_in_place(&mut normalized, 0.10);
        let centered = reflect_pad(&normalized, N_FFT / 2);
        let active_frames = ((samples.len().min(MEL_SAMPLES) + N_FFT + HOP - 1) / HOP)
            .clamp(1, N_FRAMES);

        let mut mel = Array3::<f32>::zeros((1, N_MELS, N_FRAMES));
        let mut fft_buf = vec![Complex::new(0.0f32, 0.0); FFT_SIZE];

        for frame in 0..active_frames {
            let start = frame * HOP;
            for v in fft_buf.iter_mut() {
                *v = Complex::new(0.0, 0.0);
            }
            for i in 0..N_FFT {
                let s = centered.get(start + i).copied().unwrap_or(0.0);
                fft_buf[i] = Complex::new(s * self.hann_window[i], 0.0);
            }
            self.fft.process(&mut fft_buf);

            for m in 0..N_MELS {
                let mut energy = 0.0f32;
                for k in 0..N_FREQS {
                    energy += self.mel_filters[m][k] * fft_buf[k].norm_sqr();
                }
                mel[[0, m, frame]] = energy;
            }
        }

        mel.mapv_inplace(|v| v.max(1e-10).log10());
        let max_val = mel.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        mel.mapv_inplace(|v| v.max(max_val - 8.0));
        mel.mapv_inplace(|v| (v + 4.0) / 4.0);
        mel
    }

    fn greedy_decode(
        decoder: &mut Session,
        tokenizer: &Tokenizer,
        encoder_hidden: &Value,
        max_steps: usize,
    ) -> Result<Vec<i64>> {
        let mut tokens: Vec<i64> = vec![SOT, ENGLISH, TRANSCRIBE, NO_TIMESTAMPS];

        for _ in 0..max_steps {
            let seq_len = tokens.len();
            let input_ids = ndarray::Array2::from_shape_vec((1, seq_len), tokens.clone())
                .map_err(|e| Error::EngineFatal {
                    detail: e.to_string(),
                })?;
            let input_ids_val = Value::from_array(input_ids).map_err(|e| Error::EngineFatal {
                detail: e.to_string(),
            })?;

            let outputs = decoder
                .run(ort::inputs![
                    "input_ids" => input_ids_val,
                    "encoder_hidden_states" => encoder_hidden.view(),
                ])
                .map_err(|e| Error::EngineFatal {
                    detail: e.to_string(),
                })?;

            let (shape, logits) = outputs[0]
                .try_extract_raw_tensor::<f32>()
                .map_err(|e| Error::EngineFatal {
                    detail: e.to_string(),
                })?;
            let vocab = *shape.last().unwrap_or(&0) as usize;
            if vocab == 0 {
                break;
            }
            let last_step_offset = (seq_len - 1) * vocab;
            let next = logits[last_step_offset..last_step_offset + vocab]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(idx, _)| idx as i64)
                .unwrap_or(EOT);

            tokens.push(next);
            if next == EOT {
                break;
            }
        }

        let _ = tokenizer;
        Ok(tokens)
    }

    fn decode_to_text(&self, tokens: &[i64]) -> String {
        let Some(tokenizer) = self.tokenizer.as_ref() else {
            return String::new();
        };
        let ids: Vec<u32> = tokens
            .iter()
            .filter(|&&t| t != EOT && t < 50257)
            .map(|&t| t as u32)
            .collect();
        tokenizer.decode(&ids, true).unwrap_or_default()
    }

    fn run_inference(&mut self, samples: &[f32], partial: bool) -> Result<Option<RecognitionResult>> {
        if samples.len() < 1600 {
            return Ok(None);
        }

        let encoder = self.encoder.as_mut().ok_or_else(|| Error::EngineInit {
            detail: "encoder session not loaded".into(),
        })?;
        let mel = self.log_mel_spectrogram(samples);
        let mel_val = Value::from_array(mel).map_err(|e| Error::EngineFatal {
            detail: e.to_string(),
        })?;
        let enc_outputs = encoder
            .run(ort::inputs!["input_features" => mel_val])
            .map_err(|e| Error::EngineFatal {
                detail: e.to_string(),
            })?;
        let encoder_hidden = enc_outputs[0].clone();

        let decoder = self.decoder.as_mut().ok_or_else(|| Error::EngineInit {
            detail: "decoder session not loaded".into(),
        })?;
        let tokenizer = self.tokenizer.as_ref().ok_or_else(|| Error::EngineInit {
            detail: "tokenizer not loaded".into(),
        })?;
        let max_steps = if partial { PARTIAL_MAX_TOKENS } else { MAX_TOKENS };
        let tokens = Self::greedy_decode(decoder, tokenizer, &encoder_hidden, max_steps)?;
        let text = self.decode_to_text(&tokens);

        if text.trim().is_empty() {
            return Ok(None);
        }

        if partial {
            Ok(Some(RecognitionResult::Partial { text }))
        } else {
            self.utterance_count += 1;
            Ok(Some(RecognitionResult::Final {
                alternatives: vec![Alternative {
                    text,
                    confidence: None,
                }],
            }))
        }
    }
}

impl InProcessModel for OnnxModel {
    fn warm_up(&mut self) -> Result<()> {
        info!(encoder = ?self.config.encoder_path, decoder = ?self.config.decoder_path, "loading ONNX whisper sessions");
        self.encoder = Some(Self::create_session(&self.config.encoder_path)?);
        self.decoder = Some(Self::create_session(&self.config.decoder_path)?);
        self.tokenizer = Some(
            Tokenizer::from_file(&self.config.tokenizer_path).map_err(|e| Error::EngineInit {
                detail: e.to_string(),
            })?,
        );
        debug!("ONNX whisper model warm-up complete");
        Ok(())
    }

    fn process(&mut self, chunk: &PcmChunk) -> Result<Option<RecognitionResult>> {
        self.accumulated
            .extend(chunk.samples().map(|s| s as f32 / i16::MAX as f32));
        if self.accumulated.len() > 480_000 {
            let overflow = self.accumulated.len() - 480_000;
            self.accumulated.drain(0..overflow);
        }
        self.run_inference(&self.accumulated.clone(), true)
    }

    fn final_(&mut self) -> Result<Option<RecognitionResult>> {
        let samples = std::mem::take(&mut self.accumulated);
        if samples.is_empty() {
            return Ok(None);
        }
        let result = self.run_inference(&samples, false);
        if result.as_ref().map(|r| r.is_none()).unwrap_or(false) {
            warn!("ONNX final inference produced no text");
        }
        result
    }

    fn reset(&mut self) -> Result<()> {
        self.accumulated.clear();
        Ok(())
    }
}

fn build_hann_window(n: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

fn build_mel_filters(fft_size: usize, sr: u32, n_mels: usize, fmin: f32, fmax: f32) -> Vec<Vec<f32>> {
    let n_freqs = fft_size / 2 + 1;
    let mel_min = hz_to_mel_slaney(fmin);
    let mel_max = hz_to_mel_slaney(fmax);

    let mel_pts: Vec<f32> = (0..=(n_mels + 1))
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .collect();
    let hz_pts: Vec<f32> = mel_pts.iter().map(|&m| mel_to_hz_slaney(m)).collect();
    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|k| k as f32 * sr as f32 / fft_size as f32)
        .collect();

    let mut filters = vec![vec![0f32; n_freqs]; n_mels];
    for m in 0..n_mels {
        let lower = hz_pts[m];
        let center = hz_pts[m + 1];
        let upper = hz_pts[m + 2];
        let down_denom = (center - lower).max(1e-10);
        let up_denom = (upper - center).max(1e-10);
        let enorm = 2.0 / (upper - lower).max(1e-10);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let w = if freq >= lower && freq <= center {
                (freq - lower) / down_denom
            } else if freq > center && freq <= upper {
                (upper - freq) / up_denom
            } else {
                0.0
            };
            filters[m][k] = (w * enorm).max(0.0);
        }
    }
    filters
}

fn normalize_rms_in_place(samples: &mut [f32], target_rms: f32) {
    if samples.is_empty() {
        return;
    }
    let sum_sq = samples.iter().map(|s| s * s).sum::<f32>();
    let rms = (sum_sq / samples.len() as f32).sqrt();
    if rms <= 1e-6 {
        return;
    }
    let gain = (target_rms / rms).clamp(0.8, 15.0);
    for s in samples.iter_mut() {
        *s = (*s * gain).clamp(-1.0, 1.0);
    }
}

fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if pad == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return vec![0.0; pad * 2];
    }
    let n = samples.len() as isize;
    let mut out = Vec::with_capacity(samples.len() + 2 * pad);
    for i in -(pad as isize)..(n + pad as isize) {
        out.push(samples[reflect_index(i, samples.len())]);
    }
    out
}

fn reflect_index(mut i: isize, len: usize) -> usize {
    let max = len as isize - 1;
    while i < 0 || i > max {
        i = if i < 0 { -i } else { 2 * max - i };
    }
    i as usize
}

fn hz_to_mel_slaney(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4_f32).ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz_slaney(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4_f32).ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_hz_round_trip_is_approximately_identity() {
        for hz in [0.0, 500.0, 1000.0, 4000.0, 8000.0] {
            let mel = hz_to_mel_slaney(hz);
            let back = mel_to_hz_slaney(mel);
            assert!((back - hz).abs() < 1.0, "hz={hz} back={back}");
        }
    }

    #[test]
    fn hann_window_is_symmetric_and_bounded() {
        let w = build_hann_window(400);
        assert_eq!(w.len(), 400);
        assert!(w.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((w[0] - w[399]).abs() < 1e-3);
    }

    #[test]
    fn mel_filterbank_has_expected_shape() {
        let filters = build_mel_filters(400, 16_000, 80, 0.0, 8_000.0);
        assert_eq!(filters.len(), 80);
        assert_eq!(filters[0].len(), 201);
    }
}
