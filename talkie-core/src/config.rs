//! The read-mostly configuration snapshot shared by every component.
//!
//! A [`PipelineConfig`] is built once (by the application crate, from the
//! config file) and handed to the pipeline at construction time. Components
//! that need an exact snapshot for the lifetime of an in-progress utterance
//! (e.g. `silence_seconds`) clone the value they need rather than read
//! through a shared reference, so a config change mid-utterance cannot
//! change its behavior underneath it.

use serde::{Deserialize, Serialize};

/// Which speech recognition engine backs the Recognizer Handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechEngine {
    Vosk,
    Sherpa,
    FasterWhisper,
}

impl Default for SpeechEngine {
    fn default() -> Self {
        SpeechEngine::Vosk
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sample_rate: u32,
    pub frames_per_buffer: u32,
    pub device: Option<String>,
    pub speech_engine: SpeechEngine,
    pub confidence_threshold: f32,
    pub silence_seconds: f32,
    pub lookback_seconds: f32,
    pub min_duration: f32,
    pub audio_threshold_multiplier: f32,
    pub noise_floor_percentile: u8,
    pub speech_floor_percentile: u8,
    pub speech_min_multiplier: f32,
    pub speech_max_multiplier: f32,
    pub max_confidence_penalty: f32,
    /// Engine-specific knobs (beam width, model path, max alternatives, ...)
    /// that do not warrant a dedicated field; forwarded verbatim to whichever
    /// Recognizer variant is constructed.
    pub engine_options: serde_json::Value,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            sample_rate: 16_000,
            frames_per_buffer: 1_600,
            device: None,
            speech_engine: SpeechEngine::default(),
            confidence_threshold: 200.0,
            silence_seconds: 1.2,
            lookback_seconds: 0.5,
            min_duration: 0.3,
            audio_threshold_multiplier: 1.5,
            noise_floor_percentile: 10,
            speech_floor_percentile: 70,
            speech_min_multiplier: 0.5,
            speech_max_multiplier: 2.0,
            max_confidence_penalty: 150.0,
            engine_options: serde_json::Value::Null,
        }
    }
}

impl PipelineConfig {
    /// Number of lookback chunks, `round(lookback_seconds * 10)` per §3 — a
    /// chunk is nominally 100ms, so this is lookback_seconds in deci-seconds.
    pub fn lookback_chunks(&self) -> usize {
        (self.lookback_seconds * 10.0).round().max(0.0) as usize
    }

    /// Bytes per PCM chunk: `2 * round(S * 0.1)` per §4.2.
    pub fn bytes_per_chunk(&self) -> usize {
        2 * (self.sample_rate as f32 * 0.1).round() as usize
    }

    /// Frames (samples) per PCM chunk.
    pub fn frames_per_chunk(&self) -> usize {
        (self.sample_rate as f32 * 0.1).round() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.bytes_per_chunk(), 2 * cfg.frames_per_chunk());
        assert!(cfg.lookback_chunks() > 0);
    }

    #[test]
    fn bytes_per_chunk_matches_spec_formula() {
        let mut cfg = PipelineConfig::default();
        cfg.sample_rate = 16_000;
        assert_eq!(cfg.frames_per_chunk(), 1_600);
        assert_eq!(cfg.bytes_per_chunk(), 3_200);
    }

    #[test]
    fn engine_enum_round_trips_as_kebab_case() {
        let json = serde_json::to_string(&SpeechEngine::FasterWhisper).unwrap();
        assert_eq!(json, "\"faster-whisper\"");
        let back: SpeechEngine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SpeechEngine::FasterWhisper);
    }
}
