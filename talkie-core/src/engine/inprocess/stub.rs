//! `StubModel` — an always-available in-process recognizer used as the
//! default `speech_engine` until a real model/library is configured, and as
//! the test double for exercising the rest of the pipeline end-to-end.

use crate::audio::chunk::PcmChunk;
use crate::engine::recognizer::{Alternative, InProcessModel, RecognitionResult};
use crate::error::Result;
use tracing::debug;

pub struct StubModel {
    accumulated_frames: usize,
    utterance_count: u32,
}

impl StubModel {
    pub fn new() -> Self {
        Self {
            accumulated_frames: 0,
            utterance_count: 0,
        }
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessModel for StubModel {
    fn warm_up(&mut self) -> Result<()> {
        debug!("StubModel::warm_up — no-op");
        Ok(())
    }

    fn process(&mut self, chunk: &PcmChunk) -> Result<Option<RecognitionResult>> {
        if chunk.is_empty() {
            return Ok(None);
        }
        self.accumulated_frames += chunk.frame_count();
        Ok(Some(RecognitionResult::Partial {
            text: "\u{2026}".to_string(),
        }))
    }

    fn final_(&mut self) -> Result<Option<RecognitionResult>> {
        if self.accumulated_frames == 0 {
            return Ok(None);
        }
        self.utterance_count += 1;
        let text = format!("[stub: {} frames]", self.accumulated_frames);
        self.accumulated_frames = 0;
        Ok(Some(RecognitionResult::Final {
            alternatives: vec![Alternative {
                text,
                confidence: Some(1_000.0),
            }],
        }))
    }

    fn reset(&mut self) -> Result<()> {
        debug!("StubModel::reset");
        self.accumulated_frames = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(frames: usize) -> PcmChunk {
        PcmChunk::from_bytes(vec![0u8; frames * 2], 16_000)
    }

    #[test]
    fn empty_chunk_produces_no_partial() {
        let mut model = StubModel::new();
        assert!(model.process(&chunk(0)).unwrap().is_none());
    }

    #[test]
    fn final_without_prior_process_is_none() {
        let mut model = StubModel::new();
        assert!(model.final_().unwrap().is_none());
    }

    #[test]
    fn process_then_final_emits_frame_count() {
        let mut model = StubModel::new();
        model.process(&chunk(1600)).unwrap();
        model.process(&chunk(800)).unwrap();
        let result = model.final_().unwrap().unwrap();
        match result {
            RecognitionResult::Final { alternatives } => {
                assert_eq!(alternatives[0].text, "[stub: 2400 frames]");
            }
            _ => panic!("expected Final"),
        }
    }
}
