//! The Recognizer Handle (§3, §4.4): a single polymorphic handle over two
//! Recognizer variants — In-Process and Coprocess — exposing the same
//! four-operation capability set: `process`, `final_`, `reset`, `close`.

use crate::audio::chunk::PcmChunk;
use crate::error::Result;

/// A parsed recognition result, per §3's data model.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionResult {
    /// An ongoing, unconfirmed hypothesis for the segment in progress.
    Partial { text: String },
    /// A committed hypothesis with ranked alternatives.
    Final { alternatives: Vec<Alternative> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub text: String,
    /// Absence means "unscored."
    pub confidence: Option<f32>,
}

impl RecognitionResult {
    /// The top alternative's `{text, confidence}`, if this is a `Final`.
    pub fn best_final(&self) -> Option<&Alternative> {
        match self {
            RecognitionResult::Final { alternatives } => alternatives.first(),
            RecognitionResult::Partial { .. } => None,
        }
    }
}

/// Contract implemented by any in-process streaming recognizer backend.
///
/// Mirrors the teacher's `SpeechModel` trait, generalized to the
/// `{process, final_, reset, close}` capability set so both In-Process and
/// Coprocess variants present an identical surface to the Engine Worker.
pub trait InProcessModel: Send + 'static {
    /// One-time warm-up: load weights, run a dummy inference to populate
    /// caches. Called once, on the Engine Worker thread, before first use —
    /// some native libraries pin state to their creating thread.
    fn warm_up(&mut self) -> Result<()>;

    /// Feed one chunk of audio. Returns `Some(Partial{..})` when the backend
    /// has an interim hypothesis ready, `None` otherwise.
    fn process(&mut self, chunk: &PcmChunk) -> Result<Option<RecognitionResult>>;

    /// Force a flush of the current segment. Returns the committed `Final`
    /// result, if any.
    fn final_(&mut self) -> Result<Option<RecognitionResult>>;

    /// Clear all internal decoder state between utterances.
    fn reset(&mut self) -> Result<()>;
}

/// The abstract Recognizer Handle (§3): `process(chunk) -> JSON, final() ->
/// JSON, reset(), close()`, over either an in-process model or a coprocess
/// child.
pub enum RecognizerHandle {
    InProcess(Box<dyn InProcessModel>),
    Coprocess(super::coprocess::CoprocessRecognizer),
}

impl RecognizerHandle {
    pub fn in_process<M: InProcessModel>(model: M) -> Result<Self> {
        let mut model: Box<dyn InProcessModel> = Box::new(model);
        model.warm_up()?;
        Ok(RecognizerHandle::InProcess(model))
    }

    pub fn process(&mut self, chunk: &PcmChunk) -> Result<Option<RecognitionResult>> {
        match self {
            RecognizerHandle::InProcess(model) => model.process(chunk),
            RecognizerHandle::Coprocess(child) => child.process(chunk),
        }
    }

    pub fn final_(&mut self) -> Result<Option<RecognitionResult>> {
        match self {
            RecognizerHandle::InProcess(model) => model.final_(),
            RecognizerHandle::Coprocess(child) => child.final_(),
        }
    }

    pub fn reset(&mut self) -> Result<()> {
        match self {
            RecognizerHandle::InProcess(model) => model.reset(),
            RecognizerHandle::Coprocess(child) => child.reset(),
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            RecognizerHandle::InProcess(_) => Ok(()),
            RecognizerHandle::Coprocess(child) => child.close(),
        }
    }
}

impl std::fmt::Debug for RecognizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizerHandle::InProcess(_) => f.write_str("RecognizerHandle::InProcess(..)"),
            RecognizerHandle::Coprocess(_) => f.write_str("RecognizerHandle::Coprocess(..)"),
        }
    }
}
