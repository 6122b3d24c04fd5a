//! # talkie-core
//!
//! The real-time audio → text pipeline: lock-free capture, VAD/utterance
//! segmentation, a swappable recognizer abstraction (in-process or
//! coprocess), adaptive confidence gating, and text post-processing.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → Capture (RT callback) → Ring → Audio Worker
//!                                                 │ (VAD, lookback, utterance FSM)
//!                                                 ▼
//!                                          Engine Worker (Recognizer Handle)
//!                                                 │ (partial / final JSON)
//!                                                 ▼
//!                                          Result Dispatcher
//!                                      (threshold gate, post-processing)
//!                                                 │
//!                                        KeystrokeSink / GuiSink
//! ```
//!
//! The capture callback only ever writes to the ring and posts a wakeup; all
//! allocation and blocking work happens on the Audio Worker and Engine
//! Worker threads, kept off the real-time audio path.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod ipc;
pub mod pipeline;
pub mod sink;
pub mod text;
pub mod threshold;
pub mod worker;

pub use config::{PipelineConfig, SpeechEngine};
pub use control::RunFlag;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineHandles};
pub use sink::{GuiSink, KeystrokeSink, NullGuiSink, NullKeystrokeSink};
