//! The Audio Worker (§4.2): drains the Ring Transport into aligned PCM
//! chunks, computes energy, drives the VAD/utterance state machine via the
//! Threshold Controller, and commands the Engine Worker.

pub mod audio_worker;
pub mod lookback;

pub use audio_worker::{spawn, AudioWorkerHandle, EnergyReader};
pub use lookback::LookbackBuffer;
