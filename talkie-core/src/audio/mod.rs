//! Ring Transport & Capture Source (§4.1).
//!
//! `ring` is the lock-free SPSC byte transport; `capture` wires a cpal input
//! stream's RT callback directly into the ring's producer half; `device`
//! enumerates input devices for preference matching and diagnostics;
//! `resample` bridges device-native rate to the pipeline's negotiated rate
//! `S` on the non-RT Audio Worker thread.

pub mod capture;
pub mod chunk;
pub mod device;
pub mod resample;
pub mod ring;

pub use capture::AudioCapture;
pub use chunk::PcmChunk;
pub use ring::{create_pcm_ring, PcmConsumer, PcmProducer, RingStats};
