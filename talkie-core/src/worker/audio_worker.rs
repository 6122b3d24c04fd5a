//! The Audio Worker thread and its utterance state machine (§4.2).
//!
//! Runs entirely off the real-time path: it blocks on the ring's wakeup
//! with a 100ms timeout, accumulates bytes into aligned chunks, and for
//! each chunk computes energy, updates the Threshold Controller, pushes
//! onto the Lookback Buffer, and (while transcribing) drives the
//! Idle/Active utterance state machine that commands the Engine Worker.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::chunk::PcmChunk;
use crate::audio::ring::PcmConsumer;
use crate::config::PipelineConfig;
use crate::control::RunFlag;
use crate::engine::worker::EngineHandle;
use crate::sink::GuiSink;
use crate::threshold::ThresholdController;
use crate::worker::lookback::LookbackBuffer;

/// Minimum interval between `GuiSink::set_energy` posts (§6: "≤5 Hz").
const ENERGY_POST_INTERVAL: Duration = Duration::from_millis(200);
/// How long `recv_timeout` blocks per iteration; also the worker's
/// cancellation re-evaluation cadence (§4.1).
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UtteranceState {
    Idle,
    Active,
}

struct Utterance {
    state: UtteranceState,
    start_time: Instant,
    last_voice_time: Instant,
}

impl Utterance {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            state: UtteranceState::Idle,
            start_time: now,
            last_voice_time: now,
        }
    }
}

/// A handle to a running Audio Worker thread.
pub struct AudioWorkerHandle {
    running: Arc<AtomicBool>,
    /// Bit pattern of the latest observed chunk energy (`f32::to_bits`),
    /// read by the Result Dispatcher's confidence gate.
    latest_energy: Arc<AtomicU32>,
    join: Option<JoinHandle<()>>,
}

/// A cheap, cloneable read-only handle to the Audio Worker's most recently
/// observed chunk energy — handed to the Result Dispatcher so it can read
/// `current_energy` without holding onto the whole [`AudioWorkerHandle`].
#[derive(Clone)]
pub struct EnergyReader(Arc<AtomicU32>);

impl EnergyReader {
    pub fn read(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

impl AudioWorkerHandle {
    pub fn latest_energy(&self) -> f32 {
        f32::from_bits(self.latest_energy.load(Ordering::Relaxed))
    }

    pub fn energy_reader(&self) -> EnergyReader {
        EnergyReader(Arc::clone(&self.latest_energy))
    }

    /// Signal the worker to stop and block until it exits.
    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawn the Audio Worker thread.
///
/// `engine` is behind a `parking_lot::Mutex` so the Pipeline can hot-swap
/// the Engine Worker handle on an engine/model change (§3: "a changed
/// `model` or `engine` triggers a teardown+rebuild of the Engine Worker");
/// the swap takes effect on the next chunk boundary, never mid-chunk.
#[allow(clippy::too_many_arguments)]
pub fn spawn(
    mut consumer: PcmConsumer,
    config: PipelineConfig,
    threshold: Arc<Mutex<ThresholdController>>,
    engine: Arc<Mutex<EngineHandle>>,
    run_flag: Arc<RunFlag>,
    gui: Arc<dyn GuiSink>,
) -> AudioWorkerHandle {
    let running = Arc::new(AtomicBool::new(true));
    let latest_energy = Arc::new(AtomicU32::new(0));

    let running_thread = Arc::clone(&running);
    let latest_energy_thread = Arc::clone(&latest_energy);

    let join = std::thread::spawn(move || {
        let bytes_per_chunk = config.bytes_per_chunk();
        let sample_rate = config.sample_rate;
        let mut lookback = LookbackBuffer::new(config.lookback_chunks());
        let mut pending: Vec<u8> = Vec::with_capacity(bytes_per_chunk * 2);
        let mut raw: Vec<u8> = Vec::new();
        let mut utterance = Utterance::new();
        let mut last_energy_post = Instant::now() - ENERGY_POST_INTERVAL;
        let mut was_transcribing = run_flag.get();

        info!(bytes_per_chunk, sample_rate, "audio worker started");

        while running_thread.load(Ordering::Acquire) {
            raw.clear();
            let read = consumer.recv_timeout(&mut raw, RECV_TIMEOUT);
            if read == 0 {
                continue;
            }
            pending.extend_from_slice(&raw);

            let transcribing = run_flag.get();
            if transcribing && !was_transcribing {
                // false→true edge (§4.6): clear lookback, reset utterance
                // state, reset recognizer.
                lookback.clear();
                utterance = Utterance::new();
                engine.lock().reset().ok();
            } else if !transcribing && was_transcribing {
                // true→false edge: drop pending work, reset recognizer.
                utterance.state = UtteranceState::Idle;
                engine.lock().reset().ok();
            }
            was_transcribing = transcribing;

            while pending.len() >= bytes_per_chunk {
                let chunk_bytes: Vec<u8> = pending.drain(..bytes_per_chunk).collect();
                let chunk = PcmChunk::from_bytes(chunk_bytes, sample_rate);
                process_chunk(
                    chunk,
                    &config,
                    &threshold,
                    &engine,
                    &gui,
                    &mut lookback,
                    &mut utterance,
                    transcribing,
                    &latest_energy_thread,
                    &mut last_energy_post,
                );
            }
        }

        info!("audio worker stopped");
    });

    AudioWorkerHandle {
        running,
        latest_energy,
        join: Some(join),
    }
}

#[allow(clippy::too_many_arguments)]
fn process_chunk(
    chunk: PcmChunk,
    config: &PipelineConfig,
    threshold: &Arc<Mutex<ThresholdController>>,
    engine: &Arc<Mutex<EngineHandle>>,
    gui: &Arc<dyn GuiSink>,
    lookback: &mut LookbackBuffer,
    utterance: &mut Utterance,
    transcribing: bool,
    latest_energy: &Arc<AtomicU32>,
    last_energy_post: &mut Instant,
) {
    let energy = chunk.energy();
    latest_energy.store(energy.to_bits(), Ordering::Relaxed);

    let is_speech = {
        let mut guard = threshold.lock();
        guard.observe(energy);
        guard.is_speech(energy)
    };

    if last_energy_post.elapsed() >= ENERGY_POST_INTERVAL {
        gui.set_energy(energy);
        *last_energy_post = Instant::now();
    }

    lookback.push(chunk.clone());

    if !transcribing {
        return;
    }

    match utterance.state {
        UtteranceState::Idle => {
            if is_speech {
                let now = Instant::now();
                utterance.start_time = now;
                utterance.last_voice_time = now;
                let handle = engine.lock().clone();
                for queued in lookback.drain_in_order() {
                    handle.process_async(queued);
                }
                utterance.state = UtteranceState::Active;
                debug!("utterance opened");
            }
        }
        UtteranceState::Active => {
            let handle = engine.lock().clone();
            handle.process_async(chunk);
            if is_speech {
                utterance.last_voice_time = Instant::now();
            }
            let silence_elapsed = utterance.last_voice_time.elapsed().as_secs_f32();
            if silence_elapsed >= config.silence_seconds {
                let duration = utterance
                    .last_voice_time
                    .duration_since(utterance.start_time)
                    .as_secs_f32();
                let discard = duration < config.min_duration;
                handle.final_async(discard);
                debug!(duration, discard, "utterance closed");
                utterance.state = UtteranceState::Idle;
                lookback.clear();
            }
        }
    }
}
