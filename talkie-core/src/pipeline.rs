//! Top-level wiring (§5): owns every long-lived thread and the shared
//! handles that tie the Ring Transport, Audio Worker, Engine Worker, and
//! Result Dispatcher together.
//!
//! `Pipeline::start` is the single place that decides how the pieces fit;
//! everything it calls is otherwise independently testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::info;

use crate::audio::capture::AudioCapture;
use crate::audio::ring::create_pcm_ring;
use crate::config::{PipelineConfig, SpeechEngine};
use crate::control::RunFlag;
use crate::dispatch::ResultDispatcher;
use crate::engine::coprocess::CoprocessRecognizer;
use crate::engine::inprocess::StubModel;
use crate::engine::recognizer::RecognizerHandle;
use crate::engine::worker::{self, EngineEvent, EngineHandle};
use crate::error::{Error, Result};
use crate::sink::{GuiSink, KeystrokeSink};
use crate::threshold::{ThresholdConfig, ThresholdController};
use crate::worker::audio_worker::{self, AudioWorkerHandle};

/// Everything a caller needs to keep a running pipeline alive and tear it
/// down cleanly. Dropping this without calling [`Pipeline::shutdown`] just
/// leaks the threads (they'll run until the process exits) — always call
/// `shutdown` explicitly.
pub struct Pipeline {
    config: PipelineConfig,
    run_flag: Arc<RunFlag>,
    threshold: Arc<Mutex<ThresholdController>>,
    engine: Arc<Mutex<EngineHandle>>,
    /// Kept so [`Pipeline::swap_engine`] can hand the replacement worker the
    /// same sending half the dispatch thread's `event_rx` was built from —
    /// otherwise a swapped-in engine's events have nowhere to go.
    event_tx: crossbeam_channel::Sender<EngineEvent>,
    audio_worker: Option<AudioWorkerHandle>,
    capture_running: Arc<AtomicBool>,
    capture_thread: Option<JoinHandle<()>>,
    dispatch_running: Arc<AtomicBool>,
    dispatch_thread: Option<JoinHandle<()>>,
}

/// The handles a caller typically wants to hold onto after `start` beyond
/// the `Pipeline` itself — re-exported at the crate root for convenience.
pub type PipelineHandles = Pipeline;

impl Pipeline {
    /// Build the Recognizer Handle for the configured engine (§3: "a
    /// changed `model` or `engine` triggers a teardown+rebuild").
    ///
    /// `faster-whisper` runs in-process via the ONNX recognizer when the
    /// `onnx` feature is enabled and `engine_options.model_dir` is set;
    /// every other combination — `vosk`, `sherpa`, or a `faster-whisper`
    /// config with no local model directory — spawns a coprocess, since
    /// this crate carries no native Vosk/Sherpa bindings.
    fn build_recognizer(config: &PipelineConfig) -> Result<RecognizerHandle> {
        #[cfg(feature = "onnx")]
        if config.speech_engine == SpeechEngine::FasterWhisper {
            if let Some(dir) = config
                .engine_options
                .get("model_dir")
                .and_then(|v| v.as_str())
            {
                let onnx_config =
                    crate::engine::inprocess::OnnxModelConfig::from_model_dir(std::path::Path::new(dir));
                let model = crate::engine::inprocess::OnnxModel::new(onnx_config);
                return RecognizerHandle::in_process(model);
            }
        }

        let default_program = match config.speech_engine {
            SpeechEngine::Vosk => "talkie-vosk-coprocess",
            SpeechEngine::Sherpa => "talkie-sherpa-coprocess",
            SpeechEngine::FasterWhisper => "talkie-faster-whisper-coprocess",
        };
        let program = config
            .engine_options
            .get("program")
            .and_then(|v| v.as_str())
            .unwrap_or(default_program)
            .to_string();
        let args: Vec<String> = config
            .engine_options
            .get("args")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let model_path = config
            .engine_options
            .get("model_path")
            .and_then(|v| v.as_str())
            .map(std::path::PathBuf::from)
            .ok_or_else(|| {
                Error::Config("engine_options.model_path is required for a coprocess engine".into())
            })?;

        let child = CoprocessRecognizer::spawn(&program, &args, &model_path)?;
        Ok(RecognizerHandle::Coprocess(child))
    }

    /// Build a recognizer that never touches the filesystem or spawns a
    /// process — used when the caller only wants to exercise the pipeline
    /// wiring (tests, `--dry-run`-style invocations).
    fn build_stub_recognizer() -> Result<RecognizerHandle> {
        RecognizerHandle::in_process(StubModel::new())
    }

    /// Start every long-lived thread: capture, Audio Worker, Engine
    /// Worker, and the Result Dispatcher loop.
    pub fn start(
        config: PipelineConfig,
        run_flag: Arc<RunFlag>,
        keystrokes: Arc<dyn KeystrokeSink>,
        gui: Arc<dyn GuiSink>,
    ) -> Result<Self> {
        Self::start_with_recognizer(config, run_flag, keystrokes, gui, Self::build_recognizer)
    }

    /// Same as [`Pipeline::start`] but with an in-process stub recognizer
    /// that never spawns a process or touches the filesystem — intended
    /// for headless smoke-testing the wiring itself.
    pub fn start_stub(
        config: PipelineConfig,
        run_flag: Arc<RunFlag>,
        keystrokes: Arc<dyn KeystrokeSink>,
        gui: Arc<dyn GuiSink>,
    ) -> Result<Self> {
        Self::start_with_recognizer(config, run_flag, keystrokes, gui, |_| {
            Self::build_stub_recognizer()
        })
    }

    fn start_with_recognizer(
        config: PipelineConfig,
        run_flag: Arc<RunFlag>,
        keystrokes: Arc<dyn KeystrokeSink>,
        gui: Arc<dyn GuiSink>,
        build: impl FnOnce(&PipelineConfig) -> Result<RecognizerHandle>,
    ) -> Result<Self> {
        let (producer, consumer) = create_pcm_ring(config.sample_rate);

        let threshold = Arc::new(Mutex::new(ThresholdController::new(ThresholdConfig::from(
            &config,
        ))));

        let (event_tx, event_rx) = crossbeam_channel::unbounded::<EngineEvent>();
        let recognizer = build(&config)?;
        let event_tx_worker = event_tx.clone();
        let (engine_handle, _engine_join) = worker::spawn(recognizer, move |event| {
            if event_tx_worker.send(event).is_err() {
                // Result Dispatcher thread has already shut down.
            }
        });
        let engine = Arc::new(Mutex::new(engine_handle));

        let audio_worker = audio_worker::spawn(
            consumer,
            config.clone(),
            Arc::clone(&threshold),
            Arc::clone(&engine),
            Arc::clone(&run_flag),
            Arc::clone(&gui),
        );

        let capture_running = Arc::new(AtomicBool::new(true));
        let capture_thread = Self::spawn_capture_thread(
            producer,
            Arc::clone(&capture_running),
            config.device.clone(),
        );

        let energy_reader = audio_worker.energy_reader();
        let dispatch_running = Arc::new(AtomicBool::new(true));
        let dispatch_thread = Self::spawn_dispatch_thread(
            event_rx,
            Arc::clone(&threshold),
            keystrokes,
            gui,
            energy_reader,
            Arc::clone(&dispatch_running),
        );

        Ok(Self {
            config,
            run_flag,
            threshold,
            engine,
            event_tx,
            audio_worker: Some(audio_worker),
            capture_running,
            capture_thread: Some(capture_thread),
            dispatch_running,
            dispatch_thread: Some(dispatch_thread),
        })
    }

    /// `cpal::Stream` is `!Send`, so the stream must be created and
    /// dropped on the same dedicated thread; this thread does nothing else
    /// but hold that stream open until `capture_running` is cleared.
    fn spawn_capture_thread(
        producer: crate::audio::ring::PcmProducer,
        capture_running: Arc<AtomicBool>,
        preferred_device: Option<String>,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || {
            let stream_running = Arc::new(AtomicBool::new(true));
            let capture = AudioCapture::open_with_preference(
                producer,
                Arc::clone(&stream_running),
                preferred_device.as_deref(),
            );
            let capture = match capture {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "failed to open audio capture");
                    return;
                }
            };
            while capture_running.load(Ordering::Acquire) {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            capture.stop();
            info!("audio capture stopped");
        })
    }

    fn spawn_dispatch_thread(
        event_rx: crossbeam_channel::Receiver<EngineEvent>,
        threshold: Arc<Mutex<ThresholdController>>,
        keystrokes: Arc<dyn KeystrokeSink>,
        gui: Arc<dyn GuiSink>,
        energy_reader: audio_worker::EnergyReader,
        dispatch_running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        std::thread::spawn(move || {
            let mut dispatcher = ResultDispatcher::new(threshold, keystrokes, gui);
            while dispatch_running.load(Ordering::Acquire) {
                match event_rx.recv_timeout(std::time::Duration::from_millis(100)) {
                    Ok(event) => dispatcher.handle(event, energy_reader.read()),
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                    Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                }
            }
        })
    }

    /// The config this pipeline was started with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The Run Flag controlling whether the Audio Worker forwards chunks.
    pub fn run_flag(&self) -> &Arc<RunFlag> {
        &self.run_flag
    }

    /// Teardown+rebuild the Engine Worker for a new engine/model config
    /// (§3's "a changed `model` or `engine` triggers a teardown+rebuild of
    /// the Engine Worker"). Takes effect on the Audio Worker's next chunk
    /// boundary, never mid-chunk, since the swap happens under the same
    /// `Mutex<EngineHandle>` the Audio Worker already locks per chunk.
    pub fn swap_engine(&self, config: &PipelineConfig) -> Result<()> {
        let old = {
            let mut guard = self.engine.lock();
            let event_tx = self.event_tx.clone();
            let recognizer = Self::build_recognizer(config)?;
            let (new_handle, _join) = worker::spawn(recognizer, move |event| {
                let _ = event_tx.send(event);
            });
            std::mem::replace(&mut *guard, new_handle)
        };
        old.close()?;
        Ok(())
    }

    /// Stop every thread this pipeline owns, in dependency order: capture
    /// first (so no more bytes enter the ring), then the Audio Worker
    /// (drains what's left and stops posting to the Engine Worker), then
    /// the Engine Worker, then the dispatch loop.
    pub fn shutdown(mut self) {
        self.capture_running.store(false, Ordering::Release);
        if let Some(join) = self.capture_thread.take() {
            let _ = join.join();
        }
        if let Some(worker) = self.audio_worker.take() {
            worker.shutdown();
        }
        if let Err(e) = self.engine.lock().close() {
            tracing::warn!(error = %e, "engine worker close reported an error");
        }
        self.dispatch_running.store(false, Ordering::Release);
        if let Some(join) = self.dispatch_thread.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{NullGuiSink, NullKeystrokeSink};

    #[test]
    fn stub_pipeline_starts_and_shuts_down_cleanly() {
        let config = PipelineConfig::default();
        let run_flag = RunFlag::new(false, |_| {});
        let pipeline = Pipeline::start_stub(
            config,
            run_flag,
            Arc::new(NullKeystrokeSink),
            Arc::new(NullGuiSink),
        )
        .expect("stub pipeline should start headless");
        pipeline.shutdown();
    }
}
