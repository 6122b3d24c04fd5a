use thiserror::Error;

/// All errors produced by talkie-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("unsupported sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("engine init failed: {detail}")]
    EngineInit { detail: String },

    #[error("engine fatal: {detail}")]
    EngineFatal { detail: String },

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("coprocess did not acknowledge startup within the configured timeout")]
    CoprocessHandshakeTimeout,

    #[error("coprocess protocol error: {detail}")]
    CoprocessProtocol { detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
