use thiserror::Error;

/// CLI-level errors layered on top of [`talkie_core::Error`] (§7: "adds its
/// own thin `AppError` for CLI-level concerns").
#[derive(Debug, Error)]
pub enum AppError {
    #[error("state file error: {0}")]
    StateFile(String),

    #[error("config file error: {0}")]
    ConfigFile(String),

    #[error("another talkie instance is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Core(#[from] talkie_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
