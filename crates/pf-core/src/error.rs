//! Error types for Playfield

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum PfError {
    #[error("Unknown switch: {0}")]
    UnknownSwitch(String),

    #[error("Unknown lamp: {0}")]
    UnknownLamp(String),

    #[error("Unknown coil: {0}")]
    UnknownCoil(String),

    #[error("Unknown mode: #{0}")]
    UnknownMode(usize),

    #[error("Invalid event name: {0}")]
    InvalidEvent(String),

    #[error("Duplicate handler for {0}")]
    DuplicateHandler(String),

    #[error("Service not installed: {0}")]
    MissingService(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Game error: {0}")]
    Game(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type PfResult<T> = Result<T, PfError>;
