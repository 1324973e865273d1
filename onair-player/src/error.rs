//! Error types for onair-player
//!
//! Errors never cross the engine boundary as panics: the engine converts
//! every failure here into state (a counted error, a logged warning or a
//! scheduled recovery). These types surface to callers only from setup code
//! (config, builder) and from handle methods when the engine is gone.

use std::time::Duration;
use thiserror::Error;

/// Main error type for onair-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying player rejected a command
    #[error("Player error: {0}")]
    Player(String),

    /// Underlying player did not answer within the command timeout
    #[error("Player command '{command}' timed out after {timeout:?}")]
    PlayerTimeout {
        command: &'static str,
        timeout: Duration,
    },

    /// Connectivity probe failure (unreachable or timed out)
    #[error("Connectivity probe failed: {0}")]
    Probe(String),

    /// Remote config collaborator failure
    #[error("Remote config error: {0}")]
    RemoteConfig(String),

    /// Telemetry sink unavailable or rejected the event
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Platform bridge call failed (wake lock)
    #[error("Platform bridge error: {0}")]
    Platform(String),

    /// The engine actor has been disposed
    #[error("Playback engine is closed")]
    EngineClosed,

    /// HTTP client or server errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] onair_common::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e.to_string())
    }
}

/// Convenience Result type using onair-player Error
pub type Result<T> = std::result::Result<T, Error>;
