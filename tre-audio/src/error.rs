//! Error types for tre-audio
//!
//! Construction failures and invariant violations surface as `Error`; transient
//! decode conditions and platform call failures are handled where they occur.

use crate::platform::PlatformError;
use thiserror::Error;

/// Main error type for the audio engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] tre_common::Error),

    /// Audio decoding errors (probe, codec creation, unrecoverable packets)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Resampler construction or processing errors
    #[error("Resample error: {0}")]
    Resample(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// A platform call failed where the failure cannot be ignored
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Internal bookkeeping no longer matches the platform state
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Malformed RIFF/WAVE data
    #[error("Invalid WAV data: {0}")]
    InvalidWav(String),

    /// Invalid argument passed by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using tre-audio Error
pub type Result<T> = std::result::Result<T, Error>;
