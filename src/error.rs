//! Error taxonomy for the capture core.
//!
//! None of these are fatal to the process: a `DeviceError` leaves the stream
//! closed for the caller to retry, a `SaveError` discards one segment and the
//! recorder keeps listening, and a `ConfigError` is rejected before any
//! stream opens.

use std::path::PathBuf;
use thiserror::Error;

/// Stream open or reconfiguration failure. Never retried automatically.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio input devices available")]
    NoInputDevices,

    #[error("no input device at index {0}")]
    NotFound(usize),

    #[error("failed to enumerate input devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query '{device}': {source}")]
    Query {
        device: String,
        #[source]
        source: cpal::DefaultStreamConfigError,
    },

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to open stream on '{device}': {source}")]
    Open {
        device: String,
        #[source]
        source: cpal::BuildStreamError,
    },

    #[error("failed to start stream on '{device}': {source}")]
    Start {
        device: String,
        #[source]
        source: cpal::PlayStreamError,
    },
}

/// I/O failure while persisting a finished segment. The in-memory segment is
/// discarded; retrying a write that failed for a persistent reason would just
/// repeat the failure.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to create output directory '{dir}': {source}")]
    CreateDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write '{path}': {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
}

/// Invalid configuration, rejected before a stream is opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConfigError(pub String);
