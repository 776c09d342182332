//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_OUTPUT_DIR, DEFAULT_QUEUE_CAPACITY, DEFAULT_SILENCE_TAIL_MS, DEFAULT_THRESHOLD,
    MAX_QUEUE_CAPACITY, MAX_SAMPLE_RATE, MAX_SILENCE_TAIL_MS, MIN_QUEUE_CAPACITY, MIN_SAMPLE_RATE,
};

/// CLI options for the autosampler. Validated values keep the audio threads
/// and the writer safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Threshold-triggered audio auto sampler", author, version)]
pub struct AppConfig {
    /// Input device index as printed by --list-input-devices (defaults to the
    /// first input device)
    #[arg(long = "device", value_name = "INDEX")]
    pub device_index: Option<usize>,

    /// First input channel to capture, 1-based as printed on the hardware
    #[arg(long = "input", default_value_t = 1, value_name = "CHANNEL")]
    pub input_channel: usize,

    /// Capture the stereo pair starting at --input instead of a mono channel
    #[arg(long, default_value_t = false)]
    pub stereo: bool,

    /// Sample rate override in Hz (defaults to the device's preferred rate)
    #[arg(long = "sample-rate", value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Trigger threshold as peak amplitude, 0 < t <= 1
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    /// Silence duration that ends a segment (milliseconds)
    #[arg(long = "silence-ms", default_value_t = DEFAULT_SILENCE_TAIL_MS)]
    pub silence_ms: u64,

    /// Directory where finished segments are written (created if missing)
    #[arg(
        long = "output-dir",
        default_value = DEFAULT_OUTPUT_DIR,
        value_parser = |s: &str| -> Result<PathBuf, std::convert::Infallible> { Ok(PathBuf::from(s)) }
    )]
    pub output_dir: PathBuf,

    /// Play the mapped input back through the default output device
    #[arg(long, default_value_t = false)]
    pub monitor: bool,

    /// Capacity of the block and level queues between the audio callback and
    /// its consumers
    #[arg(long = "queue-capacity", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Stop after this many seconds (runs until Enter is pressed otherwise)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<u64>,

    /// Print a text level meter while running
    #[arg(long, default_value_t = false)]
    pub meter: bool,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "AUTOSAMPLER_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "AUTOSAMPLER_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,
}
