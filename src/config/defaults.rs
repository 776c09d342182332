//! Defaults shared between CLI parsing and validation.

pub const DEFAULT_THRESHOLD: f32 = 0.01;
pub const DEFAULT_SILENCE_TAIL_MS: u64 = 1_000;
pub const DEFAULT_OUTPUT_DIR: &str = "recordings";
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

pub const MIN_QUEUE_CAPACITY: usize = 8;
pub const MAX_QUEUE_CAPACITY: usize = 1_024;
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;
pub const MAX_SILENCE_TAIL_MS: u64 = 60_000;
