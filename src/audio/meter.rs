//! Block level metering.
//!
//! The display path and the trigger path intentionally see different values:
//! `block_peak` is the raw peak the recorder compares against the threshold,
//! while the level queue carries the `LEVEL_MAX`-clipped copy so a hot input
//! cannot blow out the meter display.

use super::LEVEL_MAX;

/// Peak absolute sample magnitude across every mapped channel of one block.
pub fn block_peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
}

/// Clip a peak for delivery to the display queue.
pub fn display_level(peak: f32) -> f32 {
    peak.min(LEVEL_MAX)
}
