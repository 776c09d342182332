//! Real-time capture and threshold-triggered segmentation pipeline.
//!
//! Audio is captured via CPAL, reduced to the selected channels, and fed
//! through bounded queues to the segment recorder, which watches the block
//! level and writes one WAV file per detected sound event. Everything the
//! audio callback touches is non-blocking; everything that may block (file
//! I/O, the silence timer) lives on the recorder thread.

use std::time::Duration;

/// Sample rate used when a device does not report a preferred one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Ceiling applied to level samples before they reach the display queue.
/// The trigger path compares against the unclipped peak.
pub const LEVEL_MAX: f32 = 1.0;

/// Poll interval for the recorder loop; bounds shutdown latency.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(100);

mod channel_map;
mod devices;
mod engine;
mod meter;
mod segmenter;
mod writer;

pub use channel_map::{resolve_channel_map, ChannelSelection};
pub use devices::{list_input_devices, InputDeviceInfo};
pub use engine::{AudioBlock, CaptureConfig, CaptureEngine, CaptureHandles, CaptureStats};
pub use meter::{block_peak, display_level};
pub use segmenter::{RecorderEvent, RecorderParams, SegmentRecorder};
pub use writer::{write_segment, RecordingSegment};
