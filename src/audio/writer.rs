//! Segment persistence: reconcile block shapes and write one WAV per segment.

use super::engine::AudioBlock;
use crate::error::SaveError;
use crate::log_debug;
use hound::{SampleFormat, WavSpec, WavWriter};
use jiff::Zoned;
use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

/// One contiguous recorded event, trigger to silence tail, plus the sample
/// rate in effect when collection began. Owned by the recorder until it is
/// handed here and consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSegment {
    pub blocks: Vec<AudioBlock>,
    pub sample_rate: u32,
}

impl RecordingSegment {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            blocks: Vec::new(),
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Write a finished segment as 32-bit float PCM WAV under `output_dir`,
/// creating the directory when missing. Returns `Ok(None)` for an empty
/// segment and the final path otherwise.
///
/// The target channel count comes from the first block. Blocks whose channel
/// count differs are normalized on the way out: a mono block is duplicated
/// into both stereo channels, a stereo block contributes only its first
/// channel. A live channel-map change mid-segment therefore degrades the
/// image instead of corrupting the file.
pub fn write_segment(
    segment: &RecordingSegment,
    output_dir: &Path,
) -> Result<Option<PathBuf>, SaveError> {
    let Some(first) = segment.blocks.first() else {
        return Ok(None);
    };
    let channels = first.channels.max(1);

    fs::create_dir_all(output_dir).map_err(|source| SaveError::CreateDir {
        dir: output_dir.to_path_buf(),
        source,
    })?;

    let timestamp = Zoned::now().strftime("%Y%m%d_%H%M%S").to_string();
    let path = output_dir.join(format!("recording_{timestamp}.wav"));

    let spec = WavSpec {
        channels: channels as u16,
        sample_rate: segment.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let encode_err = |source| SaveError::Encode {
        path: path.clone(),
        source,
    };

    let mut wav = WavWriter::create(&path, spec).map_err(encode_err)?;
    for block in &segment.blocks {
        write_block(&mut wav, block, channels).map_err(encode_err)?;
    }
    wav.finalize().map_err(encode_err)?;

    log_debug(&format!(
        "saved segment: {} ({} blocks, {} ch, {} Hz)",
        path.display(),
        segment.blocks.len(),
        channels,
        segment.sample_rate
    ));
    Ok(Some(path))
}

fn write_block<W>(
    wav: &mut WavWriter<W>,
    block: &AudioBlock,
    target_channels: usize,
) -> Result<(), hound::Error>
where
    W: Write + Seek,
{
    let source_channels = block.channels.max(1);
    if source_channels == target_channels {
        for &sample in &block.samples {
            wav.write_sample(sample)?;
        }
        return Ok(());
    }

    // Channel-count drift inside one segment: rebuild every frame against the
    // first block's layout. Missing channels repeat the frame's first sample,
    // surplus channels are dropped.
    for frame in block.samples.chunks(source_channels) {
        let first = frame[0];
        for channel in 0..target_channels {
            wav.write_sample(frame.get(channel).copied().unwrap_or(first))?;
        }
    }
    Ok(())
}
