//! Capture engine: owns the CPAL streams and the real-time callback contract.
//!
//! The input callback only converts, maps, and pushes. Every queue it touches
//! is bounded and pushed with `try_send`, so the callback completes in bounded
//! time no matter how slow the consumers run; overflow drops the newest block
//! and bumps a counter. Monitor playthrough runs over a short SPSC queue
//! between the input and output callbacks, both of which stay non-blocking.

use super::devices::{default_input_device, input_device_at};
use super::meter::{block_peak, display_level};
use crate::error::DeviceError;
use crate::log_debug;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Blocks queued between the input and output callbacks for playthrough.
/// Monitor latency is bounded by this many hardware buffers.
const MONITOR_QUEUE_BLOCKS: usize = 8;

/// Scratch capacity reserved up front so the first callbacks do not grow it.
const SCRATCH_SAMPLES: usize = 8_192;

/// Where and how to open the input stream. Replaced wholesale on
/// reconfiguration; a running stream never observes a mutated config.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Positional index from `list_input_devices`, or the host default.
    pub device_index: Option<usize>,
    pub sample_rate: u32,
    /// Ordered source channel indices. Empty means capture as-is.
    pub channel_map: Vec<usize>,
}

/// One mapped chunk of interleaved f32 samples from a single callback
/// invocation, tagged with the channel count it was produced with.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pub channels: usize,
    pub samples: Vec<f32>,
}

impl AudioBlock {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }
}

/// Consumer ends handed out by `open`: the block queue feeds the segment
/// recorder, the level queue feeds the display layer.
pub struct CaptureHandles {
    pub blocks: Receiver<AudioBlock>,
    pub levels: Receiver<f32>,
    pub sample_rate: u32,
    pub channels: usize,
}

/// Snapshot of the overflow/fault counters. All values only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureStats {
    pub dropped_blocks: u64,
    pub dropped_levels: u64,
    pub dropped_monitor: u64,
    pub stream_errors: u64,
}

#[derive(Debug, Default)]
pub(super) struct StatsInner {
    pub(super) dropped_blocks: AtomicU64,
    pub(super) dropped_levels: AtomicU64,
    pub(super) dropped_monitor: AtomicU64,
    pub(super) stream_errors: AtomicU64,
}

impl StatsInner {
    pub(super) fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            dropped_blocks: self.dropped_blocks.load(Ordering::Relaxed),
            dropped_levels: self.dropped_levels.load(Ordering::Relaxed),
            dropped_monitor: self.dropped_monitor.load(Ordering::Relaxed),
            stream_errors: self.stream_errors.load(Ordering::Relaxed),
        }
    }
}

/// Callback-side fan-out: maps the raw hardware buffer and feeds the block,
/// level, and monitor queues without ever blocking.
pub(super) struct BlockPump {
    channel_map: Vec<usize>,
    source_channels: usize,
    mapped: Vec<f32>,
    blocks: Sender<AudioBlock>,
    levels: Sender<f32>,
    monitor: Sender<AudioBlock>,
    monitoring: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
}

impl BlockPump {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        channel_map: Vec<usize>,
        source_channels: usize,
        blocks: Sender<AudioBlock>,
        levels: Sender<f32>,
        monitor: Sender<AudioBlock>,
        monitoring: Arc<AtomicBool>,
        stats: Arc<StatsInner>,
    ) -> Self {
        Self {
            channel_map,
            source_channels: source_channels.max(1),
            mapped: Vec::with_capacity(SCRATCH_SAMPLES),
            blocks,
            levels,
            monitor,
            monitoring,
            stats,
        }
    }

    pub(super) fn push<T, F>(&mut self, data: &[T], mut convert: F)
    where
        T: Copy,
        F: FnMut(T) -> f32,
    {
        self.mapped.clear();
        let mapped_channels = if self.channel_map.is_empty() {
            self.mapped.extend(data.iter().copied().map(&mut convert));
            self.source_channels
        } else {
            for frame in data.chunks(self.source_channels) {
                for &channel in &self.channel_map {
                    self.mapped
                        .push(frame.get(channel).copied().map(&mut convert).unwrap_or(0.0));
                }
            }
            self.channel_map.len()
        };

        // The peak is taken before display clipping; the recorder recomputes
        // it from the block itself, so the trigger never sees a clipped value.
        let peak = block_peak(&self.mapped);
        let block = AudioBlock {
            channels: mapped_channels,
            samples: self.mapped.clone(),
        };
        let playthrough = self
            .monitoring
            .load(Ordering::Relaxed)
            .then(|| block.clone());

        if let Err(TrySendError::Full(_)) = self.blocks.try_send(block) {
            self.stats.dropped_blocks.fetch_add(1, Ordering::Relaxed);
        }
        if let Err(TrySendError::Full(_)) = self.levels.try_send(display_level(peak)) {
            self.stats.dropped_levels.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(copy) = playthrough {
            if let Err(TrySendError::Full(_)) = self.monitor.try_send(copy) {
                self.stats.dropped_monitor.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Output-callback side of monitor playthrough. Drains queued mapped blocks
/// into the hardware buffer frame by frame (a mono block fills every output
/// channel, a wider block contributes its first channels) and pads with
/// silence when the queue runs dry or monitoring is off.
pub(super) struct MonitorFill {
    queue: Receiver<AudioBlock>,
    monitoring: Arc<AtomicBool>,
    current: Option<AudioBlock>,
    frame_cursor: usize,
}

impl MonitorFill {
    pub(super) fn new(queue: Receiver<AudioBlock>, monitoring: Arc<AtomicBool>) -> Self {
        Self {
            queue,
            monitoring,
            current: None,
            frame_cursor: 0,
        }
    }

    pub(super) fn fill(&mut self, out: &mut [f32], out_channels: usize) {
        let out_channels = out_channels.max(1);
        if !self.monitoring.load(Ordering::Relaxed) {
            self.current = None;
            self.frame_cursor = 0;
            // Stale blocks would replay as a burst when monitoring comes back.
            while self.queue.try_recv().is_ok() {}
            out.fill(0.0);
            return;
        }
        for frame in out.chunks_mut(out_channels) {
            if !self.write_frame(frame) {
                frame.fill(0.0);
            }
        }
    }

    fn write_frame(&mut self, frame: &mut [f32]) -> bool {
        loop {
            let exhausted = match &self.current {
                Some(block) => self.frame_cursor >= block.frames(),
                None => true,
            };
            if !exhausted {
                break;
            }
            match self.queue.try_recv() {
                Ok(block) => {
                    self.current = Some(block);
                    self.frame_cursor = 0;
                }
                Err(_) => return false,
            }
        }
        let Some(block) = self.current.as_ref() else {
            return false;
        };
        let channels = block.channels.max(1);
        let start = self.frame_cursor * channels;
        let input = &block.samples[start..start + channels];
        let first = input[0];
        for (channel, slot) in frame.iter_mut().enumerate() {
            *slot = input.get(channel).copied().unwrap_or(first);
        }
        self.frame_cursor += 1;
        true
    }
}

struct OpenStreams {
    input: cpal::Stream,
    output: Option<cpal::Stream>,
}

/// Owns the device streams. Lives on the controlling thread; the queues it
/// hands out are the only structures shared with other threads.
pub struct CaptureEngine {
    queue_capacity: usize,
    monitoring: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
    streams: Option<OpenStreams>,
}

impl CaptureEngine {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue_capacity: queue_capacity.max(1),
            monitoring: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(StatsInner::default()),
            streams: None,
        }
    }

    /// Open the input stream (and the monitor output stream when an output
    /// device exists) for `config`. Any previously open stream pair is fully
    /// stopped and released first, so two callbacks never run concurrently
    /// against the shared flags and counters.
    pub fn open(
        &mut self,
        config: &CaptureConfig,
        monitor: bool,
    ) -> Result<CaptureHandles, DeviceError> {
        self.close();

        let device = match config.device_index {
            Some(index) => input_device_at(index)?,
            None => default_input_device()?,
        };
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input device".to_string());
        let default_config = device
            .default_input_config()
            .map_err(|source| DeviceError::Query {
                device: device_name.clone(),
                source,
            })?;
        let format = default_config.sample_format();
        let device_channels = usize::from(default_config.channels().max(1));

        // Request only as many hardware channels as the map actually reaches.
        let source_channels = match config.channel_map.iter().max() {
            Some(&highest) => (highest + 1).min(device_channels),
            None => device_channels,
        };
        let stream_config = cpal::StreamConfig {
            channels: source_channels as u16,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (block_tx, block_rx) = bounded::<AudioBlock>(self.queue_capacity);
        let (level_tx, level_rx) = bounded::<f32>(self.queue_capacity);
        let (monitor_tx, monitor_rx) = bounded::<AudioBlock>(MONITOR_QUEUE_BLOCKS);

        self.monitoring.store(monitor, Ordering::Relaxed);

        let mut pump = BlockPump::new(
            config.channel_map.clone(),
            source_channels,
            block_tx,
            level_tx,
            monitor_tx,
            self.monitoring.clone(),
            self.stats.clone(),
        );
        let err_hook = stream_error_hook(self.stats.clone());

        let input = match format {
            SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _| pump.push(data, |sample| sample),
                err_hook,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _| pump.push(data, |sample| sample as f32 / 32_768.0),
                err_hook,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &stream_config,
                move |data: &[u16], _| {
                    pump.push(data, |sample| (sample as f32 - 32_768.0) / 32_768.0)
                },
                err_hook,
                None,
            ),
            other => return Err(DeviceError::UnsupportedFormat(other)),
        }
        .map_err(|source| DeviceError::Open {
            device: device_name.clone(),
            source,
        })?;

        // Monitor playthrough is best effort: a machine with no output device
        // (or one that refuses the capture rate) still records fine, the
        // toggle just has nothing to play through.
        let output = match cpal::default_host().default_output_device() {
            Some(out_device) => match self.build_monitor_stream(
                &out_device,
                config.sample_rate,
                monitor_rx,
            ) {
                Ok(stream) => Some(stream),
                Err(err) => {
                    log_debug(&format!("monitor output unavailable: {err}"));
                    None
                }
            },
            None => None,
        };

        input.play().map_err(|source| DeviceError::Start {
            device: device_name.clone(),
            source,
        })?;
        if let Some(stream) = &output {
            if let Err(err) = stream.play() {
                log_debug(&format!("failed to start monitor output: {err}"));
            }
        }

        log_debug(&format!(
            "capture stream open: device='{device_name}' format={format:?} rate={} source_channels={source_channels} map={:?}",
            config.sample_rate, config.channel_map
        ));
        self.streams = Some(OpenStreams { input, output });

        Ok(CaptureHandles {
            blocks: block_rx,
            levels: level_rx,
            sample_rate: config.sample_rate,
            channels: if config.channel_map.is_empty() {
                source_channels
            } else {
                config.channel_map.len()
            },
        })
    }

    fn build_monitor_stream(
        &self,
        device: &cpal::Device,
        sample_rate: u32,
        queue: Receiver<AudioBlock>,
    ) -> Result<cpal::Stream, DeviceError> {
        let name = device
            .name()
            .unwrap_or_else(|_| "unknown output device".to_string());
        let default_config = device
            .default_output_config()
            .map_err(|source| DeviceError::Query {
                device: name.clone(),
                source,
            })?;
        let format = default_config.sample_format();
        let out_channels = usize::from(default_config.channels().max(1));
        // Same clock as the input stream, or the playthrough would drift in pitch.
        let stream_config = cpal::StreamConfig {
            channels: out_channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut fill = MonitorFill::new(queue, self.monitoring.clone());
        let err_hook = stream_error_hook(self.stats.clone());

        let stream = match format {
            SampleFormat::F32 => device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _| fill.fill(data, out_channels),
                err_hook,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [i16], _| {
                        scratch.resize(data.len(), 0.0);
                        fill.fill(&mut scratch, out_channels);
                        for (slot, sample) in data.iter_mut().zip(&scratch) {
                            *slot = (sample * 32_767.0) as i16;
                        }
                    },
                    err_hook,
                    None,
                )
            }
            SampleFormat::U16 => {
                let mut scratch: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &stream_config,
                    move |data: &mut [u16], _| {
                        scratch.resize(data.len(), 0.0);
                        fill.fill(&mut scratch, out_channels);
                        for (slot, sample) in data.iter_mut().zip(&scratch) {
                            *slot = (sample * 32_767.0 + 32_768.0) as u16;
                        }
                    },
                    err_hook,
                    None,
                )
            }
            other => return Err(DeviceError::UnsupportedFormat(other)),
        }
        .map_err(|source| DeviceError::Open { device: name, source })?;
        Ok(stream)
    }

    /// Toggle live playthrough. Safe from any thread while the stream runs.
    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::Relaxed);
    }

    pub fn monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Relaxed)
    }

    /// Stop and release the hardware streams. Idempotent; blocks until the
    /// audio subsystem has let go of the callbacks.
    pub fn close(&mut self) {
        if let Some(streams) = self.streams.take() {
            if let Err(err) = streams.input.pause() {
                log_debug(&format!("failed to pause input stream: {err}"));
            }
            if let Some(output) = &streams.output {
                if let Err(err) = output.pause() {
                    log_debug(&format!("failed to pause monitor output: {err}"));
                }
            }
            drop(streams);
        }
    }

    pub fn stats(&self) -> CaptureStats {
        self.stats.snapshot()
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        self.close();
    }
}

fn stream_error_hook(stats: Arc<StatsInner>) -> impl FnMut(cpal::StreamError) {
    // Raising from the audio subsystem's callback is not an option; faults
    // become a counter tick plus a log line.
    move |err| {
        stats.stream_errors.fetch_add(1, Ordering::Relaxed);
        log_debug(&format!("audio_stream_error: {err}"));
    }
}
