//! Threshold/silence segmentation: decides where a sound event starts and
//! ends, accumulates its blocks, and hands finished segments to the writer.
//!
//! Split into a pure state machine (`SegmentTracker`, driven with injected
//! wall-clock time so it can be exercised offline) and the polling thread
//! that owns it (`SegmentRecorder`).

use super::engine::AudioBlock;
use super::meter::block_peak;
use super::writer::{write_segment, RecordingSegment};
use super::POLL_INTERVAL;
use crate::log_debug;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Messages sent from the recorder thread to the controlling layer, in the
/// order the underlying events occur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    StatusUpdate(String),
    RecordingSaved(PathBuf),
    Error(String),
}

impl RecorderEvent {
    pub fn label(&self) -> &'static str {
        match self {
            RecorderEvent::StatusUpdate(_) => "status_update",
            RecorderEvent::RecordingSaved(_) => "recording_saved",
            RecorderEvent::Error(_) => "error",
        }
    }
}

/// Live-tunable recording parameters. The loop snapshots these once per
/// iteration, so a change applies on the next block, never mid-decision.
#[derive(Debug, Clone)]
pub struct RecorderParams {
    /// Peak amplitude that arms a segment, 0 < t <= 1.
    pub threshold: f32,
    /// Contiguous below-threshold time that ends a segment.
    pub silence_timeout: Duration,
    pub output_dir: PathBuf,
}

/// What the tracker decided about one block.
#[derive(Debug, PartialEq)]
pub(super) enum TrackerStep {
    /// Below threshold with nothing armed; keep waiting.
    Waiting,
    /// Level crossed the threshold; this block seeds a new segment.
    Triggered { level: f32 },
    /// Appended to the active segment.
    Recording,
    /// Silence outlasted the timeout; the finished segment is handed back.
    Finished(RecordingSegment),
}

/// Pure trigger/silence state machine.
///
/// The comparisons are strictly one-directional: `>` arms a segment and `<`
/// starts the silence timer, so a level exactly at threshold counts as sound
/// in both states. An interrupted silence timer is discarded outright; the
/// next silent block restarts the timeout from zero.
pub(super) struct SegmentTracker {
    threshold: f32,
    silence_timeout: Duration,
    sample_rate: u32,
    segment: Option<RecordingSegment>,
    silence_since: Option<Instant>,
}

impl SegmentTracker {
    pub(super) fn new(sample_rate: u32, threshold: f32, silence_timeout: Duration) -> Self {
        Self {
            threshold,
            silence_timeout,
            sample_rate,
            segment: None,
            silence_since: None,
        }
    }

    pub(super) fn apply_params(&mut self, params: &RecorderParams) {
        self.threshold = params.threshold;
        self.silence_timeout = params.silence_timeout;
    }

    pub(super) fn is_active(&self) -> bool {
        self.segment.is_some()
    }

    pub(super) fn on_block(&mut self, block: AudioBlock, now: Instant) -> TrackerStep {
        let level = block_peak(&block.samples);

        if self.segment.is_none() {
            if level > self.threshold {
                let mut segment = RecordingSegment::new(self.sample_rate);
                segment.blocks.push(block);
                self.segment = Some(segment);
                self.silence_since = None;
                return TrackerStep::Triggered { level };
            }
            return TrackerStep::Waiting;
        }

        // Active: every block belongs to the segment, silent tail included.
        if let Some(segment) = self.segment.as_mut() {
            segment.blocks.push(block);
        }

        if level < self.threshold {
            let since = *self.silence_since.get_or_insert(now);
            if now.duration_since(since) >= self.silence_timeout {
                self.silence_since = None;
                if let Some(finished) = self.segment.take() {
                    return TrackerStep::Finished(finished);
                }
            }
        } else {
            self.silence_since = None;
        }
        TrackerStep::Recording
    }

    /// Hand back whatever has accumulated, for a manual stop mid-segment.
    pub(super) fn take_segment(&mut self) -> Option<RecordingSegment> {
        self.silence_since = None;
        self.segment.take()
    }
}

/// Handle to the recorder thread. `start`/`stop` are idempotent; parameters
/// are shared through `params()` and re-read every polling iteration.
pub struct SegmentRecorder {
    params: Arc<Mutex<RecorderParams>>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    blocks: Receiver<AudioBlock>,
    events: Sender<RecorderEvent>,
    sample_rate: u32,
}

impl SegmentRecorder {
    pub fn new(
        blocks: Receiver<AudioBlock>,
        events: Sender<RecorderEvent>,
        params: RecorderParams,
        sample_rate: u32,
    ) -> Self {
        Self {
            params: Arc::new(Mutex::new(params)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            blocks,
            events,
            sample_rate,
        }
    }

    /// Shared parameter handle for live tuning from the controlling layer.
    pub fn params(&self) -> Arc<Mutex<RecorderParams>> {
        self.params.clone()
    }

    /// Spawn the polling loop. No-op when the loop is already running.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        // A previous loop that exited on its own (stream disconnect) leaves a
        // finished handle behind; reap it before spawning the next one.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let _ = self.events.send(RecorderEvent::StatusUpdate(
            "Recording started".to_string(),
        ));
        let blocks = self.blocks.clone();
        let events = self.events.clone();
        let params = self.params.clone();
        let running = self.running.clone();
        let sample_rate = self.sample_rate;
        self.handle = Some(thread::spawn(move || {
            record_loop(&blocks, &events, &params, &running, sample_rate);
        }));
    }

    /// Signal the loop to exit after its current iteration and wait for it.
    /// An in-progress segment is persisted before the recorder goes idle.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SegmentRecorder {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record_loop(
    blocks: &Receiver<AudioBlock>,
    events: &Sender<RecorderEvent>,
    params: &Arc<Mutex<RecorderParams>>,
    running: &Arc<AtomicBool>,
    sample_rate: u32,
) {
    let mut snapshot = snapshot_params(params);
    let mut tracker = SegmentTracker::new(
        sample_rate,
        snapshot.threshold,
        snapshot.silence_timeout,
    );

    while running.load(Ordering::Relaxed) {
        snapshot = snapshot_params(params);
        tracker.apply_params(&snapshot);

        match blocks.recv_timeout(POLL_INTERVAL) {
            Ok(block) => match tracker.on_block(block, Instant::now()) {
                TrackerStep::Triggered { level } => {
                    tracing::info!(level, "segment triggered");
                    log_debug(&format!("recording triggered at level {level:.3}"));
                }
                TrackerStep::Finished(segment) => {
                    persist(&segment, &snapshot.output_dir, events);
                }
                TrackerStep::Waiting | TrackerStep::Recording => {}
            },
            // Timeouts are expected control flow; they only bound how long a
            // stop request can go unnoticed.
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                let _ = events.send(RecorderEvent::Error(
                    "audio stream disconnected".to_string(),
                ));
                break;
            }
        }
    }

    // Manual stop mid-segment keeps the audio instead of discarding it.
    if let Some(segment) = tracker.take_segment() {
        persist(&segment, &snapshot.output_dir, events);
    }
    running.store(false, Ordering::SeqCst);
}

fn snapshot_params(params: &Arc<Mutex<RecorderParams>>) -> RecorderParams {
    params
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn persist(segment: &RecordingSegment, output_dir: &Path, events: &Sender<RecorderEvent>) {
    match write_segment(segment, output_dir) {
        Ok(Some(path)) => {
            tracing::info!(path = %path.display(), blocks = segment.blocks.len(), "segment saved");
            let _ = events.send(RecorderEvent::RecordingSaved(path));
        }
        Ok(None) => {}
        Err(err) => {
            // One lost segment; the loop goes back to waiting for the next
            // trigger rather than retrying a write that will fail again.
            tracing::warn!(error = %err, "segment save failed");
            log_debug(&format!("segment save failed: {err}"));
            let _ = events.send(RecorderEvent::Error(err.to_string()));
        }
    }
}
