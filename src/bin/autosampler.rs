//! Headless auto-sampler CLI: opens the capture stream, runs the segment
//! recorder, and prints recorder events until the user stops it.

use anyhow::{anyhow, Context, Result};
use autosampler::audio::{
    list_input_devices, resolve_channel_map, CaptureConfig, CaptureEngine, CaptureStats,
    ChannelSelection, RecorderEvent, RecorderParams, SegmentRecorder,
};
use autosampler::config::AppConfig;
use autosampler::{init_logging, init_tracing};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};

const METER_PRINT_INTERVAL: Duration = Duration::from_millis(100);
const METER_WIDTH: usize = 40;

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);

    if config.list_input_devices {
        return print_input_devices();
    }

    let devices = list_input_devices().context("failed to enumerate input devices")?;
    let device = match config.device_index {
        Some(index) => devices
            .iter()
            .find(|d| d.index == index)
            .ok_or_else(|| anyhow!("no input device at index {index}; try --list-input-devices"))?,
        None => devices
            .first()
            .ok_or_else(|| anyhow!("no audio input devices available"))?,
    };

    let selection = ChannelSelection::from_config(config.input_channel, config.stereo);
    let channel_map = resolve_channel_map(selection, usize::from(device.max_input_channels));
    let sample_rate = config.sample_rate.unwrap_or(device.default_sample_rate);

    let capture = CaptureConfig {
        device_index: Some(device.index),
        sample_rate,
        channel_map,
    };
    let mut engine = CaptureEngine::new(config.queue_capacity);
    let handles = engine
        .open(&capture, config.monitor)
        .with_context(|| format!("failed to open '{}'", device.name))?;

    println!(
        "Capturing '{}' at {} Hz, {} channel(s); threshold {:.3}, silence {} ms, output '{}'",
        device.name,
        handles.sample_rate,
        handles.channels,
        config.threshold,
        config.silence_ms,
        config.output_dir.display()
    );

    let (event_tx, event_rx) = unbounded();
    let params = RecorderParams {
        threshold: config.threshold,
        silence_timeout: Duration::from_millis(config.silence_ms),
        output_dir: config.output_dir.clone(),
    };
    let mut recorder = SegmentRecorder::new(handles.blocks, event_tx, params, handles.sample_rate);
    recorder.start();

    let meter_handle = spawn_level_drain(handles.levels, config.meter);
    let printer_handle = thread::spawn(move || print_events(&event_rx));

    wait_for_stop(config.duration);

    recorder.stop();
    engine.close();

    let stats = engine.stats();
    if stats != CaptureStats::default() {
        println!(
            "Capture stats: {} blocks dropped, {} levels dropped, {} monitor blocks dropped, {} stream errors",
            stats.dropped_blocks, stats.dropped_levels, stats.dropped_monitor, stats.stream_errors
        );
    }

    drop(recorder);
    let _ = printer_handle.join();
    let _ = meter_handle.join();
    Ok(())
}

fn print_input_devices() -> Result<()> {
    let devices = list_input_devices().context("failed to enumerate input devices")?;
    if devices.is_empty() {
        println!("No audio input devices detected.");
        return Ok(());
    }
    println!("Available audio input devices:");
    for device in &devices {
        println!(
            "  {}: {} ({} in, {} Hz)",
            device.index, device.name, device.max_input_channels, device.default_sample_rate
        );
    }
    Ok(())
}

fn print_events(events: &Receiver<RecorderEvent>) {
    for event in events {
        match event {
            RecorderEvent::StatusUpdate(message) => println!("{message}"),
            RecorderEvent::RecordingSaved(path) => {
                println!("Saved: {}", path.display());
                println!("Waiting for new sound...");
            }
            RecorderEvent::Error(message) => eprintln!("Error: {message}"),
        }
    }
}

/// Drain the level queue at display pace. The queue is bounded on the
/// producer side, so falling behind here costs meter samples, not audio.
fn spawn_level_drain(levels: Receiver<f32>, render: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut peak_hold = 0.0f32;
        let mut last_print = Instant::now();
        loop {
            match levels.recv_timeout(METER_PRINT_INTERVAL) {
                Ok(level) => {
                    peak_hold = peak_hold.max(level);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            if render && last_print.elapsed() >= METER_PRINT_INTERVAL {
                render_meter(peak_hold);
                peak_hold = 0.0;
                last_print = Instant::now();
            }
        }
        if render {
            // Leave the meter line behind instead of overwriting the prompt.
            eprintln!();
        }
    })
}

fn render_meter(level: f32) {
    let filled = ((level * METER_WIDTH as f32) as usize).min(METER_WIDTH);
    let bar: String = "#".repeat(filled) + &"-".repeat(METER_WIDTH - filled);
    eprint!("\r[{bar}] {level:.3}");
    let _ = io::stderr().flush();
}

fn wait_for_stop(duration: Option<u64>) {
    match duration {
        Some(seconds) => thread::sleep(Duration::from_secs(seconds)),
        None => {
            println!("Press Enter to stop.");
            let mut line = String::new();
            let _ = io::stdin().read_line(&mut line);
        }
    }
}
