use super::defaults::{
    MAX_QUEUE_CAPACITY, MAX_SAMPLE_RATE, MAX_SILENCE_TAIL_MS, MIN_QUEUE_CAPACITY, MIN_SAMPLE_RATE,
};
use super::AppConfig;
use crate::error::ConfigError;
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self, ConfigError> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values before any stream is opened.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError(format!(
                "--threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }

        if self.silence_ms == 0 || self.silence_ms > MAX_SILENCE_TAIL_MS {
            return Err(ConfigError(format!(
                "--silence-ms must be between 1 and {MAX_SILENCE_TAIL_MS}, got {}",
                self.silence_ms
            )));
        }

        if self.input_channel == 0 {
            return Err(ConfigError(
                "--input is 1-based; channel 0 does not exist".to_string(),
            ));
        }

        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&self.queue_capacity) {
            return Err(ConfigError(format!(
                "--queue-capacity must be between {MIN_QUEUE_CAPACITY} and {MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            )));
        }

        if let Some(rate) = self.sample_rate {
            if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&rate) {
                return Err(ConfigError(format!(
                    "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {rate}"
                )));
            }
        }

        if let Some(duration) = self.duration {
            if duration == 0 {
                return Err(ConfigError("--duration must be at least 1 second".to_string()));
            }
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError("--output-dir must not be empty".to_string()));
        }
        if self.output_dir.is_file() {
            return Err(ConfigError(format!(
                "--output-dir '{}' is a file, not a directory",
                self.output_dir.display()
            )));
        }

        Ok(())
    }
}
