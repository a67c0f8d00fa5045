use serde::Deserialize;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::signal::bands::{OctaveBase, OctaveWindow};
use crate::signal::decay::{FAST_DECAY_RATE, SLOW_DECAY_RATE};

/// Level of a 0 dBFS RMS signal on a device calibrated so that 90 dB SPL at
/// 1 kHz reads -22.35 dBFS.
pub const DEFAULT_CALIBRATION_GAIN: f64 = 90.0 + 22.35;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    /// Frame length in seconds.
    #[serde(default = "default_window_time")]
    pub window_time: f64,
    /// Frame advance in seconds.
    #[serde(default = "default_window_time")]
    pub hop_time: f64,
    #[serde(default = "default_true")]
    pub hann_window: bool,
    #[serde(default)]
    pub octave_base: OctaveBase,
    #[serde(default = "default_band_division")]
    pub band_division: f64,
    #[serde(default = "default_first_frequency")]
    pub first_frequency: f64,
    #[serde(default = "default_last_frequency")]
    pub last_frequency: f64,
    #[serde(default)]
    pub octave_window: OctaveWindow,
    /// dB added to every level computed from full-scale samples.
    #[serde(default = "default_calibration_gain")]
    pub calibration_gain: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_fast_decay_rate")]
    pub fast_decay_rate: f64,
    #[serde(default = "default_slow_decay_rate")]
    pub slow_decay_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_time: default_window_time(),
            hop_time: default_window_time(),
            hann_window: true,
            octave_base: OctaveBase::default(),
            band_division: default_band_division(),
            first_frequency: default_first_frequency(),
            last_frequency: default_last_frequency(),
            octave_window: OctaveWindow::default(),
            calibration_gain: default_calibration_gain(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fast_decay_rate: default_fast_decay_rate(),
            slow_decay_rate: default_slow_decay_rate(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            block_size: default_block_size(),
        }
    }
}

fn default_window_time() -> f64 { 0.125 }
fn default_true() -> bool { true }
fn default_band_division() -> f64 { 3.0 }
fn default_first_frequency() -> f64 { 20.0 }
fn default_last_frequency() -> f64 { 12500.0 }
fn default_calibration_gain() -> f64 { DEFAULT_CALIBRATION_GAIN }
fn default_fast_decay_rate() -> f64 { FAST_DECAY_RATE }
fn default_slow_decay_rate() -> f64 { SLOW_DECAY_RATE }
fn default_queue_capacity() -> usize { 64 }
fn default_block_size() -> usize { 4096 }

impl AnalysisConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfig(msg));
        if !(self.window_time > 0.0) || !self.window_time.is_finite() {
            return invalid(format!("window_time must be positive, got {}", self.window_time));
        }
        if !(self.hop_time > 0.0) || self.hop_time > self.window_time {
            return invalid(format!(
                "hop_time must be within (0, {}], got {}",
                self.window_time, self.hop_time
            ));
        }
        if !(self.band_division > 0.0) || !self.band_division.is_finite() {
            return invalid(format!("band_division must be positive, got {}", self.band_division));
        }
        if !(self.first_frequency > 0.0) || !(self.last_frequency > self.first_frequency) {
            return invalid(format!(
                "frequency range {}..{} is empty or not positive",
                self.first_frequency, self.last_frequency
            ));
        }
        if !self.last_frequency.is_finite() || !self.calibration_gain.is_finite() {
            return invalid("last_frequency and calibration_gain must be finite".into());
        }
        Ok(())
    }

    /// `(window_size, hop_size)` in samples at `sample_rate`.
    pub fn frame_geometry(&self, sample_rate: u32) -> EngineResult<(usize, usize)> {
        if sample_rate == 0 {
            return Err(EngineError::InvalidSampleRate(sample_rate));
        }
        let window_size = (sample_rate as f64 * self.window_time) as usize;
        let hop_size = (sample_rate as f64 * self.hop_time) as usize;
        if window_size < 2 || hop_size == 0 || hop_size > window_size {
            return Err(EngineError::NoTransformLength {
                sample_rate,
                window_time: self.window_time,
            });
        }
        Ok((window_size, hop_size))
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> EngineResult<()> {
        for rate in [self.fast_decay_rate, self.slow_decay_rate] {
            if !(rate < 0.0) {
                return Err(EngineError::InvalidConfig(format!(
                    "decay rates must be negative dB/s, got {rate}"
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> EngineResult<()> {
        self.analysis.validate()?;
        self.display.validate()?;
        if self.stream.queue_capacity == 0 || self.stream.block_size == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity and block_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> EngineResult<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content).map_err(|source| EngineError::Config {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
