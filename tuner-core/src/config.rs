//! # Configuration Module
//!
//! Runtime settings for capture, estimation and display, loadable from a
//! JSON file. Missing fields take their defaults, so a file only needs the
//! values it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TunerError};
use crate::meter::MeterSettings;
use crate::pitch::{self, AutocorrelationMethod, EstimatorSettings};

/// Default number of samples per analysis frame.
pub const FRAME_SIZE: usize = 4096;

/// Default capture sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44100;

/// Accepted frame sizes.
pub const FRAME_SIZE_RANGE: std::ops::RangeInclusive<usize> = 256..=16384;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Samples per analysis frame
    pub frame_size: usize,
    /// Target capture rate in Hz
    pub sample_rate: u32,
    /// RMS below which a frame is silence
    pub silence_threshold: f32,
    /// Magnitude a sample must exceed to survive the edge trim
    pub trim_threshold: f32,
    /// Smallest trimmed window that is still estimated
    pub min_window: usize,
    pub autocorrelation: AutocorrelationMethod,
    pub meter: MeterSettings,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            frame_size: FRAME_SIZE,
            sample_rate: SAMPLE_RATE,
            silence_threshold: pitch::SILENCE_THRESHOLD,
            trim_threshold: pitch::TRIM_THRESHOLD,
            min_window: pitch::MIN_WINDOW,
            autocorrelation: AutocorrelationMethod::Direct,
            meter: MeterSettings::default(),
        }
    }
}

impl TunerConfig {
    pub fn from_json(json: &str) -> Result<TunerConfig> {
        let config: TunerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<TunerConfig> {
        let path = path.as_ref();
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        log::info!("[CONFIG] Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Rejects sizes and thresholds the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        fn invalid(msg: String) -> Result<()> {
            Err(TunerError::InvalidConfig(msg))
        }

        if !FRAME_SIZE_RANGE.contains(&self.frame_size) {
            return invalid(format!(
                "frame_size {} outside {}..={}",
                self.frame_size,
                FRAME_SIZE_RANGE.start(),
                FRAME_SIZE_RANGE.end()
            ));
        }
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive".into());
        }
        for (name, value) in [
            ("silence_threshold", self.silence_threshold),
            ("meter.cents_window", self.meter.cents_window),
            ("meter.needle_degrees", self.meter.needle_degrees),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }
        for (name, value) in [
            ("trim_threshold", self.trim_threshold),
            ("meter.in_tune_cents", self.meter.in_tune_cents),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(format!("{name} must not be negative, got {value}"));
            }
        }
        if self.min_window < 3 || self.min_window > self.frame_size {
            return invalid(format!(
                "min_window {} outside 3..={}",
                self.min_window, self.frame_size
            ));
        }
        Ok(())
    }

    /// The estimator's view of this configuration.
    pub fn estimator_settings(&self) -> EstimatorSettings {
        EstimatorSettings {
            silence_threshold: self.silence_threshold,
            trim_threshold: self.trim_threshold,
            min_window: self.min_window,
            method: self.autocorrelation,
        }
    }
}
