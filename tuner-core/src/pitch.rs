//! # Pitch Detection Module
//!
//! Autocorrelation pitch estimation for single notes on bowed and plucked
//! strings.
//!
//! ## Pipeline
//! 1. RMS gate (again, so the estimator is safe to call on its own)
//! 2. Edge trim: drop the quiet lead-in and tail of the frame
//! 3. Autocorrelation over every lag of the trimmed window
//! 4. Walk past the zero-lag peak to the first local minimum
//! 5. Take the highest correlation beyond it as the period
//! 6. Parabolic interpolation for sub-sample accuracy
//!
//! Every degenerate case ends in [`NoPitch`], never in a division by zero.

use serde::{Deserialize, Serialize};

use crate::conditioning::rms;
use crate::fft;

/// Default magnitude a sample must exceed to survive the edge trim.
pub const TRIM_THRESHOLD: f32 = 0.2;

/// Default RMS below which a frame counts as silence.
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Default smallest trimmed window still worth correlating.
pub const MIN_WINDOW: usize = 8;

/// How the autocorrelation is computed. Both give the same lags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutocorrelationMethod {
    /// Direct O(M²) sum
    #[default]
    Direct,
    /// Zero-padded FFT, O(M log M)
    Fft,
}

/// Tuning knobs for [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    pub silence_threshold: f32,
    pub trim_threshold: f32,
    pub min_window: usize,
    pub method: AutocorrelationMethod,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            silence_threshold: SILENCE_THRESHOLD,
            trim_threshold: TRIM_THRESHOLD,
            min_window: MIN_WINDOW,
            method: AutocorrelationMethod::Direct,
        }
    }
}

/// Why a frame produced no pitch. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoPitch {
    /// RMS under the silence threshold
    Silent,
    /// Nothing (or too little) left after the edge trim
    DegenerateTrim,
    /// No periodic structure: zero energy or no dip after the zero-lag peak
    FlatCorrelation,
    /// The period came out non-positive or non-finite
    InvalidPeriod,
}

/// Result of one estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Pitch(f32),
    NoPitch(NoPitch),
}

impl Estimate {
    pub fn frequency(self) -> Option<f32> {
        match self {
            Estimate::Pitch(freq) => Some(freq),
            Estimate::NoPitch(_) => None,
        }
    }
}

/// Where the correlation peak was placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeakPosition {
    /// Parabola vertex through the peak and its two neighbours
    Interpolated(f32),
    /// Peak on the first or last lag; no neighbour triple exists
    Edge(usize),
    /// Neighbours make a straight line (or a non-finite fit)
    Flat(usize),
}

impl PeakPosition {
    /// Lag in samples, fractional when interpolated.
    pub fn lag(self) -> f32 {
        match self {
            PeakPosition::Interpolated(lag) => lag,
            PeakPosition::Edge(lag) | PeakPosition::Flat(lag) => lag as f32,
        }
    }
}

/// Estimates the fundamental frequency of a conditioned frame.
///
/// # Arguments
/// * `samples` - Mono frame, normally already smoothed by [`crate::conditioning`]
/// * `sample_rate` - Sample rate of the frame in Hz
/// * `settings` - Gate, trim and correlation settings
///
/// # Returns
/// * `Estimate::Pitch(freq)` - Fundamental in Hz, `sample_rate / period`
/// * `Estimate::NoPitch(reason)` - Silence or no usable periodic structure
pub fn estimate(samples: &[f32], sample_rate: u32, settings: &EstimatorSettings) -> Estimate {
    if rms(samples) < settings.silence_threshold {
        return Estimate::NoPitch(NoPitch::Silent);
    }

    let window = match trim_edges(samples, settings.trim_threshold) {
        Some(window) if window.len() >= settings.min_window.max(3) => window,
        _ => return Estimate::NoPitch(NoPitch::DegenerateTrim),
    };

    let correlation = match settings.method {
        AutocorrelationMethod::Direct => autocorrelate(window),
        AutocorrelationMethod::Fft => fft::autocorrelate(window),
    };

    let period = match find_period(&correlation) {
        Ok(period) => period,
        Err(reason) => return Estimate::NoPitch(reason),
    };

    let lag = interpolate_peak(&correlation, period).lag();
    if !(lag.is_finite() && lag > 0.0) {
        return Estimate::NoPitch(NoPitch::InvalidPeriod);
    }

    let frequency = sample_rate as f32 / lag;
    if frequency.is_finite() && frequency > 0.0 {
        Estimate::Pitch(frequency)
    } else {
        Estimate::NoPitch(NoPitch::InvalidPeriod)
    }
}

/// Restricts the buffer to the span between the first and the last sample
/// whose magnitude exceeds `threshold` (both inclusive).
///
/// `None` when no sample is loud enough.
pub fn trim_edges(samples: &[f32], threshold: f32) -> Option<&[f32]> {
    let first = samples.iter().position(|s| s.abs() > threshold)?;
    let last = samples.iter().rposition(|s| s.abs() > threshold)?;
    Some(&samples[first..=last])
}

/// Autocorrelation for every lag of the window:
/// `c[i] = Σ_j x[j]·x[j+i]` over the overlapping samples.
pub fn autocorrelate(window: &[f32]) -> Vec<f64> {
    let len = window.len();
    (0..len)
        .map(|lag| {
            window[..len - lag]
                .iter()
                .zip(&window[lag..])
                .map(|(&a, &b)| a as f64 * b as f64)
                .sum()
        })
        .collect()
}

/// Integer lag of the periodic peak.
///
/// Walks down the slope of the zero-lag peak to its first local minimum,
/// then returns the lag of the largest correlation from there on. Ties go
/// to the shortest lag.
pub fn find_period(correlation: &[f64]) -> Result<usize, NoPitch> {
    if correlation.len() < 3 || !(correlation[0] > 0.0) {
        return Err(NoPitch::FlatCorrelation);
    }

    let mut dip = 0;
    while dip + 1 < correlation.len() && correlation[dip] > correlation[dip + 1] {
        dip += 1;
    }
    // Monotonic decay all the way down: there is no second peak.
    if dip + 1 >= correlation.len() {
        return Err(NoPitch::FlatCorrelation);
    }

    let (period, peak) = correlation
        .iter()
        .enumerate()
        .skip(dip)
        .fold((dip, correlation[dip]), |best, (lag, &value)| {
            if value > best.1 { (lag, value) } else { best }
        });

    if period == 0 {
        return Err(NoPitch::InvalidPeriod);
    }
    if !(peak > 0.0) {
        return Err(NoPitch::FlatCorrelation);
    }
    Ok(period)
}

/// Refines an integer peak lag with a parabola through its neighbours.
///
/// With `x1, x2, x3 = c[t-1], c[t], c[t+1]`, `a = (x1 + x3 - 2·x2) / 2` and
/// `b = (x3 - x1) / 2`, the vertex sits at `t - b / (2a)`. A peak on the
/// first or last lag, or a zero curvature, keeps the integer lag.
pub fn interpolate_peak(correlation: &[f64], peak: usize) -> PeakPosition {
    if peak == 0 || peak + 1 >= correlation.len() {
        return PeakPosition::Edge(peak);
    }

    let (x1, x2, x3) = (correlation[peak - 1], correlation[peak], correlation[peak + 1]);
    let a = (x1 + x3 - 2.0 * x2) / 2.0;
    let b = (x3 - x1) / 2.0;
    if a == 0.0 {
        return PeakPosition::Flat(peak);
    }

    let refined = peak as f64 - b / (2.0 * a);
    if refined.is_finite() {
        PeakPosition::Interpolated(refined as f32)
    } else {
        PeakPosition::Flat(peak)
    }
}
