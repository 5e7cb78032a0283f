//! # Signal Conditioning Module
//!
//! Prepares a raw audio frame for pitch estimation: a 3-point moving average
//! knocks down sample-level noise, and an RMS gate stops silent frames before
//! the expensive autocorrelation runs.

/// Root-mean-square amplitude of a buffer. Zero for an empty buffer.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// 3-point moving average over the interior samples.
///
/// The first and last output samples are set to zero. Output length always
/// equals input length; buffers shorter than three samples come back as all
/// zeros.
pub fn moving_average(samples: &[f32]) -> Vec<f32> {
    let mut smoothed = vec![0.0; samples.len()];
    for (out, window) in smoothed.iter_mut().skip(1).zip(samples.windows(3)) {
        *out = (window[0] + window[1] + window[2]) / 3.0;
    }
    smoothed
}

/// A smoothed frame that passed the silence gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionedFrame {
    pub samples: Vec<f32>,
    /// RMS of the smoothed samples
    pub rms: f32,
}

/// Outcome of conditioning one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Conditioned {
    /// Energy below the gate; the rest of the pipeline is skipped.
    Silent { rms: f32 },
    Signal(ConditionedFrame),
}

/// Smooths `samples` and applies the RMS silence gate.
///
/// # Arguments
/// * `samples` - One raw mono frame
/// * `silence_threshold` - RMS below which the frame counts as silent
///
/// # Returns
/// * `Conditioned::Silent` - The RMS of the smoothed frame
/// * `Conditioned::Signal` - The smoothed frame and its RMS
pub fn condition(samples: &[f32], silence_threshold: f32) -> Conditioned {
    let smoothed = moving_average(samples);
    let energy = rms(&smoothed);
    if energy < silence_threshold {
        return Conditioned::Silent { rms: energy };
    }
    Conditioned::Signal(ConditionedFrame {
        samples: smoothed,
        rms: energy,
    })
}
