//! Synthetic test signals: sine frames and a frame source that plays a
//! steady tone, for simulation runs and tests without an input device.

use std::f64::consts::TAU;

use crate::audio::{AudioFrame, FrameSource};
use crate::error::Result;

/// `len` samples of a sine at `freq` Hz, starting at phase zero.
pub fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    sine_from(freq, amplitude, sample_rate, 0, len)
}

fn sine_from(freq: f32, amplitude: f32, sample_rate: u32, start: u64, len: usize) -> Vec<f32> {
    let step = TAU * freq as f64 / sample_rate as f64;
    (0..len as u64)
        .map(|i| (amplitude as f64 * (step * (start + i) as f64).sin()) as f32)
        .collect()
}

/// A [`FrameSource`] playing a continuous sine.
///
/// Phase carries over between frames, as it would from a real instrument.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    frame_size: usize,
    position: u64,
    remaining: Option<usize>,
}

impl SyntheticSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            frame_size,
            position: 0,
            remaining: None,
        }
    }

    /// Stops after `frames` frames.
    pub fn with_limit(mut self, frames: usize) -> Self {
        self.remaining = Some(frames);
        self
    }

    /// Changes the tone from the next frame on.
    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<AudioFrame>> {
        match self.remaining.as_mut() {
            Some(0) => return Ok(None),
            Some(left) => *left -= 1,
            None => {}
        }
        let samples = sine_from(
            self.frequency,
            self.amplitude,
            self.sample_rate,
            self.position,
            self.frame_size,
        );
        self.position += self.frame_size as u64;
        Ok(Some(AudioFrame::new(samples, self.sample_rate)))
    }
}
