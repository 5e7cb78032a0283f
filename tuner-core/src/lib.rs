// tuner-core/src/lib.rs

//! The core logic for the string instrument tuner.
//! This crate is responsible for signal conditioning, pitch detection,
//! and matching a detected pitch to an instrument's open strings. It is
//! completely headless and contains no presentation code.

pub mod audio;
pub mod conditioning;
pub mod config;
pub mod detection;
pub mod error;
pub mod fft;
pub mod meter;
pub mod notes;
pub mod pitch;
pub mod resolve;
pub mod signal;
pub mod transpose;

use serde::Serialize;

pub use audio::{AudioFrame, FrameSource};
pub use config::TunerConfig;
pub use detection::{Detector, ReferenceSet, Selection};
pub use error::TunerError;
pub use notes::{InstrumentProfile, NoteTable, OpenStringNote, PitchClass};

/// A pitched reading: the string that was matched and how far off it is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    /// Pitch class of the nearest string
    pub note: PitchClass,
    /// Detected frequency in Hz
    pub frequency: f32,
    /// Deviation from the string in cents, unclamped
    pub cents_offset: f32,
    /// Position of the string in the instrument's note set
    pub string_index: usize,
    /// The string's (transposed) frequency, for reference-tone playback
    pub target_frequency: f32,
}

/// Represents the result of a single detection tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionResult {
    /// Silence, noise, or no usable periodic structure
    NoPitch,
    Pitch(Reading),
}

impl DetectionResult {
    pub fn reading(&self) -> Option<&Reading> {
        match self {
            DetectionResult::Pitch(reading) => Some(reading),
            DetectionResult::NoPitch => None,
        }
    }

    pub fn note(&self) -> Option<PitchClass> {
        self.reading().map(|r| r.note)
    }

    pub fn frequency(&self) -> Option<f32> {
        self.reading().map(|r| r.frequency)
    }

    /// Cent offset, reset to zero when there is no pitch.
    pub fn cents_offset(&self) -> f32 {
        self.reading().map_or(0.0, |r| r.cents_offset)
    }

    pub fn is_pitched(&self) -> bool {
        matches!(self, DetectionResult::Pitch(_))
    }
}
