//! # Error Module
//!
//! Errors that cross the boundary of the tuner core. Numeric dead ends inside
//! the estimator are not errors: they surface as [`crate::pitch::NoPitch`]
//! and end up as a "none" [`crate::DetectionResult`].

use thiserror::Error;

/// Failures reported by the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    /// The capture collaborator cannot deliver frames (device missing,
    /// permission denied, stream died). Fatal to detection.
    #[error("audio capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// The selected instrument is not in the note table.
    #[error("unknown instrument `{0}`")]
    UnknownInstrument(String),

    /// A note name outside the chromatic table.
    #[error("unknown pitch class `{0}`")]
    UnknownPitchClass(String),

    /// A loaded instrument table breaks an invariant.
    #[error("invalid instrument table: {0}")]
    InvalidTable(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TunerError {
    /// True for failures that must stop the detection loop.
    pub fn is_capture_failure(&self) -> bool {
        matches!(self, TunerError::CaptureUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
