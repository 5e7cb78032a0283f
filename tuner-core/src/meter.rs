//! # Cent Meter Module
//!
//! Display mappings for the unclamped cent offset. The engine never clamps;
//! each presentation picks its own range.
//!
//! - Linear meter: offset clamped to ±`cents_window`
//! - Needle: offset scaled so `cents_window` lands on `needle_degrees`,
//!   then clamped to ±`needle_degrees`

use serde::{Deserialize, Serialize};

/// Maximum cent deviation shown by the linear meter.
pub const METER_RANGE: f32 = 50.0;

/// Needle deflection at the edge of the meter range.
pub const NEEDLE_RANGE: f32 = 45.0;

/// Offsets closer to zero than this read as in tune.
pub const IN_TUNE_CENTS: f32 = 5.0;

/// Display ranges for the cent meter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeterSettings {
    pub cents_window: f32,
    pub needle_degrees: f32,
    pub in_tune_cents: f32,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            cents_window: METER_RANGE,
            needle_degrees: NEEDLE_RANGE,
            in_tune_cents: IN_TUNE_CENTS,
        }
    }
}

impl MeterSettings {
    /// Offset clamped to the linear meter's range.
    pub fn clamp_cents(&self, cents: f32) -> f32 {
        clamp_symmetric(cents, self.cents_window)
    }

    /// Needle angle in degrees for an offset.
    pub fn needle_angle(&self, cents: f32) -> f32 {
        clamp_symmetric(cents / self.cents_window * self.needle_degrees, self.needle_degrees)
    }

    pub fn in_tune(&self, cents: f32) -> bool {
        cents.abs() < self.in_tune_cents
    }
}

/// Clamps `value` to `[-bound, bound]`. NaN maps to zero.
fn clamp_symmetric(value: f32, bound: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(-bound.abs(), bound.abs())
}
