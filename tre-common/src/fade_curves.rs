//! Fade curve implementations for voice gain ramps
//!
//! Provides five fade curve types used when a voice (typically a music
//! stream) is faded between two gain levels over time.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve types for gain ramps
///
/// Each curve type provides a different perceptual quality:
/// - Linear: Constant rate of change (precise, predictable)
/// - Exponential: Slow start, fast finish (natural-sounding fade-in)
/// - Logarithmic: Fast start, slow finish (natural-sounding fade-out)
/// - SCurve: Smooth acceleration and deceleration
/// - EqualPower: Constant perceived loudness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(t) = t
    Linear,

    /// Exponential: v(t) = t²
    Exponential,

    /// Logarithmic: v(t) = (1-t)² (for fade-out)
    Logarithmic,

    /// S-Curve: v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "cosine", alias = "scurve")]
    SCurve,

    /// Equal-Power: v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Calculate fade-in multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Multiplier rising from 0.0 to 1.0
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            // Inverse of the quadratic fade-out shape
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Calculate fade-out multiplier at given position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Multiplier falling from 1.0 to 0.0
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Interpolate a gain between `from` and `to` at the given fade position.
    ///
    /// Rising ramps use the fade-in shape, falling ramps the fade-out shape,
    /// so a music fade-out with `Logarithmic` drops quickly and then tails off.
    pub fn gain_at(&self, from: f32, to: f32, position: f32) -> f32 {
        if to >= from {
            from + (to - from) * self.calculate_fade_in(position)
        } else {
            to + (from - to) * self.calculate_fade_out(position)
        }
    }
}

impl Default for FadeCurve {
    fn default() -> Self {
        FadeCurve::SCurve
    }
}
