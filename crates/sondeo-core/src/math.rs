//! Mathematical utility functions for analysis DSP.
//!
//! # Level Conversions
//!
//! - [`db_to_amplitude`] / [`amplitude_to_db`] - dB ↔ linear amplitude (20·log10)
//! - [`power_to_db`] - dB of an energy-like quantity (10·log10)
//!
//! # Smoothing
//!
//! - [`attack_decay_constant`] - One-pole coefficient for a time constant
//!   evaluated once per stride of samples

/// Convert decibels to linear amplitude.
///
/// # Example
/// ```rust
/// use sondeo_core::db_to_amplitude;
///
/// assert!((db_to_amplitude(0.0) - 1.0).abs() < 1e-9);
/// assert!((db_to_amplitude(-20.0) - 0.1).abs() < 1e-9);
/// ```
#[inline]
pub fn db_to_amplitude(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

/// Convert linear amplitude to decibels.
///
/// Values at or below `1e-10` are clamped so silence maps to a finite -200 dB.
#[inline]
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    20.0 * amplitude.max(1e-10).log10()
}

/// Convert a power (energy, mean square) value to decibels.
///
/// Clamped at `f32::EPSILON` so a zero input yields a finite result.
#[inline]
pub fn power_to_db(power: f64) -> f64 {
    10.0 * power.max(f64::from(f32::EPSILON)).log10()
}

/// Smoothing coefficient for a time constant applied once every `stride` samples.
///
/// The returned `k` is used as `result = value + k * (result - value)`.
/// A non-positive time disables smoothing (`k = 0`).
///
/// # Arguments
/// * `time_secs` - Time constant in seconds
/// * `sample_rate` - Sample rate in Hz
/// * `stride` - Number of samples between two updates
pub fn attack_decay_constant(time_secs: f64, sample_rate: u32, stride: usize) -> f64 {
    if time_secs <= 0.0 || sample_rate == 0 {
        return 0.0;
    }
    (-2.0 * stride as f64 / (f64::from(sample_rate) * time_secs)).exp()
}

/// Round to the nearest even integer, never below zero.
#[inline]
pub fn round_to_even(value: f64) -> usize {
    let half = (value.max(0.0) * 0.5).round();
    (half as usize) * 2
}
