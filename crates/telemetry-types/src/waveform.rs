//! Deterministic periodic signal used by the device simulator.

/// Divisor applied to the iteration counter before `sin`.
pub const WAVEFORM_STRETCH: f64 = 40.0;

/// Period of [`offset`] in iterations (80π).
pub const WAVEFORM_PERIOD: f64 = 2.0 * std::f64::consts::PI * WAVEFORM_STRETCH;

/// `amplitude · sin(x / 40)`.
pub fn offset(amplitude: f64, x: f64) -> f64 {
    amplitude * (x / WAVEFORM_STRETCH).sin()
}
