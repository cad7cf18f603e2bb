//! Digital Signal Processing for the parametric equalizer
//!
//! This module provides:
//! - Biquad sections with exact magnitude evaluation
//! - Filter variants (low/high pass, bell, shelves, notch) built from
//!   cascaded sections, 6 to 96 dB/octave
//! - The filter chain that runs them in series and sums their responses
//!
//! All processing is designed for:
//! - Zero allocations in the hot path
//! - No locks on the audio thread
//! - Deterministic, bounded coefficient updates

pub mod biquad;
pub mod chain;
pub mod filter;

pub use biquad::{BiquadCoeffs, BiquadSection};
pub use chain::FilterChain;
pub use filter::{Filter, FilterKind, FilterParameters, Slope};

/// Parameter constraints for the equalizer
///
/// All user-facing parameters are clamped to these ranges to prevent
/// invalid states and ensure numerical stability.
pub mod params {
    /// Frequency range of interest (Hz)
    pub const FREQ_MIN: f32 = 20.0;
    pub const FREQ_MAX: f32 = 20000.0;

    /// Gain range for bell and shelf filters (dB)
    pub const GAIN_MIN: f32 = -24.0;
    pub const GAIN_MAX: f32 = 24.0;

    /// Q range
    pub const Q_MIN: f32 = 0.1;
    pub const Q_MAX: f32 = 10.0;

    /// Pan range (stored, not used by the DSP)
    pub const PAN_MIN: f32 = -100.0;
    pub const PAN_MAX: f32 = 100.0;

    /// Output gain range (dB)
    pub const OUTPUT_GAIN_MIN: f32 = -24.0;
    pub const OUTPUT_GAIN_MAX: f32 = 24.0;

    /// Default Q (Butterworth)
    pub const DEFAULT_Q: f32 = 0.707;

    /// Maximum biquad sections per channel (96 dB/oct)
    pub const MAX_SECTIONS: usize = 8;

    /// Maximum channels a filter keeps state for
    pub const MAX_CHANNELS: usize = crate::domain::audio::ChannelCount::MAX;

    /// Default number of filter slots
    pub const DEFAULT_FILTER_SLOTS: usize = 8;

    /// Soft-clip threshold applied after every filter
    pub const SATURATION_THRESHOLD: f32 = 0.8;

    /// Magnitude floor used before taking a logarithm (-140 dB)
    pub const MAGNITUDE_FLOOR: f64 = 1e-7;
}

/// Convert decibels to a linear gain factor
#[inline]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear magnitude to decibels, flooring at -140 dB
#[inline]
pub fn gain_to_db(gain: f64) -> f64 {
    20.0 * gain.max(params::MAGNITUDE_FLOOR).log10()
}

/// Analog-style soft clipper: `tanh(x / t) * t`
#[inline]
pub fn soft_clip(sample: f32) -> f32 {
    let threshold = params::SATURATION_THRESHOLD;
    (sample / threshold).tanh() * threshold
}
