//! Second-order IIR sections
//!
//! Coefficient design follows the RBJ "Audio EQ Cookbook" for the
//! second-order shapes and the prewarped bilinear transform for the
//! first-order low/high pass. Design math runs in `f64`, the taps are stored
//! as `f32` for processing.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Biquad filter coefficients
///
/// Direct Form I implementation for numerical stability.
/// Coefficients are pre-computed to avoid per-sample calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    /// Numerator coefficients
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    /// Denominator coefficients (a0 is normalized to 1.0)
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

/// Keep the design frequency strictly inside (0, Nyquist)
#[inline]
fn design_frequency(sample_rate: f64, freq: f64) -> f64 {
    freq.clamp(1.0, sample_rate * 0.499)
}

#[inline]
fn design_q(q: f64) -> f64 {
    q.max(1e-3)
}

/// Intermediate values shared by the cookbook formulas
struct Cookbook {
    cos_w0: f64,
    alpha: f64,
}

impl Cookbook {
    fn new(sample_rate: f64, freq: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * design_frequency(sample_rate, freq) / sample_rate;
        Self {
            cos_w0: w0.cos(),
            alpha: w0.sin() / (2.0 * design_q(q)),
        }
    }
}

impl BiquadCoeffs {
    /// Normalize raw taps by `a0`
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// First-order low pass (6 dB/oct), -3 dB at `freq`
    #[must_use]
    pub fn first_order_low_pass(sample_rate: f64, freq: f64) -> Self {
        let n = (PI * design_frequency(sample_rate, freq) / sample_rate).tan();
        Self::normalized(n, n, 0.0, n + 1.0, n - 1.0, 0.0)
    }

    /// First-order high pass (6 dB/oct), -3 dB at `freq`
    #[must_use]
    pub fn first_order_high_pass(sample_rate: f64, freq: f64) -> Self {
        let n = (PI * design_frequency(sample_rate, freq) / sample_rate).tan();
        Self::normalized(1.0, -1.0, 0.0, n + 1.0, n - 1.0, 0.0)
    }

    /// Second-order low pass (12 dB/oct)
    #[must_use]
    pub fn low_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);
        let b1 = 1.0 - c.cos_w0;
        let b0 = b1 / 2.0;

        Self::normalized(b0, b1, b0, 1.0 + c.alpha, -2.0 * c.cos_w0, 1.0 - c.alpha)
    }

    /// Second-order high pass (12 dB/oct)
    #[must_use]
    pub fn high_pass(sample_rate: f64, freq: f64, q: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);
        let b0 = (1.0 + c.cos_w0) / 2.0;

        Self::normalized(
            b0,
            -(1.0 + c.cos_w0),
            b0,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    /// Peaking EQ: boosts or cuts around a center frequency
    #[must_use]
    pub fn peaking(sample_rate: f64, freq: f64, q: f64, gain_db: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);
        let a = 10.0_f64.powf(gain_db / 40.0);

        Self::normalized(
            1.0 + c.alpha * a,
            -2.0 * c.cos_w0,
            1.0 - c.alpha * a,
            1.0 + c.alpha / a,
            -2.0 * c.cos_w0,
            1.0 - c.alpha / a,
        )
    }

    /// Low shelf: boosts or cuts below the corner frequency
    #[must_use]
    pub fn low_shelf(sample_rate: f64, freq: f64, q: f64, gain_db: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);
        let a = 10.0_f64.powf(gain_db / 40.0);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * c.alpha;

        Self::normalized(
            a * ((a + 1.0) - (a - 1.0) * c.cos_w0 + two_sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * c.cos_w0),
            a * ((a + 1.0) - (a - 1.0) * c.cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * c.cos_w0 + two_sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * c.cos_w0),
            (a + 1.0) + (a - 1.0) * c.cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// High shelf: boosts or cuts above the corner frequency
    #[must_use]
    pub fn high_shelf(sample_rate: f64, freq: f64, q: f64, gain_db: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);
        let a = 10.0_f64.powf(gain_db / 40.0);
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * c.alpha;

        Self::normalized(
            a * ((a + 1.0) + (a - 1.0) * c.cos_w0 + two_sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * c.cos_w0),
            a * ((a + 1.0) + (a - 1.0) * c.cos_w0 - two_sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * c.cos_w0 + two_sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * c.cos_w0),
            (a + 1.0) - (a - 1.0) * c.cos_w0 - two_sqrt_a_alpha,
        )
    }

    /// Notch: rejects a narrow band around the center frequency
    #[must_use]
    pub fn notch(sample_rate: f64, freq: f64, q: f64) -> Self {
        let c = Cookbook::new(sample_rate, freq, q);

        Self::normalized(
            1.0,
            -2.0 * c.cos_w0,
            1.0,
            1.0 + c.alpha,
            -2.0 * c.cos_w0,
            1.0 - c.alpha,
        )
    }

    /// Exact linear magnitude of the transfer function at `freq`
    ///
    /// Evaluates `H(z)` on the unit circle at `z = e^{jω}`, `ω = 2πf/fs`.
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let z1 = Complex64::from_polar(1.0, -w);
        let z2 = z1 * z1;

        let numerator = f64::from(self.b0) + z1 * f64::from(self.b1) + z2 * f64::from(self.b2);
        let denominator = 1.0 + z1 * f64::from(self.a1) + z2 * f64::from(self.a2);

        (numerator / denominator).norm()
    }
}

/// Stateful biquad section using Direct Form I
///
/// Direct Form I is chosen over Transposed Direct Form II for:
/// - Better numerical stability with low-frequency filters
/// - Easier coefficient updates without artifacts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadSection {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl Default for BiquadSection {
    fn default() -> Self {
        Self::bypass()
    }
}

impl BiquadSection {
    /// Create a new section with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Create a bypass section (unity gain)
    pub fn bypass() -> Self {
        Self::new(BiquadCoeffs::default())
    }

    /// Update section coefficients
    ///
    /// Delay state is kept so a running signal continues smoothly.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Process a single sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        // Direct Form I: y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
        //                        - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x + self.coeffs.b1 * self.x1 + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        // Update state
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }

    /// Process a buffer of samples in place
    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset delay state, keeping coefficients
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    /// Linear magnitude of this section at `freq`
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        self.coeffs.magnitude_at(freq, sample_rate)
    }
}
