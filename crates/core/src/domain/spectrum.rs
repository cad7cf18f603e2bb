//! Windowed-FFT spectrum estimator for visualization
//!
//! Samples are accumulated into non-overlapping blocks of `2^order`
//! samples. Every full block is Hann-windowed, transformed, converted to a
//! clamped dB curve and folded into an exponentially smoothed curve that
//! the display reads through [`SpectrumAnalyzer::magnitude_for_frequency`].
//!
//! All buffers are allocated when the order is set; pushing samples never
//! allocates.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Smallest supported FFT order (1024 points)
pub const MIN_FFT_ORDER: u32 = 10;
/// Largest supported FFT order (8192 points)
pub const MAX_FFT_ORDER: u32 = 13;
pub const DEFAULT_FFT_ORDER: u32 = 11;

/// Weight of the previous smoothed value
pub const SMOOTHING: f32 = 0.8;

/// Display range in dB
pub const DB_FLOOR: f32 = -60.0;
pub const DB_CEILING: f32 = 0.0;

const MAGNITUDE_FLOOR: f32 = 1e-7;

pub struct SpectrumAnalyzer {
    fft_order: u32,
    fft_size: usize,
    sample_rate: f64,

    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    // 2 / sum(window): a bin-centered full-scale sine reads 0 dB
    window_scale: f32,

    fifo: Vec<f32>,
    fifo_index: usize,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    magnitudes: Vec<f32>,
    smoothed: Vec<f32>,
    new_data: bool,
}

impl SpectrumAnalyzer {
    /// Create an analyzer with the default order (2048 points)
    pub fn new() -> Self {
        Self::with_order(DEFAULT_FFT_ORDER)
    }

    /// Create an analyzer; `order` is clamped to 10..=13
    pub fn with_order(order: u32) -> Self {
        let order = order.clamp(MIN_FFT_ORDER, MAX_FFT_ORDER);
        let fft_size = 1usize << order;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        // Symmetric Hann
        let denom = (fft_size - 1) as f32;
        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();
        let window_scale = 2.0 / window.iter().sum::<f32>();

        let scope = fft_size / 2;
        Self {
            fft_order: order,
            fft_size,
            sample_rate: 44100.0,
            fft,
            window,
            window_scale,
            fifo: vec![0.0; fft_size],
            fifo_index: 0,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            magnitudes: vec![DB_FLOOR; scope],
            smoothed: vec![DB_FLOOR; scope],
            new_data: false,
        }
    }

    /// Set the sample rate used for bin mapping and drop any partial block
    pub fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.fifo_index = 0;
    }

    /// Reallocate for a new order; same order is a no-op
    ///
    /// Smoothing history and the new-data flag are reset.
    pub fn set_fft_order(&mut self, order: u32) {
        let order = order.clamp(MIN_FFT_ORDER, MAX_FFT_ORDER);
        if order == self.fft_order {
            return;
        }

        let sample_rate = self.sample_rate;
        *self = Self::with_order(order);
        self.sample_rate = sample_rate;
        debug!(order, fft_size = self.fft_size, "Spectrum analyzer resized");
    }

    /// Clear accumulation, smoothing and the new-data flag
    pub fn reset(&mut self) {
        self.fifo.fill(0.0);
        self.fifo_index = 0;
        self.magnitudes.fill(DB_FLOOR);
        self.smoothed.fill(DB_FLOOR);
        self.new_data = false;
    }

    pub fn fft_order(&self) -> u32 {
        self.fft_order
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Width of one bin in Hz
    pub fn bin_width(&self) -> f64 {
        self.sample_rate / self.fft_size as f64
    }

    /// Smoothed dB curve, one value per bin up to Nyquist
    pub fn smoothed_spectrum(&self) -> &[f32] {
        &self.smoothed
    }

    /// Unsmoothed dB curve of the most recent block
    pub fn latest_spectrum(&self) -> &[f32] {
        &self.magnitudes
    }

    pub fn has_new_data(&self) -> bool {
        self.new_data
    }

    pub fn clear_new_data_flag(&mut self) {
        self.new_data = false;
    }

    /// Accumulate samples, running one FFT per completed block
    pub fn push_samples(&mut self, samples: &[f32]) {
        let mut remaining = samples;

        while !remaining.is_empty() {
            let take = (self.fft_size - self.fifo_index).min(remaining.len());
            self.fifo[self.fifo_index..self.fifo_index + take].copy_from_slice(&remaining[..take]);
            self.fifo_index += take;
            remaining = &remaining[take..];

            if self.fifo_index == self.fft_size {
                self.perform_fft();
                self.fifo_index = 0;
            }
        }
    }

    fn perform_fft(&mut self) {
        for ((out, &sample), &w) in self.buffer.iter_mut().zip(&self.fifo).zip(&self.window) {
            *out = Complex::new(sample * w, 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        for ((bin, raw), smoothed) in self
            .buffer
            .iter()
            .zip(self.magnitudes.iter_mut())
            .zip(self.smoothed.iter_mut())
        {
            let magnitude = (bin.norm() * self.window_scale).max(MAGNITUDE_FLOOR);
            let db = (20.0 * magnitude.log10()).clamp(DB_FLOOR, DB_CEILING);

            *raw = db;
            *smoothed = (SMOOTHING * *smoothed + (1.0 - SMOOTHING) * db).clamp(DB_FLOOR, DB_CEILING);
        }

        self.new_data = true;
    }

    /// Smoothed level in dB at `frequency`, linearly interpolated
    ///
    /// Frequencies at or above the last bin read the last bin; negative
    /// frequencies read bin 0.
    pub fn magnitude_for_frequency(&self, frequency: f32) -> f32 {
        let last = self.smoothed.len() - 1;
        let position = (f64::from(frequency) / self.bin_width()).max(0.0);
        let bin = position.floor() as usize;

        if bin >= last {
            return self.smoothed[last];
        }

        let frac = (position - bin as f64) as f32;
        let lower = self.smoothed[bin];
        let upper = self.smoothed[bin + 1];
        lower + (upper - lower) * frac
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_order", &self.fft_order)
            .field("fft_size", &self.fft_size)
            .field("sample_rate", &self.sample_rate)
            .field("fifo_index", &self.fifo_index)
            .field("new_data", &self.new_data)
            .finish_non_exhaustive()
    }
}
