//! Filter variants built from cascaded biquad sections
//!
//! Every [`Filter`] owns a fixed pool of `MAX_SECTIONS` sections per channel.
//! The slope selects how many of them are active; coefficients for the
//! active sections come from the rule registered for the filter's
//! [`FilterKind`]. Changing slope only moves the active count, so no memory
//! is ever allocated after construction.

use super::biquad::{BiquadCoeffs, BiquadSection};
use super::{gain_to_db, params, soft_clip};
use crate::domain::audio::{AudioBuffer, ProcessSpec};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Filter shapes offered by the equalizer
///
/// The discriminant order matches the parameter store's `type` choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterKind {
    LowPass,
    HighPass,
    #[default]
    Bell,
    LowShelf,
    HighShelf,
    Notch,
}

impl FilterKind {
    pub const ALL: [FilterKind; 6] = [
        FilterKind::LowPass,
        FilterKind::HighPass,
        FilterKind::Bell,
        FilterKind::LowShelf,
        FilterKind::HighShelf,
        FilterKind::Notch,
    ];

    /// Map a choice index to a kind; unknown indices fall back to `Bell`
    pub fn from_index(index: i32) -> Self {
        match index {
            0 => FilterKind::LowPass,
            1 => FilterKind::HighPass,
            2 => FilterKind::Bell,
            3 => FilterKind::LowShelf,
            4 => FilterKind::HighShelf,
            5 => FilterKind::Notch,
            _ => FilterKind::Bell,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            FilterKind::LowPass => 0,
            FilterKind::HighPass => 1,
            FilterKind::Bell => 2,
            FilterKind::LowShelf => 3,
            FilterKind::HighShelf => 4,
            FilterKind::Notch => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::LowPass => "Low Pass",
            FilterKind::HighPass => "High Pass",
            FilterKind::Bell => "Bell",
            FilterKind::LowShelf => "Low Shelf",
            FilterKind::HighShelf => "High Shelf",
            FilterKind::Notch => "Notch",
        }
    }

    /// Whether the gain parameter affects this shape
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterKind::Bell | FilterKind::LowShelf | FilterKind::HighShelf
        )
    }

    /// Number of cascaded sections per channel for a slope
    pub fn section_count(self, slope: Slope) -> usize {
        match self {
            FilterKind::LowPass | FilterKind::HighPass => match slope {
                Slope::Db6 | Slope::Db12 => 1,
                Slope::Db24 => 2,
                Slope::Db48 => 4,
                Slope::Db96 => 8,
            },
            FilterKind::Bell | FilterKind::LowShelf | FilterKind::HighShelf | FilterKind::Notch => {
                match slope {
                    Slope::Db6 => 1,
                    Slope::Db12 => 2,
                    Slope::Db24 => 3,
                    Slope::Db48 => 5,
                    Slope::Db96 => 8,
                }
            }
        }
    }

    /// Coefficient rule for this kind
    fn coefficient_rule(self) -> CoefficientRule {
        match self {
            FilterKind::LowPass => low_pass_rule,
            FilterKind::HighPass => high_pass_rule,
            FilterKind::Bell => bell_rule,
            FilterKind::LowShelf => low_shelf_rule,
            FilterKind::HighShelf => high_shelf_rule,
            FilterKind::Notch => notch_rule,
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested steepness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Slope {
    Db6,
    #[default]
    Db12,
    Db24,
    Db48,
    Db96,
}

impl Slope {
    pub const ALL: [Slope; 5] = [Slope::Db6, Slope::Db12, Slope::Db24, Slope::Db48, Slope::Db96];

    /// Map a slope index to a slope, clamping to the nearest table bound
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => Slope::Db6,
            1 => Slope::Db12,
            2 => Slope::Db24,
            3 => Slope::Db48,
            _ => Slope::Db96,
        }
    }

    pub fn index(self) -> i32 {
        match self {
            Slope::Db6 => 0,
            Slope::Db12 => 1,
            Slope::Db24 => 2,
            Slope::Db48 => 3,
            Slope::Db96 => 4,
        }
    }

    pub fn db_per_octave(self) -> u32 {
        match self {
            Slope::Db6 => 6,
            Slope::Db12 => 12,
            Slope::Db24 => 24,
            Slope::Db48 => 48,
            Slope::Db96 => 96,
        }
    }
}

/// Parameters of one filter slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParameters {
    pub kind: FilterKind,
    /// Center/corner frequency in Hz
    pub frequency: f32,
    /// Gain in dB (bell and shelves only)
    pub gain_db: f32,
    pub q: f32,
    pub slope: Slope,
    pub enabled: bool,
}

impl Default for FilterParameters {
    fn default() -> Self {
        Self {
            kind: FilterKind::Bell,
            frequency: 1000.0,
            gain_db: 0.0,
            q: params::DEFAULT_Q,
            slope: Slope::Db12,
            enabled: true,
        }
    }
}

impl FilterParameters {
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Copy with every scalar clamped into its valid range
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            frequency: clamp_or(self.frequency, params::FREQ_MIN, params::FREQ_MAX, 1000.0),
            gain_db: clamp_or(self.gain_db, params::GAIN_MIN, params::GAIN_MAX, 0.0),
            q: clamp_or(self.q, params::Q_MIN, params::Q_MAX, params::DEFAULT_Q),
            ..self
        }
    }

    /// True when the coefficient-relevant fields differ
    fn shape_differs(&self, other: &Self) -> bool {
        self.frequency != other.frequency
            || self.gain_db != other.gain_db
            || self.q != other.q
            || self.slope != other.slope
    }
}

/// Clamp, replacing NaN with a fallback
#[inline]
fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

// ============================================================================
// COEFFICIENT RULES
// ============================================================================

/// Computes the coefficients of every active section
///
/// `sections.len()` is the active section count for the filter's slope.
type CoefficientRule = fn(&FilterParameters, f64, &mut [BiquadCoeffs]);

fn low_pass_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    let coeffs = if p.slope == Slope::Db6 {
        BiquadCoeffs::first_order_low_pass(sample_rate, f64::from(p.frequency))
    } else {
        BiquadCoeffs::low_pass(sample_rate, f64::from(p.frequency), f64::from(p.q))
    };
    sections.fill(coeffs);
}

fn high_pass_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    let coeffs = if p.slope == Slope::Db6 {
        BiquadCoeffs::first_order_high_pass(sample_rate, f64::from(p.frequency))
    } else {
        BiquadCoeffs::high_pass(sample_rate, f64::from(p.frequency), f64::from(p.q))
    };
    sections.fill(coeffs);
}

/// Bell: a single peaking section, or a "flat-top" cascade
///
/// With more than one section the gain is split evenly, the section centers
/// are staggered geometrically over `0.6 * min(2, 1/(Q + 0.1))` octaves
/// around the target, and each section's Q is raised by `sqrt(N)` to keep
/// the flanks steep. The spread and Q factors are tuned by ear; the result
/// approximates a wider, flatter peak rather than matching a target curve.
fn bell_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    let freq = f64::from(p.frequency);
    let q = f64::from(p.q);
    let gain = f64::from(p.gain_db);
    let n = sections.len();

    if n == 1 {
        sections[0] = BiquadCoeffs::peaking(sample_rate, freq, q, gain);
        return;
    }

    let section_gain = gain / n as f64;
    let bandwidth_oct = (1.0 / (q + 0.1)).min(2.0);
    let range = bandwidth_oct * 0.6;
    let section_q = q * (n as f64).sqrt();

    for (i, coeffs) in sections.iter_mut().enumerate() {
        let offset_oct = -range * 0.5 + range * i as f64 / (n - 1) as f64;
        let section_freq = freq * 2.0_f64.powf(offset_oct);
        *coeffs = BiquadCoeffs::peaking(sample_rate, section_freq, section_q, section_gain);
    }
}

fn low_shelf_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    let section_gain = f64::from(p.gain_db) / sections.len() as f64;
    sections.fill(BiquadCoeffs::low_shelf(
        sample_rate,
        f64::from(p.frequency),
        f64::from(p.q),
        section_gain,
    ));
}

fn high_shelf_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    let section_gain = f64::from(p.gain_db) / sections.len() as f64;
    sections.fill(BiquadCoeffs::high_shelf(
        sample_rate,
        f64::from(p.frequency),
        f64::from(p.q),
        section_gain,
    ));
}

fn notch_rule(p: &FilterParameters, sample_rate: f64, sections: &mut [BiquadCoeffs]) {
    sections.fill(BiquadCoeffs::notch(
        sample_rate,
        f64::from(p.frequency),
        f64::from(p.q),
    ));
}

// ============================================================================
// FILTER
// ============================================================================

/// One equalizer band: cascaded sections per channel plus soft clipping
///
/// The kind is fixed for the lifetime of a filter; a type change goes
/// through [`FilterChain::change_filter_kind`](super::FilterChain::change_filter_kind),
/// which rebuilds the chain.
#[derive(Debug, Clone)]
pub struct Filter {
    params: FilterParameters,
    sample_rate: f64,
    max_block_size: usize,
    sections: [[BiquadSection; params::MAX_SECTIONS]; params::MAX_CHANNELS],
    active_sections: usize,
    // Set when a parameter changed while disabled
    coeffs_stale: bool,
}

impl Filter {
    /// Create a filter with default parameters for `kind`
    pub fn new(kind: FilterKind) -> Self {
        Self::with_parameters(FilterParameters::new(kind))
    }

    /// Create a filter from a parameter snapshot
    ///
    /// Coefficients are computed immediately for the default sample rate so
    /// the filter never runs with undefined taps.
    pub fn with_parameters(parameters: FilterParameters) -> Self {
        let spec = ProcessSpec::default();
        let mut filter = Self {
            params: parameters.clamped(),
            sample_rate: spec.sample_rate,
            max_block_size: spec.max_block_size,
            sections: [[BiquadSection::bypass(); params::MAX_SECTIONS]; params::MAX_CHANNELS],
            active_sections: 0,
            coeffs_stale: true,
        };
        filter.compute_coefficients();
        filter
    }

    pub fn kind(&self) -> FilterKind {
        self.params.kind
    }

    pub fn parameters(&self) -> FilterParameters {
        self.params
    }

    pub fn frequency(&self) -> f32 {
        self.params.frequency
    }

    pub fn gain_db(&self) -> f32 {
        self.params.gain_db
    }

    pub fn q(&self) -> f32 {
        self.params.q
    }

    pub fn slope(&self) -> Slope {
        self.params.slope
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Number of active sections (identical on every channel)
    pub fn section_count(&self) -> usize {
        self.active_sections
    }

    /// Active sections of one channel, empty for an unknown channel
    pub fn sections(&self, channel: usize) -> &[BiquadSection] {
        match self.sections.get(channel) {
            Some(sections) => &sections[..self.active_sections],
            None => &[],
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.set_parameters(FilterParameters {
            frequency,
            ..self.params
        });
    }

    pub fn set_gain(&mut self, gain_db: f32) {
        self.set_parameters(FilterParameters {
            gain_db,
            ..self.params
        });
    }

    pub fn set_q(&mut self, q: f32) {
        self.set_parameters(FilterParameters { q, ..self.params });
    }

    pub fn set_slope(&mut self, slope: Slope) {
        self.set_parameters(FilterParameters {
            slope,
            ..self.params
        });
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.set_parameters(FilterParameters {
            enabled,
            ..self.params
        });
    }

    /// Apply frequency, gain, Q, slope and enabled from a snapshot
    ///
    /// `params.kind` is ignored. Coefficients are recomputed only when a
    /// shape parameter actually changed; a disabled filter defers the work
    /// until it is enabled again.
    pub fn set_parameters(&mut self, params: FilterParameters) {
        let next = FilterParameters {
            kind: self.params.kind,
            ..params.clamped()
        };

        if next.shape_differs(&self.params) {
            self.coeffs_stale = true;
        }
        self.params = next;

        if self.params.enabled && self.coeffs_stale {
            self.compute_coefficients();
        }
    }

    /// Prepare for playback: store the spec, clear state, recompute
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        self.max_block_size = spec.max_block_size;
        self.reset();
        self.update_coefficients(spec.sample_rate);
    }

    /// Resize the cascade for the current slope and recompute every section
    pub fn update_coefficients(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.compute_coefficients();
    }

    fn compute_coefficients(&mut self) {
        let count = self.params.kind.section_count(self.params.slope);

        if count > self.active_sections {
            // Sections entering the cascade start from silence
            for channel in self.sections.iter_mut() {
                for section in &mut channel[self.active_sections..count] {
                    section.reset();
                }
            }
        }
        self.active_sections = count;

        let mut coeffs = [BiquadCoeffs::default(); params::MAX_SECTIONS];
        let rule = self.params.kind.coefficient_rule();
        rule(&self.params, self.sample_rate, &mut coeffs[..count]);

        for channel in self.sections.iter_mut() {
            for (section, c) in channel.iter_mut().zip(&coeffs[..count]) {
                section.set_coeffs(*c);
            }
        }

        self.coeffs_stale = false;
        trace!(
            kind = %self.params.kind,
            sections = count,
            frequency = self.params.frequency,
            "Filter coefficients updated"
        );
    }

    /// Clear delay state of every section, keeping coefficients
    pub fn reset(&mut self) {
        for channel in self.sections.iter_mut() {
            for section in channel.iter_mut() {
                section.reset();
            }
        }
    }

    /// Run the cascade on every channel, then soft-clip
    pub fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.params.enabled {
            return;
        }
        if self.coeffs_stale {
            self.compute_coefficients();
        }

        let active = self.active_sections;
        for (sections, channel) in self.sections.iter_mut().zip(buffer.channels_mut()) {
            for section in &mut sections[..active] {
                section.process(channel);
            }
            for sample in channel.iter_mut() {
                *sample = soft_clip(*sample);
            }
        }
    }

    /// Response in dB at `frequency`, summed over channel 0's sections
    ///
    /// A disabled filter is not in the signal path and reports 0 dB.
    pub fn frequency_response(&self, frequency: f32) -> f32 {
        if !self.params.enabled {
            return 0.0;
        }

        self.sections(0)
            .iter()
            .map(|section| gain_to_db(section.magnitude_at(f64::from(frequency), self.sample_rate)))
            .sum::<f64>() as f32
    }
}
