//! Lock-free parameter store
//!
//! Every scalar parameter lives in its own atomic. The control context is
//! the single writer; the audio and display contexts read whenever they
//! like without ever blocking. Parameters are independent, so a reader may
//! observe a mix of old and new values for one block; the next block picks
//! up the rest.

use crate::domain::dsp::params;
use crate::domain::dsp::{FilterKind, FilterParameters, Slope};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use thiserror::Error;

/// Errors raised by name-based parameter access
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid value {value} for parameter {id}")]
    InvalidValue { id: String, value: f32 },
}

pub type Result<T> = std::result::Result<T, ParameterError>;

/// `f32` stored in an `AtomicU32` by bit pattern
#[derive(Debug, Default)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Map a normalized position in `[0, 1]` to a frequency on the log scale
pub fn frequency_from_normalized(normalized: f32) -> f32 {
    let ratio = params::FREQ_MAX / params::FREQ_MIN;
    params::FREQ_MIN * ratio.powf(normalized.clamp(0.0, 1.0))
}

/// Inverse of [`frequency_from_normalized`]
pub fn frequency_to_normalized(frequency: f32) -> f32 {
    let ratio = params::FREQ_MAX / params::FREQ_MIN;
    let f = frequency.clamp(params::FREQ_MIN, params::FREQ_MAX);
    (f / params::FREQ_MIN).ln() / ratio.ln()
}

// ============================================================================
// FILTER SLOT
// ============================================================================

/// Atomic parameters of one filter slot
#[derive(Debug)]
pub struct FilterSlot {
    enabled: AtomicBool,
    kind: AtomicI32,
    frequency: AtomicF32,
    gain_db: AtomicF32,
    q: AtomicF32,
    slope: AtomicI32,
    pan: AtomicF32,
}

impl FilterSlot {
    pub fn new(initial: FilterParameters) -> Self {
        let initial = initial.clamped();
        Self {
            enabled: AtomicBool::new(initial.enabled),
            kind: AtomicI32::new(initial.kind.index()),
            frequency: AtomicF32::new(initial.frequency),
            gain_db: AtomicF32::new(initial.gain_db),
            q: AtomicF32::new(initial.q),
            slope: AtomicI32::new(initial.slope.index()),
            pan: AtomicF32::new(0.0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn kind(&self) -> FilterKind {
        FilterKind::from_index(self.kind.load(Ordering::Relaxed))
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.load()
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db.load()
    }

    pub fn q(&self) -> f32 {
        self.q.load()
    }

    pub fn slope(&self) -> Slope {
        Slope::from_index(self.slope.load(Ordering::Relaxed))
    }

    pub fn pan(&self) -> f32 {
        self.pan.load()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_kind(&self, kind: FilterKind) {
        self.kind.store(kind.index(), Ordering::Relaxed);
    }

    pub fn set_frequency(&self, frequency: f32) {
        self.frequency
            .store(frequency.clamp(params::FREQ_MIN, params::FREQ_MAX));
    }

    pub fn set_gain_db(&self, gain_db: f32) {
        self.gain_db
            .store(gain_db.clamp(params::GAIN_MIN, params::GAIN_MAX));
    }

    pub fn set_q(&self, q: f32) {
        self.q.store(q.clamp(params::Q_MIN, params::Q_MAX));
    }

    pub fn set_slope(&self, slope: Slope) {
        self.slope.store(slope.index(), Ordering::Relaxed);
    }

    pub fn set_pan(&self, pan: f32) {
        self.pan.store(pan.clamp(params::PAN_MIN, params::PAN_MAX));
    }

    /// Write every field of a parameter set
    pub fn store(&self, parameters: &FilterParameters) {
        self.set_kind(parameters.kind);
        self.set_frequency(parameters.frequency);
        self.set_gain_db(parameters.gain_db);
        self.set_q(parameters.q);
        self.set_slope(parameters.slope);
        self.set_enabled(parameters.enabled);
    }

    /// Read every field into a plain parameter set
    pub fn snapshot(&self) -> FilterParameters {
        FilterParameters {
            kind: self.kind(),
            frequency: self.frequency(),
            gain_db: self.gain_db(),
            q: self.q(),
            slope: self.slope(),
            enabled: self.is_enabled(),
        }
    }
}

// ============================================================================
// PARAMETER IDS
// ============================================================================

/// Per-slot parameter names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterParam {
    Enabled,
    Type,
    Frequency,
    Gain,
    Q,
    Pan,
    Slope,
}

impl FilterParam {
    pub const ALL: [FilterParam; 7] = [
        FilterParam::Enabled,
        FilterParam::Type,
        FilterParam::Frequency,
        FilterParam::Gain,
        FilterParam::Q,
        FilterParam::Pan,
        FilterParam::Slope,
    ];

    fn suffix(self) -> &'static str {
        match self {
            FilterParam::Enabled => "enabled",
            FilterParam::Type => "type",
            FilterParam::Frequency => "freq",
            FilterParam::Gain => "gain",
            FilterParam::Q => "q",
            FilterParam::Pan => "pan",
            FilterParam::Slope => "slope",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.suffix() == suffix)
    }
}

/// Address of one parameter in the store
///
/// Names follow `filter{i}_{enabled|type|freq|gain|q|pan|slope}`,
/// `output_gain` and `auto_gain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterId {
    Filter { slot: usize, param: FilterParam },
    OutputGain,
    AutoGain,
}

impl FromStr for ParameterId {
    type Err = ParameterError;

    fn from_str(name: &str) -> Result<Self> {
        let unknown = || ParameterError::UnknownParameter(name.to_string());

        match name {
            "output_gain" => return Ok(ParameterId::OutputGain),
            "auto_gain" => return Ok(ParameterId::AutoGain),
            _ => {}
        }

        let rest = name.strip_prefix("filter").ok_or_else(unknown)?;
        let (index, suffix) = rest.split_once('_').ok_or_else(unknown)?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(unknown());
        }

        let slot = index.parse().map_err(|_| unknown())?;
        let param = FilterParam::from_suffix(suffix).ok_or_else(unknown)?;
        Ok(ParameterId::Filter { slot, param })
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterId::Filter { slot, param } => write!(f, "filter{slot}_{}", param.suffix()),
            ParameterId::OutputGain => f.write_str("output_gain"),
            ParameterId::AutoGain => f.write_str("auto_gain"),
        }
    }
}

// ============================================================================
// PARAMETER STORE
// ============================================================================

/// All equalizer parameters, shareable across threads behind an `Arc`
#[derive(Debug)]
pub struct ParameterStore {
    slots: Vec<FilterSlot>,
    output_gain_db: AtomicF32,
    auto_gain: AtomicBool,
}

impl ParameterStore {
    /// Create `num_slots` Bell slots at 1 kHz; only the first is enabled
    pub fn new(num_slots: usize) -> Self {
        let slots = (0..num_slots)
            .map(|i| {
                FilterSlot::new(FilterParameters {
                    enabled: i == 0,
                    ..FilterParameters::default()
                })
            })
            .collect();

        Self {
            slots,
            output_gain_db: AtomicF32::new(0.0),
            auto_gain: AtomicBool::new(false),
        }
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&FilterSlot> {
        self.slots.get(index)
    }

    pub fn snapshot(&self, index: usize) -> Option<FilterParameters> {
        self.slot(index).map(FilterSlot::snapshot)
    }

    pub fn output_gain_db(&self) -> f32 {
        self.output_gain_db.load()
    }

    pub fn set_output_gain_db(&self, gain_db: f32) {
        self.output_gain_db
            .store(gain_db.clamp(params::OUTPUT_GAIN_MIN, params::OUTPUT_GAIN_MAX));
    }

    pub fn auto_gain_enabled(&self) -> bool {
        self.auto_gain.load(Ordering::Relaxed)
    }

    pub fn set_auto_gain(&self, enabled: bool) {
        self.auto_gain.store(enabled, Ordering::Relaxed);
    }

    fn slot_for(&self, id: &ParameterId, slot: usize) -> Result<&FilterSlot> {
        self.slot(slot)
            .ok_or_else(|| ParameterError::UnknownParameter(id.to_string()))
    }

    /// Set a parameter by id
    ///
    /// Booleans are true at `>= 0.5`; type and slope take their index,
    /// rounded. Scalars are clamped into range.
    pub fn set(&self, id: &ParameterId, value: f32) -> Result<()> {
        if !value.is_finite() {
            return Err(ParameterError::InvalidValue {
                id: id.to_string(),
                value,
            });
        }

        match *id {
            ParameterId::OutputGain => self.set_output_gain_db(value),
            ParameterId::AutoGain => self.set_auto_gain(value >= 0.5),
            ParameterId::Filter { slot, param } => {
                let slot = self.slot_for(id, slot)?;
                match param {
                    FilterParam::Enabled => slot.set_enabled(value >= 0.5),
                    FilterParam::Type => slot.set_kind(FilterKind::from_index(value.round() as i32)),
                    FilterParam::Frequency => slot.set_frequency(value),
                    FilterParam::Gain => slot.set_gain_db(value),
                    FilterParam::Q => slot.set_q(value),
                    FilterParam::Pan => slot.set_pan(value),
                    FilterParam::Slope => slot.set_slope(Slope::from_index(value.round() as i32)),
                }
            }
        }

        Ok(())
    }

    /// Read a parameter by id, in the same units [`set`](Self::set) takes
    pub fn get(&self, id: &ParameterId) -> Result<f32> {
        let as_f32 = |b: bool| if b { 1.0 } else { 0.0 };

        Ok(match *id {
            ParameterId::OutputGain => self.output_gain_db(),
            ParameterId::AutoGain => as_f32(self.auto_gain_enabled()),
            ParameterId::Filter { slot, param } => {
                let slot = self.slot_for(id, slot)?;
                match param {
                    FilterParam::Enabled => as_f32(slot.is_enabled()),
                    FilterParam::Type => slot.kind().index() as f32,
                    FilterParam::Frequency => slot.frequency(),
                    FilterParam::Gain => slot.gain_db(),
                    FilterParam::Q => slot.q(),
                    FilterParam::Pan => slot.pan(),
                    FilterParam::Slope => slot.slope().index() as f32,
                }
            }
        })
    }

    /// Convenience wrapper parsing the name first
    pub fn set_by_name(&self, name: &str, value: f32) -> Result<()> {
        self.set(&name.parse()?, value)
    }

    pub fn get_by_name(&self, name: &str) -> Result<f32> {
        self.get(&name.parse()?)
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(params::DEFAULT_FILTER_SLOTS)
    }
}
