//! Domain entities and business rules

pub mod audio;
pub mod dsp;
pub mod spectrum;
pub mod params;
pub mod config;

// Re-export specific items to avoid ambiguous glob imports
pub use audio::{AudioBuffer, AudioError, ChannelCount, ProcessSpec};
pub use config::{AppConfig, ConfigError, ConfigManager, EqualizerConfig, PresetManager};
pub use dsp::{
    BiquadCoeffs, BiquadSection, Filter, FilterChain, FilterKind, FilterParameters, Slope,
};
pub use params::{AtomicF32, FilterParam, FilterSlot, ParameterError, ParameterId, ParameterStore};
pub use spectrum::SpectrumAnalyzer;
