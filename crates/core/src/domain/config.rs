//! Configuration management for the equalizer
//!
//! This module provides:
//! - Application settings (sample rate, block size, analyzer order)
//! - The equalizer state (filter slots, output gain, auto gain) as TOML
//! - Named presets and the main config file with corrupt-file recovery

use crate::domain::audio::{AudioError, ChannelCount, ProcessSpec};
use crate::domain::dsp::{params, FilterParameters};
use crate::domain::params::ParameterStore;
use crate::domain::spectrum::{DEFAULT_FFT_ORDER, MAX_FFT_ORDER, MIN_FFT_ORDER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Audio configuration error: {0}")]
    Audio(#[from] AudioError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Preset not found: {0}")]
    PresetNotFound(String),
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Largest block handed to the engine, in frames
    pub block_size: u32,

    /// Spectrum analyzer FFT order (10..=13)
    pub fft_order: u32,

    /// Capacity of the audio-to-display sample FIFO
    pub capture_capacity: usize,

    /// Preset directory
    pub preset_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            fft_order: DEFAULT_FFT_ORDER,
            capture_capacity: 8192,
            preset_dir: PathBuf::from("presets"),
        }
    }
}

impl AppConfig {
    /// Processing spec for a stereo stream at these settings
    pub fn process_spec(&self) -> Result<ProcessSpec> {
        Ok(ProcessSpec::new(
            f64::from(self.sample_rate),
            self.block_size as usize,
            ChannelCount::Stereo,
        )?)
    }
}

/// Complete equalizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqualizerConfig {
    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub output_gain_db: f32,

    #[serde(default)]
    pub auto_gain: bool,

    /// One entry per filter slot, in processing order
    #[serde(default)]
    pub filters: Vec<FilterParameters>,
}

impl Default for EqualizerConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            output_gain_db: 0.0,
            auto_gain: false,
            filters: Vec::new(),
        }
    }
}

impl EqualizerConfig {
    /// Load configuration from TOML file
    #[instrument(skip(path))]
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = fs::read_to_string(path).await?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!(filters = config.filters.len(), "Configuration loaded successfully");
        Ok(config)
    }

    /// Save configuration to TOML file
    #[instrument(skip(self, path))]
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(path = %path.display(), "Saving configuration");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let toml_str = toml::to_string_pretty(self)?;
        fs::write(path, toml_str).await?;

        debug!("Configuration saved successfully");
        Ok(())
    }

    /// Factory layout: eight Bell slots at 1 kHz, only the first enabled
    pub fn factory_default() -> Self {
        let filters = (0..params::DEFAULT_FILTER_SLOTS)
            .map(|i| FilterParameters {
                enabled: i == 0,
                ..FilterParameters::default()
            })
            .collect();

        Self {
            filters,
            ..Self::default()
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.app.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be non-zero".to_string()));
        }
        if self.app.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be non-zero".to_string()));
        }
        if !(MIN_FFT_ORDER..=MAX_FFT_ORDER).contains(&self.app.fft_order) {
            return Err(ConfigError::Invalid(format!(
                "fft_order must be within {MIN_FFT_ORDER}..={MAX_FFT_ORDER}, got {}",
                self.app.fft_order
            )));
        }
        if !self.output_gain_db.is_finite() {
            return Err(ConfigError::Invalid("output_gain_db must be finite".to_string()));
        }

        for (i, filter) in self.filters.iter().enumerate() {
            if ![filter.frequency, filter.gain_db, filter.q].iter().all(|v| v.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "filter {i} has a non-finite parameter"
                )));
            }
        }

        Ok(())
    }

    /// Write this configuration into a parameter store
    ///
    /// Filters beyond the store's slot count are ignored. Returns the number
    /// of slots written.
    pub fn apply_to(&self, store: &ParameterStore) -> usize {
        store.set_output_gain_db(self.output_gain_db);
        store.set_auto_gain(self.auto_gain);

        let mut applied = 0;
        for (i, filter) in self.filters.iter().enumerate() {
            match store.slot(i) {
                Some(slot) => {
                    slot.store(filter);
                    applied += 1;
                }
                None => {
                    debug!(
                        ignored = self.filters.len() - i,
                        slots = store.num_slots(),
                        "More filters than parameter slots"
                    );
                    break;
                }
            }
        }
        applied
    }

    /// Capture the current state of a parameter store
    pub fn from_store(store: &ParameterStore, app: AppConfig) -> Self {
        Self {
            app,
            output_gain_db: store.output_gain_db(),
            auto_gain: store.auto_gain_enabled(),
            filters: (0..store.num_slots())
                .filter_map(|i| store.snapshot(i))
                .collect(),
        }
    }

    /// Build a parameter store sized to this configuration
    pub fn to_store(&self) -> ParameterStore {
        let store = ParameterStore::new(self.filters.len());
        self.apply_to(&store);
        store
    }
}

/// Named presets stored as `<preset_dir>/<name>.toml`
pub struct PresetManager {
    preset_dir: PathBuf,
}

impl PresetManager {
    pub fn new(preset_dir: PathBuf) -> Self {
        Self { preset_dir }
    }

    /// Path of a preset file; names must stay inside the preset directory
    fn preset_path(&self, name: &str) -> Result<PathBuf> {
        validate_name(name)?;
        Ok(self.preset_dir.join(format!("{name}.toml")))
    }

    /// List all available presets, sorted by name
    #[instrument(skip(self))]
    pub async fn list_presets(&self) -> Result<Vec<String>> {
        let mut presets = Vec::new();

        let mut entries = fs::read_dir(&self.preset_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "toml") {
                if let Some(name) = path.file_stem().and_then(|s| s.to_str()) {
                    presets.push(name.to_string());
                }
            }
        }

        presets.sort();
        debug!(count = presets.len(), "Listed presets");
        Ok(presets)
    }

    #[instrument(skip(self))]
    pub async fn load_preset(&self, name: &str) -> Result<EqualizerConfig> {
        let path = self.preset_path(name)?;
        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        EqualizerConfig::load_from_file(&path).await
    }

    #[instrument(skip(self, config))]
    pub async fn save_preset(&self, name: &str, config: &EqualizerConfig) -> Result<()> {
        config.save_to_file(self.preset_path(name)?).await
    }

    #[instrument(skip(self))]
    pub async fn delete_preset(&self, name: &str) -> Result<()> {
        let path = self.preset_path(name)?;
        if !path.exists() {
            return Err(ConfigError::PresetNotFound(name.to_string()));
        }

        fs::remove_file(&path).await?;
        info!(name, "Preset deleted");
        Ok(())
    }

    /// Invalid names never exist
    pub async fn preset_exists(&self, name: &str) -> bool {
        match self.preset_path(name) {
            Ok(path) => fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(ConfigError::Invalid(format!("invalid preset name: {name:?}")));
    }
    Ok(())
}

/// Main configuration file at `<config_dir>/config.toml`
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf) -> Self {
        let config_path = config_dir.join("config.toml");
        Self {
            config_dir,
            config_path,
        }
    }

    /// `~/.config/paraeq` on Linux, the platform equivalent elsewhere
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("paraeq"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config file
    ///
    /// A missing file yields the factory default, which is written out for
    /// next time. A corrupt file is copied to `config.toml.corrupt` and the
    /// factory default is returned.
    #[instrument(skip(self))]
    pub async fn load(&self) -> EqualizerConfig {
        if !self.config_path.exists() {
            info!(
                path = %self.config_path.display(),
                "Config file not found, creating factory default"
            );

            let config = EqualizerConfig::factory_default();
            if let Err(e) = self.save(&config).await {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to save factory default config"
                );
            }
            return config;
        }

        match EqualizerConfig::load_from_file(&self.config_path).await {
            Ok(config) => config,
            Err(e) => {
                error!(
                    path = %self.config_path.display(),
                    error = %e,
                    "Failed to load config, using factory default"
                );

                let backup_path = self.config_path.with_extension("toml.corrupt");
                if let Err(copy_err) = fs::copy(&self.config_path, &backup_path).await {
                    error!(
                        path = %backup_path.display(),
                        error = %copy_err,
                        "Failed to backup corrupt config"
                    );
                }

                EqualizerConfig::factory_default()
            }
        }
    }

    #[instrument(skip(self, config))]
    pub async fn save(&self, config: &EqualizerConfig) -> Result<()> {
        fs::create_dir_all(&self.config_dir).await?;
        config.save_to_file(&self.config_path).await
    }

    /// Delete the config file if present
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        if self.config_path.exists() {
            fs::remove_file(&self.config_path).await?;
            info!(path = %self.config_path.display(), "Configuration cleared");
        }
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}
