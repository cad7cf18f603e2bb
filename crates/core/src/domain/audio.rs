//! Audio block and processing-spec abstractions
//!
//! The equalizer core never talks to an audio device. It receives planar
//! `f32` blocks of at most two channels from whatever host drives it, and a
//! [`ProcessSpec`] describing the sample rate and the largest block it will
//! ever be handed. Interleaved hosts convert with
//! [`AudioBuffer::read_interleaved`] / [`AudioBuffer::write_interleaved`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while configuring the audio path
#[derive(Debug, Error)]
pub enum AudioError {
    /// Invalid configuration for the processing chain
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The requested layout is not supported by the core
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// Number of audio channels the core can process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelCount {
    Mono,
    Stereo,
}

impl ChannelCount {
    /// Maximum channel count handled by a filter
    pub const MAX: usize = 2;

    pub fn count(&self) -> usize {
        match self {
            ChannelCount::Mono => 1,
            ChannelCount::Stereo => 2,
        }
    }

    pub fn from_count(count: usize) -> Result<Self> {
        match count {
            1 => Ok(ChannelCount::Mono),
            2 => Ok(ChannelCount::Stereo),
            n => Err(AudioError::UnsupportedConfiguration(format!(
                "{n} channels (only mono and stereo are supported)"
            ))),
        }
    }
}

/// Processing specification handed to `prepare`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub channels: ChannelCount,
}

impl ProcessSpec {
    /// Create a validated processing spec
    pub fn new(sample_rate: f64, max_block_size: usize, channels: ChannelCount) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AudioError::InvalidConfiguration(format!(
                "sample rate must be positive, got {sample_rate}"
            )));
        }
        if max_block_size == 0 {
            return Err(AudioError::InvalidConfiguration(
                "maximum block size must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            sample_rate,
            max_block_size,
            channels,
        })
    }

    /// Nyquist frequency for this spec
    pub fn nyquist(&self) -> f64 {
        self.sample_rate * 0.5
    }
}

impl Default for ProcessSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            max_block_size: 512,
            channels: ChannelCount::Stereo,
        }
    }
}

/// Planar block of `f32` samples with a fixed channel count
///
/// Storage is allocated once with a fixed capacity; changing the number of
/// active samples afterwards never reallocates, so a buffer created at
/// `prepare` time can be reused on the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    num_samples: usize,
}

impl AudioBuffer {
    /// Create a silent buffer able to hold `capacity` frames
    pub fn new(channels: ChannelCount, capacity: usize) -> Self {
        Self {
            channels: vec![vec![0.0; capacity]; channels.count()],
            num_samples: capacity,
        }
    }

    /// Wrap existing planar channel data
    pub fn from_channels(channels: Vec<Vec<f32>>) -> Result<Self> {
        ChannelCount::from_count(channels.len())?;

        let num_samples = channels[0].len();
        if channels.iter().any(|ch| ch.len() != num_samples) {
            return Err(AudioError::InvalidConfiguration(
                "all channels must have the same length".to_string(),
            ));
        }

        Ok(Self {
            channels,
            num_samples,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn capacity(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Set the number of active frames, clamped to the capacity
    ///
    /// Returns the number of frames actually active.
    pub fn set_num_samples(&mut self, num_samples: usize) -> usize {
        self.num_samples = num_samples.min(self.capacity());
        self.num_samples
    }

    /// Active samples of one channel, `None` if the channel does not exist
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|ch| &ch[..self.num_samples])
    }

    /// Mutable active samples of one channel
    pub fn channel_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let n = self.num_samples;
        self.channels.get_mut(index).map(|ch| &mut ch[..n])
    }

    /// Iterate over the active samples of every channel
    pub fn channels_mut(&mut self) -> impl Iterator<Item = &mut [f32]> {
        let n = self.num_samples;
        self.channels.iter_mut().map(move |ch| &mut ch[..n])
    }

    /// Load interleaved frames, returns the number of frames loaded
    pub fn read_interleaved(&mut self, interleaved: &[f32]) -> usize {
        let num_channels = self.num_channels();
        let frames = (interleaved.len() / num_channels).min(self.capacity());

        for (ch, channel) in self.channels.iter_mut().enumerate() {
            for (frame, sample) in channel.iter_mut().take(frames).enumerate() {
                *sample = interleaved[frame * num_channels + ch];
            }
        }

        self.num_samples = frames;
        frames
    }

    /// Store the active frames interleaved, returns the number of frames written
    pub fn write_interleaved(&self, interleaved: &mut [f32]) -> usize {
        let num_channels = self.num_channels();
        let frames = (interleaved.len() / num_channels).min(self.num_samples);

        for (ch, channel) in self.channels.iter().enumerate() {
            for (frame, sample) in channel.iter().take(frames).enumerate() {
                interleaved[frame * num_channels + ch] = *sample;
            }
        }

        frames
    }

    /// Multiply every active sample by `gain`
    pub fn apply_gain(&mut self, gain: f32) {
        for channel in self.channels_mut() {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Peak absolute value across all channels
    pub fn magnitude(&self) -> f32 {
        self.channels
            .iter()
            .flat_map(|ch| ch[..self.num_samples].iter())
            .fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// RMS level across all channels
    pub fn rms(&self) -> f32 {
        let total = self.num_samples * self.num_channels();
        if total == 0 {
            return 0.0;
        }

        let sum_squares: f32 = self
            .channels
            .iter()
            .flat_map(|ch| ch[..self.num_samples].iter())
            .map(|s| s * s)
            .sum();

        (sum_squares / total as f32).sqrt()
    }

    /// Zero every active sample
    pub fn clear(&mut self) {
        for channel in self.channels_mut() {
            channel.fill(0.0);
        }
    }
}
