//! Real-time plumbing around the equalizer core
//!
//! This module connects the three contexts the equalizer runs in:
//! - Audio: [`EqualizerEngine`] processes blocks and captures the dry signal
//! - Display: [`SpectrumPoller`] and [`ResponseModel`] feed the visuals
//! - Control: writes the shared parameter store
//!
//! Audio and display only meet through the lock-free [`SampleFifo`].

pub mod analyzer;
pub mod engine;
pub mod lockfree_buffer;

pub use analyzer::{log_frequencies, ResponseModel, SpectrumPoller};
pub use engine::{makeup_gain, EqualizerEngine, LevelMeter};
pub use lockfree_buffer::{FifoConsumer, FifoProducer, SampleFifo};
