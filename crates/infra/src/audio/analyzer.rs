//! Display-side consumers: spectrum polling and the response curve

use paraeq_core::domain::audio::ProcessSpec;
use paraeq_core::domain::dsp::{params, FilterChain};
use paraeq_core::domain::params::ParameterStore;
use paraeq_core::domain::spectrum::SpectrumAnalyzer;
use tracing::trace;

use super::FifoConsumer;

/// Feeds captured samples into a [`SpectrumAnalyzer`]
///
/// Meant to be polled from a display timer. The analyzer belongs to the
/// poller, so the audio thread never sees it.
pub struct SpectrumPoller {
    consumer: FifoConsumer,
    analyzer: SpectrumAnalyzer,
}

impl SpectrumPoller {
    pub fn new(consumer: FifoConsumer, analyzer: SpectrumAnalyzer) -> Self {
        Self { consumer, analyzer }
    }

    /// Drain the FIFO into the analyzer, returns whether a new curve is ready
    pub fn poll(&mut self) -> bool {
        let Self { consumer, analyzer } = self;
        let drained = consumer.drain(|chunk| analyzer.push_samples(chunk));
        trace!(drained, "Spectrum poll");

        self.analyzer.has_new_data()
    }

    /// Mark the current curve as consumed
    pub fn acknowledge(&mut self) {
        self.analyzer.clear_new_data_flag();
    }

    pub fn analyzer(&self) -> &SpectrumAnalyzer {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut SpectrumAnalyzer {
        &mut self.analyzer
    }
}

/// Mirror of the equalizer's filter chain for drawing its response
///
/// Keeps a private [`FilterChain`] that follows the parameter store, so the
/// display can evaluate responses without touching audio-thread state.
pub struct ResponseModel {
    chain: FilterChain,
}

impl ResponseModel {
    pub fn new(store: &ParameterStore, spec: &ProcessSpec) -> Self {
        let mut chain = FilterChain::from_store(store);
        chain.prepare(spec);
        Self { chain }
    }

    /// Follow the store; returns `true` if the chain was rebuilt
    pub fn refresh(&mut self, store: &ParameterStore) -> bool {
        self.chain.apply_parameters(store)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.chain.update_all_coefficients(sample_rate);
    }

    pub fn total_frequency_response(&self, frequency: f32) -> f32 {
        self.chain.total_frequency_response(frequency)
    }

    /// Response of one filter, `None` for an unknown index
    pub fn filter_response(&self, index: usize, frequency: f32) -> Option<f32> {
        self.chain.filter(index).map(|f| f.frequency_response(frequency))
    }

    /// Total response at `points` log-spaced frequencies, 20 Hz to 20 kHz
    pub fn curve(&self, points: usize) -> Vec<(f32, f32)> {
        log_frequencies(points)
            .map(|f| (f, self.chain.total_frequency_response(f)))
            .collect()
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

/// `points` frequencies spaced evenly on a log axis over the audible range
pub fn log_frequencies(points: usize) -> impl Iterator<Item = f32> {
    let ratio = params::FREQ_MAX / params::FREQ_MIN;
    let steps = points.saturating_sub(1).max(1) as f32;
    (0..points).map(move |i| params::FREQ_MIN * ratio.powf(i as f32 / steps))
}
