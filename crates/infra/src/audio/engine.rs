//! Real-time equalizer engine
//!
//! The [`EqualizerEngine`] is what an audio callback drives. Per block it
//! captures the dry signal for the analyzer, syncs the filter chain with the
//! parameter store, runs the chain, applies gain matching and output gain,
//! and publishes a peak level. Nothing on that path allocates, locks or
//! logs above `trace`.

use std::sync::Arc;
use tracing::{debug, info};
use paraeq_core::domain::audio::{AudioBuffer, ProcessSpec};
use paraeq_core::domain::dsp::{db_to_gain, FilterChain};
use paraeq_core::domain::params::{AtomicF32, ParameterStore};

use super::FifoProducer;

/// RMS below which gain matching is skipped
pub const AUTO_GAIN_MIN_RMS: f32 = 1e-4;

/// Bounds of the gain-matching factor (about -12 dB to +12 dB)
pub const MAKEUP_GAIN_MIN: f32 = 0.25;
pub const MAKEUP_GAIN_MAX: f32 = 4.0;

/// Meter reading for silence
pub const METER_FLOOR_DB: f32 = -60.0;
const METER_SILENCE: f32 = 1e-5;

/// Output peak level shared with the display
#[derive(Debug)]
pub struct LevelMeter {
    peak_db: AtomicF32,
}

impl LevelMeter {
    fn new() -> Self {
        Self {
            peak_db: AtomicF32::new(METER_FLOOR_DB),
        }
    }

    /// Peak of the last processed block in dBFS
    pub fn peak_db(&self) -> f32 {
        self.peak_db.load()
    }

    fn publish(&self, peak: f32) {
        let db = if peak > METER_SILENCE {
            20.0 * peak.log10()
        } else {
            METER_FLOOR_DB
        };
        self.peak_db.store(db);
    }
}

/// Gain-matching factor, `None` when either level is too quiet to measure
pub fn makeup_gain(input_rms: f32, output_rms: f32) -> Option<f32> {
    if input_rms > AUTO_GAIN_MIN_RMS && output_rms > AUTO_GAIN_MIN_RMS {
        Some((input_rms / output_rms).clamp(MAKEUP_GAIN_MIN, MAKEUP_GAIN_MAX))
    } else {
        None
    }
}

/// Audio-context half of the equalizer
pub struct EqualizerEngine {
    store: Arc<ParameterStore>,
    chain: FilterChain,
    capture: FifoProducer,
    meter: Arc<LevelMeter>,
    spec: ProcessSpec,
    last_makeup_gain: f32,
}

impl EqualizerEngine {
    /// Build one filter per parameter slot
    pub fn new(store: Arc<ParameterStore>, capture: FifoProducer) -> Self {
        let chain = FilterChain::from_store(&store);
        debug!(filters = chain.len(), "Equalizer engine created");

        Self {
            store,
            chain,
            capture,
            meter: Arc::new(LevelMeter::new()),
            spec: ProcessSpec::default(),
            last_makeup_gain: 1.0,
        }
    }

    /// Prepare for playback at `spec`
    pub fn prepare(&mut self, spec: &ProcessSpec) {
        info!(
            sample_rate = spec.sample_rate,
            max_block_size = spec.max_block_size,
            channels = spec.channels.count(),
            "Preparing equalizer engine"
        );

        self.spec = *spec;
        self.chain.apply_parameters(&self.store);
        self.chain.prepare(spec);
        self.last_makeup_gain = 1.0;
    }

    /// Clear all filter state
    pub fn release(&mut self) {
        debug!("Releasing equalizer engine");
        self.chain.reset();
    }

    /// Process one block in place
    pub fn process_block(&mut self, buffer: &mut AudioBuffer) {
        if let Some(dry) = buffer.channel(0) {
            self.capture.push(dry);
        }

        self.chain.apply_parameters(&self.store);

        let input_rms = buffer.rms();
        self.chain.process(buffer);

        self.last_makeup_gain = 1.0;
        if self.store.auto_gain_enabled() {
            if let Some(gain) = makeup_gain(input_rms, buffer.rms()) {
                buffer.apply_gain(gain);
                self.last_makeup_gain = gain;
            }
        }

        let output_gain = db_to_gain(self.store.output_gain_db());
        if output_gain != 1.0 {
            buffer.apply_gain(output_gain);
        }

        self.meter.publish(buffer.magnitude());
    }

    /// Handle to the output meter for the display
    pub fn meter(&self) -> Arc<LevelMeter> {
        Arc::clone(&self.meter)
    }

    /// Gain-matching factor applied to the last block (1.0 if none)
    pub fn last_makeup_gain(&self) -> f32 {
        self.last_makeup_gain
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Samples the capture FIFO had to drop so far
    pub fn dropped_capture_samples(&self) -> u64 {
        self.capture.dropped_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFifo;
    use paraeq_core::domain::audio::ChannelCount;
    use paraeq_core::domain::dsp::{FilterKind, Slope};

    const SAMPLE_RATE: f64 = 48000.0;

    fn engine_with(store: Arc<ParameterStore>) -> (EqualizerEngine, crate::audio::FifoConsumer) {
        let (producer, consumer) = SampleFifo::with_capacity(8192);
        let mut engine = EqualizerEngine::new(store, producer);
        engine.prepare(&ProcessSpec::new(SAMPLE_RATE, 512, ChannelCount::Stereo).unwrap());
        (engine, consumer)
    }

    fn sine_block(frequency: f32, amplitude: f32) -> AudioBuffer {
        let samples: Vec<f32> = (0..512)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        AudioBuffer::from_channels(vec![samples.clone(), samples]).unwrap()
    }

    #[test]
    fn test_makeup_gain_limits() {
        assert_eq!(makeup_gain(0.5, 0.05), Some(MAKEUP_GAIN_MAX));
        assert_eq!(makeup_gain(0.05, 0.5), Some(MAKEUP_GAIN_MIN));
        assert_eq!(makeup_gain(0.2, 0.1), Some(2.0));
        assert_eq!(makeup_gain(0.00005, 0.1), None);
        assert_eq!(makeup_gain(0.1, 0.0), None);
    }

    #[test]
    fn test_flat_engine_passes_quiet_signal() {
        let store = Arc::new(ParameterStore::default());
        let (mut engine, _consumer) = engine_with(store);

        let mut buffer = sine_block(1000.0, 0.01);
        let expected = buffer.clone();
        engine.process_block(&mut buffer);

        // Flat bell plus soft clip at this level is transparent
        for (a, b) in buffer.channel(0).unwrap().iter().zip(expected.channel(0).unwrap()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_capture_receives_dry_channel_zero() {
        let store = Arc::new(ParameterStore::default());
        store.slot(0).unwrap().set_gain_db(12.0);
        let (mut engine, mut consumer) = engine_with(store);

        let mut buffer = sine_block(1000.0, 0.1);
        let dry = buffer.channel(0).unwrap().to_vec();
        engine.process_block(&mut buffer);

        let mut captured = vec![0.0; 1024];
        assert_eq!(consumer.pop(&mut captured), 512);
        assert_eq!(&captured[..512], dry.as_slice());
    }

    #[test]
    fn test_output_gain_and_meter() {
        let store = Arc::new(ParameterStore::default());
        store.slot(0).unwrap().set_enabled(false);
        store.set_output_gain_db(-6.0206);
        let (mut engine, _consumer) = engine_with(Arc::clone(&store));
        let meter = engine.meter();

        let mut buffer = AudioBuffer::from_channels(vec![vec![0.5; 64]]).unwrap();
        engine.process_block(&mut buffer);

        assert!((buffer.magnitude() - 0.25).abs() < 1e-4);
        assert!((meter.peak_db() + 12.04).abs() < 0.01);

        let mut silence = AudioBuffer::from_channels(vec![vec![0.0; 64]]).unwrap();
        engine.process_block(&mut silence);
        assert_eq!(meter.peak_db(), METER_FLOOR_DB);
    }

    #[test]
    fn test_auto_gain_restores_level() {
        let store = Arc::new(ParameterStore::default());
        let slot = store.slot(0).unwrap();
        slot.set_kind(FilterKind::Bell);
        slot.set_gain_db(-6.0);
        slot.set_q(0.3);
        slot.set_slope(Slope::Db6);
        store.set_auto_gain(true);
        let (mut engine, _consumer) = engine_with(Arc::clone(&store));

        let mut buffer = sine_block(1000.0, 0.1);
        let input_rms = buffer.rms();
        engine.process_block(&mut buffer);

        assert!(engine.last_makeup_gain() > 1.5);
        assert!((buffer.rms() - input_rms).abs() / input_rms < 0.01);
    }

    #[test]
    fn test_auto_gain_is_clamped() {
        let store = Arc::new(ParameterStore::default());
        let (mut engine, _consumer) = engine_with(Arc::clone(&store));

        let slot = store.slot(0).unwrap();
        slot.set_kind(FilterKind::LowPass);
        slot.set_frequency(1000.0);
        slot.set_slope(Slope::Db12);
        store.set_auto_gain(true);

        let mut buffer = sine_block(8000.0, 0.3);
        engine.process_block(&mut buffer);
        // The type change rebuilt the chain before processing
        assert_eq!(engine.chain().filter(0).unwrap().kind(), FilterKind::LowPass);

        let mut buffer = sine_block(8000.0, 0.3);
        engine.process_block(&mut buffer);
        assert_eq!(engine.last_makeup_gain(), MAKEUP_GAIN_MAX);
    }

    #[test]
    fn test_auto_gain_skips_silence() {
        let store = Arc::new(ParameterStore::default());
        store.set_auto_gain(true);
        let (mut engine, _consumer) = engine_with(store);

        let mut buffer = AudioBuffer::from_channels(vec![vec![1e-6; 128]]).unwrap();
        engine.process_block(&mut buffer);
        assert_eq!(engine.last_makeup_gain(), 1.0);
    }

    #[test]
    fn test_prepare_applies_store_sample_rate() {
        let store = Arc::new(ParameterStore::default());
        let (engine, _consumer) = engine_with(store);

        assert_eq!(engine.spec().sample_rate, SAMPLE_RATE);
        assert!(engine.chain().iter().all(|f| f.sample_rate() == SAMPLE_RATE));
        assert_eq!(engine.chain().len(), 8);
    }

    #[test]
    fn test_capture_overflow_is_counted() {
        let store = Arc::new(ParameterStore::default());
        let (producer, _consumer) = SampleFifo::with_capacity(1024);
        let mut engine = EqualizerEngine::new(store, producer);

        for _ in 0..3 {
            let mut buffer = sine_block(440.0, 0.1);
            engine.process_block(&mut buffer);
        }

        assert_eq!(engine.dropped_capture_samples(), 512);
    }
}
