//! Integration tests for the equalizer pipeline
//!
//! These tests drive the engine, the capture FIFO and the display-side
//! consumers together, across threads where the real application would.

use paraeq_core::domain::audio::{AudioBuffer, ChannelCount, ProcessSpec};
use paraeq_core::domain::config::{EqualizerConfig, PresetManager};
use paraeq_core::domain::dsp::{FilterChain, FilterKind, FilterParameters, Slope};
use paraeq_core::domain::params::ParameterStore;
use paraeq_core::domain::spectrum::SpectrumAnalyzer;
use paraeq_infra::audio::{
    log_frequencies, EqualizerEngine, ResponseModel, SampleFifo, SpectrumPoller,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK: usize = 256;

fn spec() -> ProcessSpec {
    ProcessSpec::new(SAMPLE_RATE, BLOCK, ChannelCount::Stereo).unwrap()
}

/// Fill `buffer` with a continuous sine starting at frame `offset`
fn fill_sine(buffer: &mut AudioBuffer, frequency: f32, amplitude: f32, offset: usize) {
    let step = 2.0 * std::f64::consts::PI * f64::from(frequency) / SAMPLE_RATE;
    for channel in buffer.channels_mut() {
        for (i, sample) in channel.iter_mut().enumerate() {
            *sample = amplitude * ((offset + i) as f64 * step).sin() as f32;
        }
    }
}

fn engine(store: &Arc<ParameterStore>, capacity: usize) -> (EqualizerEngine, SpectrumPoller) {
    let (producer, consumer) = SampleFifo::with_capacity(capacity);
    let mut engine = EqualizerEngine::new(Arc::clone(store), producer);
    engine.prepare(&spec());

    let mut analyzer = SpectrumAnalyzer::with_order(11);
    analyzer.prepare(SAMPLE_RATE);
    (engine, SpectrumPoller::new(consumer, analyzer))
}

// ============================================================================
// AUDIO ↔ DISPLAY
// ============================================================================

#[test]
fn test_spectrum_follows_audio_thread() {
    let store = Arc::new(ParameterStore::default());
    // Room for the whole run, so a starved display thread loses nothing
    let (mut engine, mut poller) = engine(&store, 400 * BLOCK);
    let done = Arc::new(AtomicBool::new(false));

    let audio_done = Arc::clone(&done);
    let audio = thread::spawn(move || {
        let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);
        for block in 0..400 {
            fill_sine(&mut buffer, 3000.0, 0.5, block * BLOCK);
            engine.process_block(&mut buffer);
            if block % 8 == 7 {
                thread::sleep(Duration::from_micros(200));
            }
        }
        audio_done.store(true, Ordering::Release);
        engine
    });

    let mut curves = 0;
    loop {
        let finished = done.load(Ordering::Acquire);
        if poller.poll() {
            curves += 1;
            poller.acknowledge();
        }
        if finished && !poller.poll() {
            break;
        }
        thread::sleep(Duration::from_micros(100));
    }

    let engine = audio.join().unwrap();
    assert!(curves > 0);

    assert_eq!(engine.dropped_capture_samples(), 0);

    let analyzer = poller.analyzer();
    let spectrum = analyzer.smoothed_spectrum();
    let peak_bin = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert!((peak_bin as f64 * analyzer.bin_width() - 3000.0).abs() <= analyzer.bin_width());
    assert!(analyzer.magnitude_for_frequency(3000.0) > -12.0);
}

#[test]
fn test_capture_is_dry_signal() {
    let store = Arc::new(ParameterStore::default());
    let slot = store.slot(0).unwrap();
    slot.set_kind(FilterKind::LowPass);
    slot.set_frequency(200.0);
    slot.set_slope(Slope::Db96);

    let (mut engine, mut poller) = engine(&store, 8192);
    let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);
    for block in 0..(2048 * 20 / BLOCK) {
        fill_sine(&mut buffer, 6000.0, 0.5, block * BLOCK);
        engine.process_block(&mut buffer);
        poller.poll();
    }

    // The low-pass removed the tone from the output, not from the analyzer
    assert!(buffer.magnitude() < 1e-3);
    assert!(poller.analyzer().magnitude_for_frequency(6000.0) > -12.0);
}

// ============================================================================
// CONTROL → AUDIO / DISPLAY
// ============================================================================

#[test]
fn test_response_model_matches_engine_chain() {
    let store = Arc::new(ParameterStore::default());
    let (mut engine, _poller) = engine(&store, 4096);
    let mut model = ResponseModel::new(&store, &spec());

    let layout = [
        (0, FilterKind::HighPass, 60.0, 0.0, Slope::Db24),
        (1, FilterKind::Bell, 450.0, -4.0, Slope::Db12),
        (2, FilterKind::Notch, 3150.0, 0.0, Slope::Db6),
        (3, FilterKind::HighShelf, 9000.0, 3.5, Slope::Db24),
    ];
    for (i, kind, frequency, gain_db, slope) in layout {
        store.slot(i).unwrap().store(&FilterParameters {
            kind,
            frequency,
            gain_db,
            q: 1.2,
            slope,
            enabled: true,
        });
    }

    let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);
    engine.process_block(&mut buffer);
    model.refresh(&store);

    for f in log_frequencies(64) {
        let engine_db = engine.chain().total_frequency_response(f);
        let model_db = model.total_frequency_response(f);
        assert!((engine_db - model_db).abs() < 1e-4, "{f} Hz");
    }
}

#[test]
fn test_kind_round_trip_through_store() {
    let store = Arc::new(ParameterStore::new(4));
    for i in 0..4 {
        store.slot(i).unwrap().store(&FilterParameters {
            kind: FilterKind::Bell,
            frequency: 100.0 * (i + 1) as f32,
            gain_db: i as f32 - 2.0,
            q: 0.5 + i as f32,
            slope: Slope::from_index(i as i32),
            enabled: i != 2,
        });
    }

    let (mut engine, _poller) = engine(&store, 4096);
    let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);
    engine.process_block(&mut buffer);
    let before = engine.chain().parameters();

    store.slot(1).unwrap().set_kind(FilterKind::LowShelf);
    engine.process_block(&mut buffer);
    assert_eq!(engine.chain().filter(1).unwrap().kind(), FilterKind::LowShelf);

    store.slot(1).unwrap().set_kind(FilterKind::Bell);
    engine.process_block(&mut buffer);
    assert_eq!(engine.chain().parameters(), before);
}

#[test]
fn test_auto_gain_keeps_level_within_bounds() {
    let store = Arc::new(ParameterStore::default());
    let slot = store.slot(0).unwrap();
    slot.set_gain_db(18.0);
    slot.set_slope(Slope::Db6);
    store.set_auto_gain(true);

    let (mut engine, _poller) = engine(&store, 4096);
    let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);

    for block in 0..8 {
        fill_sine(&mut buffer, 1000.0, 0.05, block * BLOCK);
        let input_rms = buffer.rms();
        engine.process_block(&mut buffer);

        let gain = engine.last_makeup_gain();
        assert!((0.25..=4.0).contains(&gain));
        if block > 2 {
            // +18 dB needs more than the 0.25 floor can undo
            assert_eq!(gain, 0.25);
            assert!(buffer.rms() > input_rms);
        }
    }
}

#[test]
fn test_meter_reports_output_peak() {
    let store = Arc::new(ParameterStore::default());
    store.slot(0).unwrap().set_enabled(false);
    store.set_output_gain_db(-20.0);

    let (mut engine, _poller) = engine(&store, 4096);
    let meter = engine.meter();

    let mut buffer = AudioBuffer::new(ChannelCount::Stereo, BLOCK);
    for channel in buffer.channels_mut() {
        channel.fill(0.5);
    }
    engine.process_block(&mut buffer);

    assert!((meter.peak_db() - (20.0 * 0.05_f32.log10())).abs() < 0.01);
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[tokio::test]
async fn test_preset_drives_engine() {
    let dir = tempfile::TempDir::new().unwrap();
    let presets = PresetManager::new(dir.path().to_path_buf());

    let mut config = EqualizerConfig::factory_default();
    config.filters[0] = FilterParameters {
        kind: FilterKind::LowShelf,
        frequency: 150.0,
        gain_db: 6.0,
        q: 0.707,
        slope: Slope::Db12,
        enabled: true,
    };
    config.output_gain_db = -2.0;
    presets.save_preset("warm", &config).await.unwrap();

    let loaded = presets.load_preset("warm").await.unwrap();
    let store = Arc::new(ParameterStore::default());
    assert_eq!(loaded.apply_to(&store), 8);

    let mut reference = FilterChain::new();
    reference.prepare(&spec());
    reference.add_filter_with(config.filters[0]);

    let model = ResponseModel::new(&store, &spec());
    for f in log_frequencies(32) {
        assert!((model.total_frequency_response(f) - reference.total_frequency_response(f)).abs() < 1e-4);
    }
    assert_eq!(store.output_gain_db(), -2.0);
}
