//! Criterion benchmarks for filter processing
//!
//! Measures:
//! - Single filter throughput per slope (section count)
//! - Full eight-band chain throughput vs block size
//! - Engine block cost including capture and parameter sync
//! - Response curve evaluation for the display

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use paraeq_benchmarks::generate_white_noise;
use paraeq_core::domain::audio::{AudioBuffer, ChannelCount, ProcessSpec};
use paraeq_core::domain::dsp::{Filter, FilterChain, FilterKind, FilterParameters, Slope};
use paraeq_core::domain::params::ParameterStore;
use paraeq_infra::audio::{EqualizerEngine, ResponseModel, SampleFifo};
use std::hint::black_box;
use std::sync::Arc;

const SAMPLE_RATE: f64 = 48000.0;

fn spec(block: usize) -> ProcessSpec {
    ProcessSpec::new(SAMPLE_RATE, block, ChannelCount::Stereo).unwrap()
}

fn stereo_noise(frames: usize) -> AudioBuffer {
    let noise: Vec<f32> = generate_white_noise(frames).iter().map(|s| s * 0.25).collect();
    AudioBuffer::from_channels(vec![noise.clone(), noise]).unwrap()
}

fn eight_band_store() -> ParameterStore {
    let store = ParameterStore::default();
    let bands = [
        (FilterKind::HighPass, 40.0, 0.0, Slope::Db24),
        (FilterKind::LowShelf, 120.0, 3.0, Slope::Db12),
        (FilterKind::Bell, 300.0, -2.0, Slope::Db12),
        (FilterKind::Bell, 1000.0, 1.5, Slope::Db24),
        (FilterKind::Notch, 2500.0, 0.0, Slope::Db6),
        (FilterKind::Bell, 5000.0, 2.0, Slope::Db48),
        (FilterKind::HighShelf, 10000.0, -3.0, Slope::Db12),
        (FilterKind::LowPass, 18000.0, 0.0, Slope::Db96),
    ];

    for (i, (kind, frequency, gain_db, slope)) in bands.into_iter().enumerate() {
        if let Some(slot) = store.slot(i) {
            slot.store(&FilterParameters {
                kind,
                frequency,
                gain_db,
                q: 0.9,
                slope,
                enabled: true,
            });
        }
    }
    store
}

/// Benchmark one filter at every slope
fn bench_filter_slopes(c: &mut Criterion) {
    let mut group = c.benchmark_group("bell_filter_slope");

    for slope in Slope::ALL {
        let mut filter = Filter::with_parameters(FilterParameters {
            gain_db: 6.0,
            slope,
            ..FilterParameters::new(FilterKind::Bell)
        });
        filter.prepare(&spec(512));
        let mut buffer = stereo_noise(512);

        group.bench_with_input(
            BenchmarkId::from_parameter(slope.db_per_octave()),
            &slope,
            |b, _| {
                b.iter(|| {
                    filter.process(black_box(&mut buffer));
                })
            },
        );
    }

    group.finish();
}

/// Benchmark the full chain against block size
fn bench_chain_block_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("eight_band_chain");
    let store = eight_band_store();

    for size in [64, 256, 512, 1024, 2048] {
        let mut chain = FilterChain::from_store(&store);
        chain.prepare(&spec(size));
        let mut buffer = stereo_noise(size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                chain.process(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

/// Benchmark a complete engine block
fn bench_engine_block(c: &mut Criterion) {
    let store = Arc::new(eight_band_store());
    store.set_auto_gain(true);

    let (producer, mut consumer) = SampleFifo::with_capacity(8192);
    let mut engine = EqualizerEngine::new(Arc::clone(&store), producer);
    engine.prepare(&spec(512));
    let mut buffer = stereo_noise(512);

    c.bench_function("engine_process_block_512", |b| {
        b.iter(|| {
            engine.process_block(black_box(&mut buffer));
            consumer.clear();
        })
    });
}

/// Benchmark coefficient recomputation on a parameter change
fn bench_coefficient_update(c: &mut Criterion) {
    let mut filter = Filter::with_parameters(FilterParameters {
        gain_db: 6.0,
        slope: Slope::Db96,
        ..FilterParameters::new(FilterKind::Bell)
    });
    filter.prepare(&spec(512));
    let mut frequency = 100.0;

    c.bench_function("bell_96db_set_frequency", |b| {
        b.iter(|| {
            frequency = if frequency > 10000.0 { 100.0 } else { frequency * 1.01 };
            filter.set_frequency(black_box(frequency));
        })
    });
}

/// Benchmark the display response curve
fn bench_response_curve(c: &mut Criterion) {
    let store = eight_band_store();
    let model = ResponseModel::new(&store, &spec(512));

    c.bench_function("response_curve_512_points", |b| {
        b.iter(|| black_box(model.curve(black_box(512))))
    });
}

criterion_group!(
    benches,
    bench_filter_slopes,
    bench_chain_block_size,
    bench_engine_block,
    bench_coefficient_update,
    bench_response_curve
);
criterion_main!(benches);
