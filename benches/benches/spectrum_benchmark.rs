//! Criterion benchmarks for the spectrum analyzer and capture FIFO

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use paraeq_benchmarks::generate_sine_wave;
use paraeq_core::domain::spectrum::SpectrumAnalyzer;
use paraeq_infra::audio::{SampleFifo, SpectrumPoller};
use std::hint::black_box;

/// Benchmark one full FFT block per order
fn bench_fft_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectrum_fft_order");

    for order in 10..=13u32 {
        let mut analyzer = SpectrumAnalyzer::with_order(order);
        analyzer.prepare(48000.0);
        let block = generate_sine_wave(1000.0, 48000, analyzer.fft_size());

        group.bench_with_input(BenchmarkId::from_parameter(order), &order, |b, _| {
            b.iter(|| {
                analyzer.push_samples(black_box(&block));
                analyzer.clear_new_data_flag();
            })
        });
    }

    group.finish();
}

/// Benchmark display-side point queries
fn bench_magnitude_lookup(c: &mut Criterion) {
    let mut analyzer = SpectrumAnalyzer::new();
    analyzer.prepare(48000.0);
    analyzer.push_samples(&generate_sine_wave(1000.0, 48000, 8192));

    c.bench_function("magnitude_for_frequency_x512", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for i in 0..512 {
                sum += analyzer.magnitude_for_frequency(black_box(20.0 + i as f32 * 39.0));
            }
            black_box(sum)
        })
    });
}

/// Benchmark audio-to-display transfer through the FIFO
fn bench_fifo_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_push_poll");

    for size in [64, 256, 1024] {
        let (mut producer, consumer) = SampleFifo::with_capacity(8192);
        let mut poller = SpectrumPoller::new(consumer, SpectrumAnalyzer::new());
        let block = generate_sine_wave(440.0, 48000, size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                producer.push(black_box(&block));
                black_box(poller.poll());
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fft_orders,
    bench_magnitude_lookup,
    bench_fifo_transfer
);
criterion_main!(benches);
