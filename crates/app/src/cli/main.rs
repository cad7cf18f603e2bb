//! Paraeq CLI Application
//!
//! Runs the equalizer core offline: prints the response curve of a
//! configuration, analyzes a synthesized tone through the full engine, and
//! writes a starter configuration file.

use anyhow::Context;
use clap::{Parser, Subcommand};
use paraeq_core::domain::audio::AudioBuffer;
use paraeq_core::domain::config::EqualizerConfig;
use paraeq_core::domain::spectrum::SpectrumAnalyzer;
use paraeq_infra::audio::{EqualizerEngine, ResponseModel, SampleFifo, SpectrumPoller};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "paraeq")]
#[command(about = "Multi-band parametric equalizer core", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the combined frequency response of a configuration
    Response {
        /// Configuration file (factory default when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of log-spaced points between 20 Hz and 20 kHz
        #[arg(short, long, default_value_t = 32)]
        points: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a sine tone through the engine and report its spectrum
    Analyze {
        /// Tone frequency in Hz
        #[arg(short, long, default_value_t = 1000.0)]
        frequency: f32,

        /// Tone amplitude (linear, 1.0 = full scale)
        #[arg(short, long, default_value_t = 0.5)]
        amplitude: f32,

        /// Duration of the tone in seconds
        #[arg(short, long, default_value_t = 1.0)]
        seconds: f32,

        /// FFT order (10..=13), overrides the configuration
        #[arg(long)]
        fft_order: Option<u32>,

        /// Configuration file (factory default when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the factory default configuration to a file
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Serialize)]
struct ResponsePoint {
    frequency_hz: f32,
    gain_db: f32,
}

#[derive(Serialize)]
struct AnalysisReport {
    frequency_hz: f32,
    amplitude: f32,
    fft_size: usize,
    fft_runs: usize,
    peak_frequency_hz: f64,
    peak_level_db: f32,
    level_at_frequency_db: f32,
    output_peak_db: f32,
    dropped_capture_samples: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Command::Response {
            config,
            points,
            json,
        } => response(config.as_deref(), points, json).await,
        Command::Analyze {
            frequency,
            amplitude,
            seconds,
            fft_order,
            config,
            json,
        } => {
            let config = load_config(config.as_deref()).await?;
            let report = analyze(&config, frequency, amplitude, seconds, fft_order)?;
            print_report(&report, json)
        }
        Command::InitConfig { path, force } => init_config(&path, force).await,
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<EqualizerConfig> {
    match path {
        Some(path) => EqualizerConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            debug!("No configuration given, using factory default");
            Ok(EqualizerConfig::factory_default())
        }
    }
}

async fn response(config: Option<&Path>, points: usize, json: bool) -> anyhow::Result<()> {
    let config = load_config(config).await?;
    let spec = config.app.process_spec()?;
    let store = config.to_store();

    let model = ResponseModel::new(&store, &spec);
    let curve: Vec<ResponsePoint> = model
        .curve(points)
        .into_iter()
        .map(|(frequency_hz, gain_db)| ResponsePoint {
            frequency_hz,
            gain_db,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&curve)?);
    } else {
        println!("{:>12}  {:>9}", "freq (Hz)", "gain (dB)");
        for point in &curve {
            println!("{:>12.1}  {:>9.2}", point.frequency_hz, point.gain_db);
        }
    }

    Ok(())
}

fn analyze(
    config: &EqualizerConfig,
    frequency: f32,
    amplitude: f32,
    seconds: f32,
    fft_order: Option<u32>,
) -> anyhow::Result<AnalysisReport> {
    anyhow::ensure!(frequency > 0.0, "frequency must be positive");
    anyhow::ensure!(seconds > 0.0, "duration must be positive");

    let spec = config.app.process_spec()?;
    let store = Arc::new(config.to_store());
    let (producer, consumer) = SampleFifo::with_capacity(config.app.capture_capacity);

    let mut engine = EqualizerEngine::new(Arc::clone(&store), producer);
    engine.prepare(&spec);
    let meter = engine.meter();

    let mut analyzer = SpectrumAnalyzer::with_order(fft_order.unwrap_or(config.app.fft_order));
    analyzer.prepare(spec.sample_rate);
    let mut poller = SpectrumPoller::new(consumer, analyzer);

    info!(
        frequency,
        amplitude,
        seconds,
        fft_size = poller.analyzer().fft_size(),
        "Analyzing tone"
    );

    let total = (f64::from(seconds) * spec.sample_rate) as usize;
    let step = 2.0 * std::f64::consts::PI * f64::from(frequency) / spec.sample_rate;
    let mut buffer = AudioBuffer::new(spec.channels, spec.max_block_size);
    let mut fft_runs = 0;
    let mut position = 0;

    while position < total {
        let frames = buffer.set_num_samples((total - position).min(spec.max_block_size));
        for channel in buffer.channels_mut() {
            for (i, sample) in channel.iter_mut().enumerate() {
                *sample = amplitude * ((position + i) as f64 * step).sin() as f32;
            }
        }

        engine.process_block(&mut buffer);
        position += frames;

        if poller.poll() {
            fft_runs += 1;
            poller.acknowledge();
        }
    }

    let analyzer = poller.analyzer();
    let spectrum = analyzer.smoothed_spectrum();
    let (peak_bin, peak_level_db) = spectrum
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, f32::NEG_INFINITY));

    Ok(AnalysisReport {
        frequency_hz: frequency,
        amplitude,
        fft_size: analyzer.fft_size(),
        fft_runs,
        peak_frequency_hz: peak_bin as f64 * analyzer.bin_width(),
        peak_level_db,
        level_at_frequency_db: analyzer.magnitude_for_frequency(frequency),
        output_peak_db: meter.peak_db(),
        dropped_capture_samples: engine.dropped_capture_samples(),
    })
}

fn print_report(report: &AnalysisReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("tone            {:.1} Hz @ {:.3}", report.frequency_hz, report.amplitude);
    println!("fft             {} points, {} runs", report.fft_size, report.fft_runs);
    println!(
        "spectral peak   {:.1} Hz, {:.2} dB",
        report.peak_frequency_hz, report.peak_level_db
    );
    println!("level at tone   {:.2} dB", report.level_at_frequency_db);
    println!("output peak     {:.2} dBFS", report.output_peak_db);
    if report.dropped_capture_samples > 0 {
        println!("dropped         {} samples", report.dropped_capture_samples);
    }
    Ok(())
}

async fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    EqualizerConfig::factory_default()
        .save_to_file(path)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), "Configuration written");
    Ok(())
}
