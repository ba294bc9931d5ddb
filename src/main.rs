//! spectro-rs - headless audio feature extractor
//!
//! Captures the configured input device, runs the analyzer once per tick and
//! logs a short summary of the features a visualizer would consume.

use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use thiserror::Error;

use spectro_rs::analysis::{AnalysisError, Analyzer, Features};
use spectro_rs::audio::{self, AudioInput, DeviceError, FrameSource};
use spectro_rs::settings::{AnalyzerSettings, ConfigError};

#[derive(Parser, Debug)]
#[command(name = "spectro-rs", about = "Real-time spectral feature extraction from an audio input")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Log a feature summary every N ticks (0 disables)
    #[arg(long, default_value_t = 60)]
    report_every: u64,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    write_settings: bool,
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

fn main() -> ExitCode {
    env_logger::init();
    log::info!("Starting spectro-rs");

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    if cli.list_devices {
        for device in audio::list_input_devices()? {
            println!(
                "{}{}  channels: {}  rates: {}",
                device.name,
                if device.is_default { " (default)" } else { "" },
                device.max_channels,
                device
                    .sample_rates
                    .map(|(lo, hi)| format!("{lo}-{hi} Hz"))
                    .unwrap_or_else(|| "unknown".to_string())
            );
        }
        return Ok(());
    }

    let settings = match &cli.settings {
        Some(path) => AnalyzerSettings::load_from(path)?,
        None => AnalyzerSettings::load(),
    };
    settings.validate()?;

    if cli.write_settings {
        match &cli.settings {
            Some(path) => settings.save_to(path)?,
            None => {
                let path = settings.save()?;
                log::info!("Wrote settings to {}", path.display());
            }
        }
    }

    let mut analyzer = Analyzer::new(&settings)?;
    let (sink, mut source) =
        audio::slot::split(settings.ingestion, settings.frame_len, settings.queue_depth);
    let input = AudioInput::start(&settings, sink)?;

    let interval = Duration::from_millis(settings.tick_interval_ms);
    let mut tick: u64 = 0;

    while cli.ticks.map_or(true, |limit| tick < limit) {
        let started = Instant::now();
        analyzer.tick(source.as_mut())?;
        tick += 1;

        if cli.report_every > 0 && tick % cli.report_every == 0 {
            report(&analyzer, source.as_ref(), input.sample_rate());
        }

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    analyzer.shutdown();
    input.stop();
    Ok(())
}

fn report(analyzer: &Analyzer, source: &dyn FrameSource, sample_rate: u32) {
    let stats = source.stats();
    match analyzer.features() {
        Ok(features) => {
            let hz_per_bin = sample_rate as f32 / analyzer.frame_len() as f32;
            log::info!(
                "rms {:.4} | {} | slices {} | published {} dropped {} repeated {}",
                features.rms,
                peaks(&features, hz_per_bin),
                features.history.len(),
                stats.published,
                stats.dropped,
                features.counters.repeated
            );
        }
        Err(_) => log::info!("Waiting for first frame ({} published)", stats.published),
    }
}

/// `name peak@Hz` for each smoothing rate
fn peaks(features: &Features<'_>, hz_per_bin: f32) -> String {
    features
        .smoothed
        .iter()
        .map(|(name, ewma)| {
            let peak = ewma
                .values()
                .iter()
                .enumerate()
                .skip(1)
                .fold((0, f32::MIN), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
            format!("{} {:.0}Hz", name, peak.0 as f32 * hz_per_bin)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
