use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use beat_detector::config::AppConfig;
use beat_detector::fixtures::synth::{render_pattern, DrumPattern};
use beat_detector::fixtures::{
    analyze_samples, read_wav, write_wav, AnalysisReport, ExpectationDiff, FixtureExpectations,
};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "beat_cli",
    about = "Offline and live harness for the streaming beat detector"
)]
struct Cli {
    /// Log debug output (detections, thread lifecycle) to stderr
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a WAV file and optionally compare against expectations
    Analyze {
        wav: PathBuf,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Detect beats from the default input device, one JSON line per detection
    Listen {
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render a synthetic drum pattern to a WAV file
    Synth {
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        bars: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,
    },
    /// Print the effective configuration as JSON
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    beat_detector::init_logging(if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    });

    match cli.command {
        Commands::Analyze {
            wav,
            expect,
            output,
            config,
        } => run_analyze(&wav, expect, output, load_config(config.as_deref())),
        Commands::Listen { seconds, config } => run_listen(seconds, load_config(config.as_deref())),
        Commands::Synth {
            output,
            bars,
            seed,
            sample_rate,
        } => run_synth(&output, bars, seed, sample_rate),
        Commands::Config { config } => {
            let config = load_config(config.as_deref());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn load_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    }
}

fn run_analyze(
    wav: &Path,
    expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    config: AppConfig,
) -> Result<ExitCode> {
    let (samples, sample_rate) = read_wav(wav)?;
    let report = analyze_samples(&config, &samples, sample_rate)
        .with_context(|| format!("analyzing {}", wav.display()))?;

    emit_report(wav, &report, output_path)?;

    let Some(expect) = expect else {
        return Ok(ExitCode::from(0));
    };

    let expectations = FixtureExpectations::load(&expect)?;
    match expectations.verify(&report.events) {
        Ok(()) => Ok(ExitCode::from(0)),
        Err(diff) => {
            emit_diff(&diff)?;
            Ok(ExitCode::from(2))
        }
    }
}

#[cfg(not(target_os = "android"))]
fn run_listen(seconds: u64, config: AppConfig) -> Result<ExitCode> {
    use std::time::Duration;

    use beat_detector::audio::AudioEngine;
    use tokio::sync::broadcast::error::RecvError;

    let mut engine = AudioEngine::new(config);
    let mut results = engine.subscribe();
    engine.start()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building runtime")?;

    runtime.block_on(async {
        let deadline = tokio::time::sleep(Duration::from_secs(seconds));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                received = results.recv() => match received {
                    Ok(result) => println!("{}", serde_json::to_string(&result)?),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!("[beat_cli] Output lagged, {} detections skipped", missed)
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        Ok::<(), anyhow::Error>(())
    })?;

    let stats = engine.stop()?;
    eprintln!("{}", serde_json::to_string(&stats)?);
    Ok(ExitCode::from(0))
}

#[cfg(target_os = "android")]
fn run_listen(_seconds: u64, _config: AppConfig) -> Result<ExitCode> {
    anyhow::bail!("live capture is not available on this platform")
}

fn run_synth(output: &Path, bars: usize, seed: u64, sample_rate: u32) -> Result<ExitCode> {
    let pattern = DrumPattern::four_on_the_floor(bars);
    let samples = render_pattern(&pattern, sample_rate, seed);
    write_wav(output, &samples, sample_rate)?;

    println!(
        "{}",
        serde_json::to_string(&SynthSummary {
            output: &output.display().to_string(),
            sample_rate,
            samples: samples.len(),
            hits: pattern.hits().len(),
        })?
    );
    Ok(ExitCode::from(0))
}

fn emit_report(wav: &Path, report: &AnalysisReport, output_path: Option<PathBuf>) -> Result<()> {
    let payload = AnalysisReportPayload {
        input: &wav.display().to_string(),
        event_count: report.events.len(),
        report,
    };
    let json = serde_json::to_string_pretty(&payload)?;

    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(())
}

fn emit_diff(diff: &ExpectationDiff) -> Result<()> {
    let json = serde_json::to_string_pretty(&diff.to_json())?;
    eprintln!("{json}");
    Ok(())
}

#[derive(Serialize)]
struct AnalysisReportPayload<'a> {
    input: &'a str,
    event_count: usize,
    #[serde(flatten)]
    report: &'a AnalysisReport,
}

#[derive(Serialize)]
struct SynthSummary<'a> {
    output: &'a str,
    sample_rate: u32,
    samples: usize,
    hits: usize,
}
