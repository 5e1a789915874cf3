//! Fixture utilities for offline analysis.
//!
//! Loads PCM WAV input, runs it through the spectrum front-end and the beat
//! detector chunk by chunk, and compares the resulting detections against
//! optional expectation JSON. Used by the `beat_cli analyze` command and the
//! integration tests.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::category::BeatCategory;
use crate::analysis::{BeatDetector, DetectionResult, DetectorStats};
use crate::audio::SpectrumFrontend;
use crate::config::AppConfig;

pub mod synth;

/// One chunk on which at least one category fired
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Chunk counter value (1-based) of the detection
    pub chunk: u64,
    /// End of the chunk's analysis window, in milliseconds from the start
    pub timestamp_ms: u64,
    pub bass: bool,
    pub clap: bool,
    pub hihat: bool,
}

impl DetectionEvent {
    fn new(chunk: u64, timestamp_ms: u64, result: DetectionResult) -> Self {
        Self {
            chunk,
            timestamp_ms,
            bass: result.bass,
            clap: result.clap,
            hihat: result.hihat,
        }
    }

    pub fn result(&self) -> DetectionResult {
        DetectionResult {
            bass: self.bass,
            clap: self.clap,
            hihat: self.hihat,
        }
    }
}

/// Offline analysis output
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub sample_rate: u32,
    pub chunk_duration_ms: f64,
    pub events: Vec<DetectionEvent>,
    pub stats: DetectorStats,
}

impl AnalysisReport {
    /// Timestamps of every event in which `category` fired
    pub fn timestamps(&self, category: BeatCategory) -> Vec<u64> {
        self.events
            .iter()
            .filter(|event| event.result().is_set(category))
            .map(|event| event.timestamp_ms)
            .collect()
    }
}

/// Run the front-end and detector over a mono sample buffer
///
/// # Arguments
/// * `config` - Application configuration (detector and spectrum sections)
/// * `samples` - Mono PCM samples
/// * `sample_rate` - Sample rate of `samples`, used for timestamps
pub fn analyze_samples(
    config: &AppConfig,
    samples: &[f32],
    sample_rate: u32,
) -> Result<AnalysisReport> {
    config.validate().context("invalid configuration")?;
    if sample_rate == 0 {
        return Err(anyhow!("sample rate must be greater than 0"));
    }
    if sample_rate != config.spectrum.sample_rate {
        log::warn!(
            "[Fixtures] Input is {} Hz, spectrum configured for {} Hz; band layout shifts accordingly",
            sample_rate,
            config.spectrum.sample_rate
        );
    }

    let mut frontend = SpectrumFrontend::new(&config.spectrum, config.detector.sub_bands)?;
    let mut detector = BeatDetector::new(config.detector.clone())?;

    let fft_size = config.spectrum.fft_size as u64;
    let hop_size = config.spectrum.hop_size as u64;
    let mut events = Vec::new();
    let mut failure = None;

    frontend.push_samples(samples, |frame| {
        if failure.is_some() {
            return;
        }
        match detector.process_chunk(Some(frame)) {
            Ok(Some(result)) => {
                let chunk = detector.chunks_processed();
                let end_sample = fft_size + (chunk - 1) * hop_size;
                let timestamp_ms = end_sample * 1000 / sample_rate as u64;
                events.push(DetectionEvent::new(chunk, timestamp_ms, result));
            }
            Ok(None) => {}
            Err(err) => failure = Some(err),
        }
    });

    if let Some(err) = failure {
        return Err(err).context("detector rejected a frame");
    }

    Ok(AnalysisReport {
        sample_rate,
        chunk_duration_ms: hop_size as f64 / sample_rate as f64 * 1000.0,
        events,
        stats: detector.stats(),
    })
}

/// Decode a PCM WAV file, keeping the first channel
///
/// Integer samples are scaled to [-1, 1].
///
/// # Returns
/// The samples and the file's sample rate.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| anyhow!(err)))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let max = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            match spec.bits_per_sample {
                8 | 16 | 24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max)
                            .map_err(|err| anyhow!(err))
                    })
                    .collect::<Result<Vec<f32>>>()?,
                other => {
                    return Err(anyhow!(
                        "Unsupported bits per sample {} in {}",
                        other,
                        path.display()
                    ))
                }
            }
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved.chunks(channels).map(|frame| frame[0]).collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Write mono samples as a 32-bit float WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

/// JSON expectation schema for fixture verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureExpectations {
    #[serde(default)]
    pub fixture: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub events: Vec<ExpectedEvent>,
}

/// Expected detection of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedEvent {
    pub category: BeatCategory,
    pub offset_ms: f32,
    #[serde(default = "default_tolerance")]
    pub tolerance_ms: f32,
}

fn default_tolerance() -> f32 {
    50.0
}

impl FixtureExpectations {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading expectation {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }

    /// Compare detections against the expectation, category by category
    ///
    /// The n-th expected event of a category is matched with the n-th
    /// detection of that category; detections beyond the expected count are
    /// reported as unexpected.
    pub fn verify(&self, actual: &[DetectionEvent]) -> std::result::Result<(), ExpectationDiff> {
        let mut failures = Vec::new();

        for category in BeatCategory::ALL {
            let expected: Vec<&ExpectedEvent> = self
                .events
                .iter()
                .filter(|event| event.category == category)
                .collect();
            let detected: Vec<u64> = actual
                .iter()
                .filter(|event| event.result().is_set(category))
                .map(|event| event.timestamp_ms)
                .collect();

            for (index, expected) in expected.iter().enumerate() {
                match detected.get(index) {
                    Some(&timestamp_ms) => {
                        let delta = (timestamp_ms as f32 - expected.offset_ms).abs();
                        if delta > expected.tolerance_ms {
                            failures.push(ExpectationFailure {
                                category,
                                index,
                                expected: Some((*expected).clone()),
                                actual_ms: Some(timestamp_ms),
                                delta_ms: Some(delta),
                            });
                        }
                    }
                    None => failures.push(ExpectationFailure {
                        category,
                        index,
                        expected: Some((*expected).clone()),
                        actual_ms: None,
                        delta_ms: None,
                    }),
                }
            }

            for (index, &timestamp_ms) in detected.iter().enumerate().skip(expected.len()) {
                failures.push(ExpectationFailure {
                    category,
                    index,
                    expected: None,
                    actual_ms: Some(timestamp_ms),
                    delta_ms: None,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExpectationDiff { failures })
        }
    }
}

/// Outcome of comparing actual results with expectations.
#[derive(Debug)]
pub struct ExpectationDiff {
    pub failures: Vec<ExpectationFailure>,
}

impl ExpectationDiff {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "failures": self.failures.iter().map(|failure| {
                serde_json::json!({
                    "category": failure.category,
                    "index": failure.index,
                    "expected": failure.expected,
                    "actual_ms": failure.actual_ms,
                    "delta_ms": failure.delta_ms,
                })
            }).collect::<Vec<_>>()
        })
    }
}

/// Detailed diff entry for a single failure.
#[derive(Debug)]
pub struct ExpectationFailure {
    pub category: BeatCategory,
    /// Position among the category's events
    pub index: usize,
    /// `None` for a detection nobody expected
    pub expected: Option<ExpectedEvent>,
    /// `None` for an expected event that was never detected
    pub actual_ms: Option<u64>,
    pub delta_ms: Option<f32>,
}
