// Beat Detector Core - streaming bass / clap / hi-hat detection
// Frequency frames in, per-chunk detection flags out

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod fixtures;

// Re-exports for convenience
pub use analysis::{
    BeatCategory, BeatDetector, CategoryPhase, DetectionResult, DetectionSink, DetectorStats,
    DrainReport,
};
pub use config::{AppConfig, AudioConfig, DetectorConfig, SpectrumConfig};
pub use error::{AudioError, DetectorError, ErrorCode};

/// Install a `tracing` subscriber writing to stderr
///
/// Safe to call more than once; later calls are ignored. `log` records from
/// the config and fixture layers are forwarded through the subscriber.
pub fn init_logging(level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
