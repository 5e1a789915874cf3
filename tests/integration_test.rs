//! Integration tests for the detection pipeline
//!
//! These tests drive the crate through its public API only:
//! - Kernel lifecycle (warm-up, detection, sentinel handling)
//! - Frame port transport into the detector
//! - Synthetic audio through the spectrum front-end and detector

use beat_detector::audio::FramePort;
use beat_detector::fixtures::analyze_samples;
use beat_detector::fixtures::synth::{render_pattern, DrumPattern};
use beat_detector::{
    AppConfig, BeatCategory, BeatDetector, DetectionResult, DetectorConfig, DetectorError,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BANDS: usize = 128;

/// Quiet spectrum with one loud reference band so silence-like frames do
/// not pass the mean-based mask test
fn background() -> Vec<f32> {
    let mut frame = vec![0.2; BANDS];
    frame[100] = 3.0;
    frame
}

fn with_spike(bands: &[usize]) -> Vec<f32> {
    let mut frame = background();
    for &band in bands {
        frame[band] = 8.0;
    }
    frame
}

fn warm_detector() -> BeatDetector {
    let mut detector = BeatDetector::new(DetectorConfig::default()).unwrap();
    let frame = background();
    for _ in 0..60 {
        assert_eq!(detector.process_chunk(Some(&frame)).unwrap(), None);
    }
    assert!(detector.is_warm());
    detector
}

#[test]
fn test_bass_train_confirms_after_bootstrap() {
    let mut detector = warm_detector();
    let quiet = background();
    let spike = with_spike(&[0]);
    let mut results = Vec::new();

    for _ in 0..10 {
        for _ in 0..5 {
            detector.process_chunk(Some(&quiet)).unwrap();
        }
        if let Some(result) = detector.process_chunk(Some(&spike)).unwrap() {
            results.push((detector.chunks_processed(), result));
        }
    }

    // Five candidates fill the bootstrap before anything is confirmed.
    assert!(!results.is_empty());
    assert!(results.iter().all(|(chunk, _)| *chunk >= 91));
    assert!(results.iter().all(|(_, result)| result.bass && !result.clap && !result.hihat));
    assert_eq!(detector.stats().detections[0], results.len() as u64);
}

#[test]
fn test_sentinel_does_not_advance_state() {
    let mut detector = warm_detector();
    let before = detector.stats();

    assert_eq!(detector.process_chunk(None).unwrap(), None);
    assert_eq!(detector.stats(), before);
}

#[test]
fn test_malformed_frame_is_reported() {
    let mut detector = warm_detector();

    let short = vec![0.5; BANDS - 1];
    assert!(matches!(
        detector.process_chunk(Some(&short)),
        Err(DetectorError::FrameLengthMismatch { .. })
    ));

    let mut nan = background();
    nan[7] = f32::NAN;
    assert!(matches!(
        detector.process_chunk(Some(&nan)),
        Err(DetectorError::InvalidMagnitude { band: 7, .. })
    ));

    assert_eq!(detector.stats().rejected_frames, 2);
    assert_eq!(detector.chunks_processed(), 60);
}

#[test]
fn test_frame_port_feeds_detector() {
    let mut detector = BeatDetector::new(DetectorConfig::default()).unwrap();
    let (mut sender, mut receiver) = FramePort::new(128, BANDS);
    let frame = background();

    for _ in 0..70 {
        sender.send(&frame).unwrap();
    }
    sender.send_no_data().unwrap();

    let mut published: Vec<DetectionResult> = Vec::new();
    let report = detector.drain(&mut receiver, &mut published).unwrap();

    assert_eq!(report.packets, 71);
    assert_eq!(report.published, published.len());
    assert_eq!(detector.chunks_processed(), 70);
    assert!(receiver.is_empty());
}

#[test]
fn test_silence_pipeline_is_quiet() {
    let config = AppConfig::default();
    let samples = vec![0.0; 48_000 * 2];

    let report = analyze_samples(&config, &samples, 48_000).unwrap();

    assert!(report.events.is_empty());
    assert!(report.stats.warm);
    assert_eq!(report.stats.detections, [0, 0, 0]);
}

#[test]
fn test_synthetic_pattern_pipeline() {
    let config = AppConfig::default();
    let pattern = DrumPattern::four_on_the_floor(8);
    let samples = render_pattern(&pattern, 48_000, 11);

    let first = analyze_samples(&config, &samples, 48_000).unwrap();
    let second = analyze_samples(&config, &samples, 48_000).unwrap();
    assert_eq!(first.events, second.events);

    assert!(!first.events.is_empty(), "eight bars should trigger detections");
    assert!(first.events.iter().all(|event| event.chunk > 60));
    assert!(first.events.iter().all(|event| event.result().any()));

    let debounce = config.detector.debounce_chunks;
    for category in BeatCategory::ALL {
        let chunks: Vec<u64> = first
            .events
            .iter()
            .filter(|event| event.result().is_set(category))
            .map(|event| event.chunk)
            .collect();
        assert!(
            chunks.windows(2).all(|pair| pair[1] - pair[0] > debounce),
            "{category:?} fired inside the debounce window: {chunks:?}"
        );
    }

    let total: u64 = first.stats.detections.iter().sum();
    let flagged: u64 = first
        .events
        .iter()
        .map(|event| event.result().as_array().iter().filter(|set| **set).count() as u64)
        .sum();
    assert_eq!(total, flagged);
}

#[test]
fn test_kick_only_pattern_fires_bass_only() {
    let config = AppConfig::default();
    let samples = render_pattern(&DrumPattern::kick_only(16), 48_000, 5);

    let report = analyze_samples(&config, &samples, 48_000).unwrap();

    assert!(report.stats.detections[0] > 0, "kicks should confirm as bass");
    assert_eq!(report.stats.detections[1], 0, "clap fired on kick-only audio");
    assert_eq!(report.stats.detections[2], 0, "hi-hat fired on kick-only audio");
}

#[test]
fn test_steady_noise_does_not_fire_at_debounce_rate() {
    let config = AppConfig::default();
    let mut rng = StdRng::seed_from_u64(20);
    let samples: Vec<f32> = (0..48_000 * 20)
        .map(|_| rng.gen_range(-0.01..0.01))
        .collect();

    let report = analyze_samples(&config, &samples, 48_000).unwrap();

    // A category firing whenever the debounce allows would alone reach this.
    let debounce_rate =
        report.stats.chunks_processed / (config.detector.debounce_chunks + 1);
    let total: u64 = report.stats.detections.iter().sum();
    assert!(
        total < debounce_rate,
        "steady noise produced {:?} detections over {} chunks",
        report.stats.detections,
        report.stats.chunks_processed
    );
}
