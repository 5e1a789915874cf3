//! AudioEngine - live beat detection from the default input device
//!
//! Architecture:
//! - Input callback (real-time): de-interleaves the first channel, feeds the
//!   spectrum front-end and queues every completed frame in the frame port
//! - Detection thread: owns the kernel, drains the frame port and broadcasts
//!   every detection on a tokio channel
//!
//! Thread safety:
//! - FramePort: lock-free SPSC queues, pre-allocated
//! - running: AtomicBool, the detection thread exits once it is cleared and
//!   the port is empty
//! - dropped_frames: AtomicU64 written by the callback on backpressure
//! - stream_errors: AtomicU64 written by the backend error callback
//!
//! `CaptureState` and `spawn_detection_thread` carry no device dependency and
//! are usable with any sample source; `AudioEngine` wires them to cpal.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;

use super::frame_port::{FrameReceiver, FrameSender};
use super::spectrum::SpectrumFrontend;
use crate::analysis::{BeatDetector, DetectionResult};
use crate::error::{log_audio_error, log_detector_error, AudioError, DetectorError};

/// Mono samples de-interleaved per front-end call
const MONO_CHUNK: usize = 256;

/// Producer half of the pipeline, owned by the input callback
pub struct CaptureState {
    frontend: SpectrumFrontend,
    sender: FrameSender,
    mono: Vec<f32>,
    dropped_frames: Arc<AtomicU64>,
}

impl CaptureState {
    pub fn new(frontend: SpectrumFrontend, sender: FrameSender) -> Self {
        Self {
            frontend,
            sender,
            mono: vec![0.0; MONO_CHUNK],
            dropped_frames: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Feed interleaved samples, keeping only the first channel
    ///
    /// Frames the port cannot accept are counted and discarded; the callback
    /// never waits for the detection thread.
    pub fn process_interleaved(&mut self, data: &[f32], channels: usize) {
        let channels = channels.max(1);
        let mut len = 0;

        for frame in data.chunks(channels) {
            self.mono[len] = frame[0];
            len += 1;
            if len == MONO_CHUNK {
                self.push_mono(len);
                len = 0;
            }
        }

        if len > 0 {
            self.push_mono(len);
        }
    }

    /// Shared counter of frames dropped because the port was full
    pub fn dropped_frames(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped_frames)
    }

    fn push_mono(&mut self, len: usize) {
        let sender = &mut self.sender;
        let dropped = &self.dropped_frames;
        self.frontend.push_samples(&self.mono[..len], |frame| {
            if sender.send(frame).is_err() {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        });
    }
}

/// Spawn the detection thread
///
/// The thread drains `receiver` into `result_sender` until `running` is
/// cleared (or the producer side is gone) and the port is empty, then hands
/// the detector back through the join handle so its statistics survive.
pub fn spawn_detection_thread(
    mut detector: BeatDetector,
    mut receiver: FrameReceiver,
    mut result_sender: broadcast::Sender<DetectionResult>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
) -> JoinHandle<BeatDetector> {
    thread::spawn(move || {
        tracing::info!("[DetectionThread] Starting detection loop");

        loop {
            // Read before draining so frames queued ahead of the stop are still seen.
            let stopping = !running.load(Ordering::SeqCst) || receiver.is_closed();

            match detector.drain(&mut receiver, &mut result_sender) {
                Ok(report) if report.packets > 0 => {
                    if report.published > 0 {
                        tracing::debug!(
                            "[DetectionThread] {} frames, {} detections",
                            report.packets,
                            report.published
                        );
                    }
                }
                Ok(_) => {
                    if stopping {
                        tracing::info!("[DetectionThread] Stopped and port empty, exiting");
                        break;
                    }
                    thread::sleep(poll_interval);
                }
                Err(err) => log_detector_error(&err, "detection_thread"),
            }
        }

        detector
    })
}

/// Log and count an error reported on a running input stream
///
/// Capture keeps going; the backend decides whether the stream recovers.
pub fn record_stream_failure(errors: &AtomicU64, reason: impl fmt::Display) -> AudioError {
    let err = AudioError::StreamFailure {
        reason: reason.to_string(),
    };
    log_audio_error(&err, "input_stream");
    errors.fetch_add(1, Ordering::Relaxed);
    err
}

/// Build the pipeline pieces for one session
///
/// # Returns
/// The capture state for the callback, the detector and port receiver for
/// the detection thread.
pub fn build_pipeline(
    config: &crate::config::AppConfig,
) -> Result<(CaptureState, BeatDetector, FrameReceiver), DetectorError> {
    config.validate()?;

    let bands = config.detector.sub_bands;
    let frontend = SpectrumFrontend::new(&config.spectrum, bands)?;
    let detector = BeatDetector::new(config.detector.clone())?;
    let (sender, receiver) =
        super::frame_port::FramePort::new(config.audio.frame_port_capacity, bands);

    Ok((CaptureState::new(frontend, sender), detector, receiver))
}

#[cfg(not(target_os = "android"))]
pub use desktop::AudioEngine;

#[cfg(not(target_os = "android"))]
mod desktop {
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread::JoinHandle;
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tokio::sync::broadcast;

    use super::{build_pipeline, record_stream_failure, spawn_detection_thread, CaptureState};
    use crate::analysis::{BeatDetector, DetectionResult, DetectorStats};
    use crate::config::AppConfig;
    use crate::error::{log_audio_error, AudioError};

    /// Live capture engine
    ///
    /// # Example
    /// ```ignore
    /// let mut engine = AudioEngine::new(AppConfig::default());
    /// let mut results = engine.subscribe();
    /// engine.start()?;
    /// // ... results.recv() yields a DetectionResult per detected chunk
    /// let stats = engine.stop()?;
    /// ```
    pub struct AudioEngine {
        config: AppConfig,
        input_stream: Option<cpal::Stream>,
        worker: Option<JoinHandle<BeatDetector>>,
        running: Arc<AtomicBool>,
        dropped_frames: Arc<AtomicU64>,
        stream_errors: Arc<AtomicU64>,
        result_sender: broadcast::Sender<DetectionResult>,
    }

    impl AudioEngine {
        pub fn new(config: AppConfig) -> Self {
            let (result_sender, _) = broadcast::channel(config.audio.result_channel_capacity.max(1));
            Self {
                config,
                input_stream: None,
                worker: None,
                running: Arc::new(AtomicBool::new(false)),
                dropped_frames: Arc::new(AtomicU64::new(0)),
                stream_errors: Arc::new(AtomicU64::new(0)),
                result_sender,
            }
        }

        /// Receive every detection published from now on
        pub fn subscribe(&self) -> broadcast::Receiver<DetectionResult> {
            self.result_sender.subscribe()
        }

        pub fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        /// Frames discarded because the detection thread fell behind
        pub fn dropped_frames(&self) -> u64 {
            self.dropped_frames.load(Ordering::Relaxed)
        }

        /// Errors the backend reported on the input stream since `new`
        pub fn stream_errors(&self) -> u64 {
            self.stream_errors.load(Ordering::Relaxed)
        }

        /// Open the default input device and start detecting
        ///
        /// # Errors
        /// - `AlreadyRunning` if a session is active
        /// - `StreamOpenFailed` if the device or configuration is unusable
        /// - `PlayFailed` if the stream cannot be started
        pub fn start(&mut self) -> Result<(), AudioError> {
            self.try_start().map_err(|err| {
                log_audio_error(&err, "start");
                err
            })
        }

        /// Stop capture, let the detection thread drain and return its statistics
        ///
        /// # Errors
        /// - `NotRunning` if no session is active
        /// - `WorkerPanicked` if the detection thread panicked
        pub fn stop(&mut self) -> Result<DetectorStats, AudioError> {
            self.try_stop().map_err(|err| {
                log_audio_error(&err, "stop");
                err
            })
        }

        fn try_start(&mut self) -> Result<(), AudioError> {
            if self.is_running() {
                return Err(AudioError::AlreadyRunning);
            }

            let (capture, detector, receiver) =
                build_pipeline(&self.config).map_err(|e| AudioError::StreamOpenFailed {
                    reason: e.to_string(),
                })?;
            self.dropped_frames = capture.dropped_frames();

            let stream = self.create_input_stream(capture)?;
            stream.play().map_err(|e| AudioError::PlayFailed {
                reason: e.to_string(),
            })?;

            self.running.store(true, Ordering::SeqCst);
            self.worker = Some(spawn_detection_thread(
                detector,
                receiver,
                self.result_sender.clone(),
                Arc::clone(&self.running),
                Duration::from_millis(self.config.audio.worker_poll_ms),
            ));
            self.input_stream = Some(stream);

            tracing::info!("[AudioEngine] Started");
            Ok(())
        }

        fn try_stop(&mut self) -> Result<DetectorStats, AudioError> {
            if !self.is_running() {
                return Err(AudioError::NotRunning);
            }

            // Dropping the stream drops the frame sender with it.
            drop(self.input_stream.take());
            self.running.store(false, Ordering::SeqCst);

            let stats = match self.worker.take() {
                Some(handle) => handle
                    .join()
                    .map(|detector| detector.stats())
                    .map_err(|_| AudioError::WorkerPanicked)?,
                None => DetectorStats::default(),
            };

            tracing::info!(
                "[AudioEngine] Stopped after {} chunks, detections {:?}, dropped {}, stream errors {}",
                stats.chunks_processed,
                stats.detections,
                self.dropped_frames(),
                self.stream_errors()
            );
            Ok(stats)
        }

        fn create_input_stream(&self, mut capture: CaptureState) -> Result<cpal::Stream, AudioError> {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| AudioError::StreamOpenFailed {
                    reason: "No default input device found".to_string(),
                })?;

            let supported = device
                .default_input_config()
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default input config: {:?}", e),
                })?;

            let device_rate = supported.sample_rate().0;
            if device_rate != self.config.spectrum.sample_rate {
                tracing::warn!(
                    "[AudioEngine] Device runs at {} Hz, spectrum configured for {} Hz",
                    device_rate,
                    self.config.spectrum.sample_rate
                );
            }

            let stream_config: cpal::StreamConfig = supported.clone().into();
            let channels = stream_config.channels as usize;
            let stream_errors = Arc::clone(&self.stream_errors);
            let err_fn = move |err: cpal::StreamError| {
                record_stream_failure(&stream_errors, err);
            };

            if supported.sample_format() != cpal::SampleFormat::F32 {
                return Err(AudioError::StreamOpenFailed {
                    reason: "Only F32 sample format is currently supported for input".to_string(),
                });
            }

            device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        capture.process_interleaved(data, channels);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("{:?}", e),
                })
        }
    }

    impl Drop for AudioEngine {
        fn drop(&mut self) {
            if self.is_running() {
                let _ = self.stop();
            }
        }
    }
}
