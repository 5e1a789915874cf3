// Analysis module - streaming beat-detection kernel
//
// The kernel consumes one frequency frame per audio quantum and reports
// which percussive categories fired on that chunk.
//
// Pipeline (per chunk):
//   validate frame → energy (|m|^2.4) → history push
//     → (warm only) sub-band mask → category state machines → publisher
//
// All buffers are allocated in `BeatDetector::new`; `process_chunk` performs
// no allocation, takes no locks and never blocks, so it can run inside an
// audio callback. Each detector instance is owned by exactly one thread.

use crate::audio::frame_port::FrameReceiver;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

pub mod category;
pub mod energy;
pub mod history;
pub mod publisher;
pub mod subband;


use category::{CategoryDetector, CategoryOutcome};
use history::EnergyHistory;
use publisher::DetectionPublisher;
use subband::SubBandDetector;

pub use category::{BeatCategory, CategoryPhase};
pub use publisher::{DetectionResult, DetectionSink};

/// Counters describing what the detector has seen so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DetectorStats {
    /// Frames accepted (sentinels and rejected frames excluded)
    pub chunks_processed: u64,
    /// Frames rejected at intake
    pub rejected_frames: u64,
    /// Confirmed beats per category, [bass, clap, hihat]
    pub detections: [u64; 3],
    /// History has reached its configured depth
    pub warm: bool,
}

/// Outcome of draining a frame port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Packets taken from the port (frames and sentinels)
    pub packets: usize,
    /// Results handed to the sink
    pub published: usize,
}

/// Streaming beat detector
pub struct BeatDetector {
    config: DetectorConfig,
    history: EnergyHistory,
    subband: SubBandDetector,
    categories: [CategoryDetector; 3],
    publisher: DetectionPublisher,
    energy: Vec<f32>,
    chunks_processed: u64,
    rejected_frames: u64,
    detections: [u64; 3],
}

impl BeatDetector {
    /// Create a detector with empty history and bootstrapping categories
    ///
    /// # Errors
    /// `DetectorError::InvalidConfig` if the configuration fails validation.
    pub fn new(config: DetectorConfig) -> Result<Self, DetectorError> {
        config.validate()?;

        tracing::info!(
            "[BeatDetector] {} sub-bands, history {} chunks, clap base {}, hi-hat base {}",
            config.sub_bands,
            config.history_depth,
            config.clap_range_low,
            config.hihat_range_low
        );

        Ok(Self {
            history: EnergyHistory::new(config.history_depth, config.sub_bands),
            subband: SubBandDetector::new(&config),
            categories: [
                CategoryDetector::bass(&config),
                CategoryDetector::clap(&config),
                CategoryDetector::hihat(&config),
            ],
            publisher: DetectionPublisher::new(),
            energy: vec![0.0; config.sub_bands],
            chunks_processed: 0,
            rejected_frames: 0,
            detections: [0; 3],
            config,
        })
    }

    /// Process one chunk
    ///
    /// # Arguments
    /// * `frame` - Frequency magnitudes of the chunk, or `None` when the host
    ///   has no data for this quantum (a no-op, distinct from silence)
    ///
    /// # Returns
    /// `Some(result)` if at least one category fired on this chunk. Chunks
    /// that arrive before the history is warm only fill the history.
    ///
    /// # Errors
    /// Contract errors for frames of the wrong length, with negative or
    /// non-finite magnitudes, or with magnitudes whose energy overflows.
    /// Rejected frames leave all state untouched.
    pub fn process_chunk(
        &mut self,
        frame: Option<&[f32]>,
    ) -> Result<Option<DetectionResult>, DetectorError> {
        self.run_chunk(frame)?;
        Ok(self.publisher.take())
    }

    /// Process one chunk and forward a result to `sink` if any category fired
    pub fn process_and_publish<S: DetectionSink + ?Sized>(
        &mut self,
        frame: Option<&[f32]>,
        sink: &mut S,
    ) -> Result<Option<DetectionResult>, DetectorError> {
        self.run_chunk(frame)?;
        Ok(self.publisher.flush(sink))
    }

    /// Advance the kernel by one chunk, leaving the outcome in the publisher
    fn run_chunk(&mut self, frame: Option<&[f32]>) -> Result<(), DetectorError> {
        let Some(frame) = frame else {
            return Ok(());
        };

        // `energy` is scratch until the frame is accepted.
        if let Err(err) = energy::validate_frame(frame, self.config.sub_bands).and_then(|()| {
            energy::extract_energy_into(frame, self.config.energy_exponent, &mut self.energy)
        }) {
            self.rejected_frames += 1;
            return Err(err);
        }

        self.chunks_processed += 1;

        if !self.history.is_warm() {
            self.history.push(&self.energy);
            if self.history.is_warm() {
                tracing::trace!(
                    "[BeatDetector] History warm after {} chunks",
                    self.chunks_processed
                );
            }
            return Ok(());
        }

        self.history.push(&self.energy);
        let mask = self.subband.detect(&self.energy, &self.history);

        for detector in self.categories.iter_mut() {
            if detector.process(mask, &self.energy, self.chunks_processed)
                == CategoryOutcome::Confirmed
            {
                let category = detector.category();
                self.publisher.mark(category);
                self.detections[category.index()] += 1;
                tracing::debug!(
                    "[BeatDetector] {:?} confirmed at chunk {}",
                    category,
                    self.chunks_processed
                );
            }
        }

        Ok(())
    }

    /// Process every packet waiting in `receiver`, in arrival order
    ///
    /// Stops at the first rejected frame; that frame's buffer is still
    /// returned to the pool and the remaining packets stay queued.
    pub fn drain<S: DetectionSink + ?Sized>(
        &mut self,
        receiver: &mut FrameReceiver,
        sink: &mut S,
    ) -> Result<DrainReport, DetectorError> {
        let mut report = DrainReport::default();

        while let Some(outcome) = receiver.recv_with(|frame| self.process_and_publish(frame, &mut *sink))
        {
            report.packets += 1;
            if outcome?.is_some() {
                report.published += 1;
            }
        }

        Ok(report)
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn is_warm(&self) -> bool {
        self.history.is_warm()
    }

    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }

    /// Sub-band mask of the most recent detection chunk
    pub fn subband_mask(&self) -> &[bool] {
        self.subband.mask()
    }

    /// Normalized energies of the most recent detection chunk
    pub fn normalized_energy(&self) -> &[f32] {
        self.subband.normalized()
    }

    pub fn category(&self, category: BeatCategory) -> &CategoryDetector {
        &self.categories[category.index()]
    }

    pub fn category_phase(&self, category: BeatCategory) -> CategoryPhase {
        self.category(category).phase()
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            chunks_processed: self.chunks_processed,
            rejected_frames: self.rejected_frames,
            detections: self.detections,
            warm: self.history.is_warm(),
        }
    }
}
