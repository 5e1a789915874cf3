// Category aggregation and beat confirmation
//
// Each percussive category (bass, clap, hi-hat) runs the same debounced
// state machine:
//
//   Bootstrapping --(beat history reaches capacity)--> Armed
//
// Bootstrapping collects the category's scalar energy every time its trigger
// bands fire. Once Armed, a triggered chunk is confirmed only if the boosted
// candidate energy stands out against how erratic recent confirmed hits have
// been (variance-gated test below). Confirmed candidates slide into the beat
// history so the gate keeps adapting.

use std::collections::VecDeque;

use crate::config::{DetectorConfig, CLAP_BAND_OFFSETS, HIHAT_BAND_OFFSETS};

/// Percussive categories reported by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatCategory {
    /// Low-frequency hits (kick, bass drop)
    Bass,
    /// Mid-band noise bursts (clap, snare)
    Clap,
    /// High-frequency transients (hi-hat, shaker)
    HiHat,
}

impl BeatCategory {
    /// All categories in detection-result order
    pub const ALL: [BeatCategory; 3] = [BeatCategory::Bass, BeatCategory::Clap, BeatCategory::HiHat];

    /// Position of this category in a [`DetectionResult`](super::DetectionResult)
    pub fn index(self) -> usize {
        match self {
            BeatCategory::Bass => 0,
            BeatCategory::Clap => 1,
            BeatCategory::HiHat => 2,
        }
    }
}

/// Weighted clap energy: bands `low`, `low + 3`, `low + 6`
pub fn clap_energy(energy: &[f32], low: usize) -> f32 {
    (1.2 * energy[low + CLAP_BAND_OFFSETS[0]]
        + 1.5 * energy[low + CLAP_BAND_OFFSETS[1]]
        + 1.3 * energy[low + CLAP_BAND_OFFSETS[2]])
        / 4.0
}

/// Weighted hi-hat energy: bands `low`, `low + 2`
pub fn hihat_energy(energy: &[f32], low: usize) -> f32 {
    (1.8 * energy[low + HIHAT_BAND_OFFSETS[0]] + 1.2 * energy[low + HIHAT_BAND_OFFSETS[1]]) / 3.0
}

fn band_energy(energy: &[f32], band: usize) -> f32 {
    energy[band]
}

/// Variance-gated confirmation of a candidate against previous beat energies
///
/// With `max` the largest entry of `history`:
/// - `avg = mean(history) / max`
/// - `variance = population variance of the entries divided by max`, which
///   equals the raw variance divided by `max²`
/// - confirmed iff `candidate / max > avg * variance * multiplier`
///
/// Returns false for an empty or all-zero history instead of dividing by zero.
pub fn confirm_beat(candidate: f32, history: &VecDeque<f32>, multiplier: f32) -> bool {
    if history.is_empty() {
        return false;
    }

    let max = history.iter().copied().fold(0.0_f32, f32::max);
    if max <= 0.0 || !max.is_finite() {
        return false;
    }

    let count = history.len() as f32;
    let avg = history.iter().sum::<f32>() / count / max;
    let variance = history
        .iter()
        .map(|energy| {
            let deviation = energy / max - avg;
            deviation * deviation
        })
        .sum::<f32>()
        / count;

    let ratio = candidate / max;
    ratio.is_finite() && ratio > avg * variance * multiplier
}

/// Lifecycle phase of a category detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPhase {
    /// Collecting initial beat energies
    Bootstrapping,
    /// Confirming candidates against the beat history
    Armed,
}

/// What a category detector did with one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryOutcome {
    /// Trigger bands did not all fire
    Idle,
    /// Triggered within the debounce window of the last confirmation
    Debounced,
    /// Energy appended to the bootstrap history
    Collected,
    /// Candidate confirmed as a beat
    Confirmed,
    /// Candidate failed the variance gate, or its energy overflowed
    Rejected,
}

/// One debounced confirmation state machine
///
/// Parameterized by the trigger bands, the scalar energy function, the
/// candidate boost, the bootstrap capacity and the debounce window. The beat
/// history is pre-allocated to its capacity and never grows beyond it.
#[derive(Debug, Clone)]
pub struct CategoryDetector {
    category: BeatCategory,
    trigger_bands: Vec<usize>,
    energy_fn: fn(&[f32], usize) -> f32,
    energy_base: usize,
    boost: f32,
    capacity: usize,
    debounce_chunks: u64,
    confirm_multiplier: f32,
    beat_history: VecDeque<f32>,
    last_trigger_chunk: u64,
}

impl CategoryDetector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: BeatCategory,
        trigger_bands: Vec<usize>,
        energy_fn: fn(&[f32], usize) -> f32,
        energy_base: usize,
        boost: f32,
        capacity: usize,
        debounce_chunks: u64,
        confirm_multiplier: f32,
    ) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            category,
            trigger_bands,
            energy_fn,
            energy_base,
            boost,
            capacity,
            debounce_chunks,
            confirm_multiplier,
            beat_history: VecDeque::with_capacity(capacity),
            last_trigger_chunk: 0,
        }
    }

    /// Bass: band 0, raw band energy, no boost
    pub fn bass(config: &DetectorConfig) -> Self {
        Self::new(
            BeatCategory::Bass,
            vec![0],
            band_energy,
            0,
            1.0,
            config.bass_bootstrap,
            config.debounce_chunks,
            config.confirm_multiplier,
        )
    }

    /// Clap: bands `low`, `low + 3`, `low + 6`, weighted clap energy
    pub fn clap(config: &DetectorConfig) -> Self {
        let low = config.clap_range_low;
        Self::new(
            BeatCategory::Clap,
            CLAP_BAND_OFFSETS.iter().map(|offset| low + offset).collect(),
            clap_energy,
            low,
            config.category_boost,
            config.clap_bootstrap,
            config.debounce_chunks,
            config.confirm_multiplier,
        )
    }

    /// Hi-hat: bands `low`, `low + 2`, weighted hi-hat energy
    pub fn hihat(config: &DetectorConfig) -> Self {
        let low = config.hihat_range_low;
        Self::new(
            BeatCategory::HiHat,
            HIHAT_BAND_OFFSETS.iter().map(|offset| low + offset).collect(),
            hihat_energy,
            low,
            config.category_boost,
            config.hihat_bootstrap,
            config.debounce_chunks,
            config.confirm_multiplier,
        )
    }

    /// Run the state machine for one chunk
    ///
    /// # Arguments
    /// * `mask` - Sub-band beat mask of the chunk
    /// * `energy` - Energy vector of the chunk
    /// * `chunk` - Global chunk counter value of the chunk
    pub fn process(&mut self, mask: &[bool], energy: &[f32], chunk: u64) -> CategoryOutcome {
        if !self.trigger_bands.iter().all(|&band| mask[band]) {
            return CategoryOutcome::Idle;
        }

        if chunk.saturating_sub(self.last_trigger_chunk) <= self.debounce_chunks {
            return CategoryOutcome::Debounced;
        }

        // Weighted sums of near-f32::MAX energies can overflow.
        let scalar = (self.energy_fn)(energy, self.energy_base);
        let candidate = scalar * self.boost;
        if !candidate.is_finite() {
            return CategoryOutcome::Rejected;
        }

        if self.beat_history.len() < self.capacity {
            self.beat_history.push_back(scalar);
            return CategoryOutcome::Collected;
        }

        if confirm_beat(candidate, &self.beat_history, self.confirm_multiplier) {
            self.beat_history.pop_front();
            self.beat_history.push_back(candidate);
            self.last_trigger_chunk = chunk;
            CategoryOutcome::Confirmed
        } else {
            CategoryOutcome::Rejected
        }
    }

    pub fn category(&self) -> BeatCategory {
        self.category
    }

    pub fn phase(&self) -> CategoryPhase {
        if self.beat_history.len() < self.capacity {
            CategoryPhase::Bootstrapping
        } else {
            CategoryPhase::Armed
        }
    }

    /// Beat energies, oldest first
    pub fn beat_history(&self) -> &VecDeque<f32> {
        &self.beat_history
    }

    pub fn last_trigger_chunk(&self) -> u64 {
        self.last_trigger_chunk
    }

    pub fn trigger_bands(&self) -> &[usize] {
        &self.trigger_bands
    }
}
