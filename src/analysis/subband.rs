// SubBandDetector - adaptive per-band thresholding
//
// Algorithm (per chunk, after the history is warm):
// 1. Normalize the current energy by the larger of the history maximum and
//    the current maximum, bounding every value to [0, 1]
// 2. For each band compute mean and population variance over the history
// 3. threshold[i] = scale * variance[i] + offset
// 4. mask[i] = norm[i] > threshold[i] * mean[i] / 3  OR  norm[i] > floor
//
// Bands with volatile recent energy get a higher threshold, so they need a
// larger spike to register. The absolute floor catches loud events in bands
// whose history is near zero.

use super::history::EnergyHistory;
use crate::config::DetectorConfig;

/// Per-band beat mask computation with pre-allocated scratch buffers
#[derive(Debug, Clone)]
pub struct SubBandDetector {
    threshold_scale: f32,
    threshold_offset: f32,
    absolute_floor: f32,
    means: Vec<f32>,
    variances: Vec<f32>,
    thresholds: Vec<f32>,
    normalized: Vec<f32>,
    mask: Vec<bool>,
}

impl SubBandDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        let bands = config.sub_bands;
        Self {
            threshold_scale: config.threshold_scale,
            threshold_offset: config.threshold_offset,
            absolute_floor: config.absolute_floor,
            means: vec![0.0; bands],
            variances: vec![0.0; bands],
            thresholds: vec![0.0; bands],
            normalized: vec![0.0; bands],
            mask: vec![false; bands],
        }
    }

    /// Recompute the sub-band mask for `current` against `history`
    ///
    /// # Arguments
    /// * `current` - Energy vector of the chunk under test
    /// * `history` - Rolling window of previous energy vectors
    ///
    /// # Returns
    /// The mask, one flag per band. All false when the window and the
    /// current vector are silent.
    pub fn detect(&mut self, current: &[f32], history: &EnergyHistory) -> &[bool] {
        debug_assert_eq!(current.len(), self.mask.len());

        let summary = history.band_statistics(&mut self.means, &mut self.variances);
        let max_instant = current.iter().copied().fold(0.0_f32, f32::max);
        let max = summary.max_energy.max(max_instant);

        if max <= 0.0 || !max.is_finite() {
            self.normalized.fill(0.0);
            self.mask.fill(false);
            return &self.mask;
        }

        for (threshold, &variance) in self.thresholds.iter_mut().zip(&self.variances) {
            *threshold = self.threshold_scale * variance + self.threshold_offset;
        }

        for (band, &energy) in current.iter().enumerate() {
            let norm = energy / max;
            self.normalized[band] = norm;
            self.mask[band] = norm > self.thresholds[band] * self.means[band] / 3.0
                || norm > self.absolute_floor;
        }

        &self.mask
    }

    /// Mask from the most recent [`detect`](Self::detect) call
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Normalized energies from the most recent detection
    pub fn normalized(&self) -> &[f32] {
        &self.normalized
    }

    /// Thresholds from the most recent detection
    pub fn thresholds(&self) -> &[f32] {
        &self.thresholds
    }
}
