// EnergyHistory - fixed-depth rolling window of energy vectors
//
// Storage is a single pre-allocated row-major buffer of `depth * bands`
// floats used as a ring: pushing overwrites the oldest row once the window is
// full, so insertion is O(bands) with no allocation after construction.

/// Rolling window of the last `depth` energy vectors, oldest first
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    data: Vec<f32>,
    depth: usize,
    bands: usize,
    len: usize,
    // Slot the next push writes to; equals the oldest row once full.
    next: usize,
}

/// Window-wide figures returned alongside the per-band statistics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    /// Largest energy anywhere in the window
    pub max_energy: f32,
}

impl EnergyHistory {
    /// Create an empty history
    ///
    /// # Arguments
    /// * `depth` - Number of vectors retained (H)
    /// * `bands` - Length of each vector (N)
    pub fn new(depth: usize, bands: usize) -> Self {
        assert!(depth > 0, "depth must be greater than 0");
        assert!(bands > 0, "bands must be greater than 0");
        Self {
            data: vec![0.0; depth * bands],
            depth,
            bands,
            len: 0,
            next: 0,
        }
    }

    /// Append a vector, evicting the oldest one once the window is full
    pub fn push(&mut self, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.bands);
        let start = self.next * self.bands;
        self.data[start..start + self.bands].copy_from_slice(vector);
        self.next = (self.next + 1) % self.depth;
        if self.len < self.depth {
            self.len += 1;
        }
    }

    /// True once the window holds exactly `depth` vectors
    pub fn is_warm(&self) -> bool {
        self.len == self.depth
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Vector at chronological position `index` (0 = oldest)
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        if index >= self.len {
            return None;
        }
        let slot = (self.oldest_slot() + index) % self.depth;
        let start = slot * self.bands;
        Some(&self.data[start..start + self.bands])
    }

    /// Oldest retained vector
    pub fn oldest(&self) -> Option<&[f32]> {
        self.get(0)
    }

    /// Most recently pushed vector
    pub fn newest(&self) -> Option<&[f32]> {
        self.len.checked_sub(1).and_then(|index| self.get(index))
    }

    /// Iterate vectors in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    /// Compute per-band mean and population variance over the window
    ///
    /// Writes into caller-owned buffers of length `bands` and returns the
    /// window maximum. Each band is visited in two passes (mean, then squared
    /// deviation) so the variance matches the textbook definition exactly.
    pub fn band_statistics(&self, means: &mut [f32], variances: &mut [f32]) -> WindowSummary {
        debug_assert_eq!(means.len(), self.bands);
        debug_assert_eq!(variances.len(), self.bands);

        means.fill(0.0);
        variances.fill(0.0);

        if self.len == 0 {
            return WindowSummary { max_energy: 0.0 };
        }

        let rows = &self.data[..self.len * self.bands];
        let mut max_energy = 0.0_f32;

        for row in rows.chunks_exact(self.bands) {
            for (mean, &value) in means.iter_mut().zip(row) {
                *mean += value;
                max_energy = max_energy.max(value);
            }
        }

        let count = self.len as f32;
        for mean in means.iter_mut() {
            *mean /= count;
        }

        for row in rows.chunks_exact(self.bands) {
            for ((variance, &mean), &value) in variances.iter_mut().zip(means.iter()).zip(row) {
                let deviation = value - mean;
                *variance += deviation * deviation;
            }
        }

        for variance in variances.iter_mut() {
            *variance /= count;
        }

        WindowSummary { max_energy }
    }

    fn oldest_slot(&self) -> usize {
        if self.len < self.depth {
            0
        } else {
            self.next
        }
    }
}
