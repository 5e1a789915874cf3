// SpectrumFrontend - time-domain samples to frequency frames
//
// Keeps a sliding window of the last `fft_size` samples. Every `hop_size` new
// samples (once the window is full) it applies a Hann window, runs a forward
// FFT and emits the first `bands` bin magnitudes scaled by gain * 2 / fft_size.
//
// The FFT plan, window and every working buffer are created up front, so
// pushing samples never allocates and can run inside an audio callback.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::SpectrumConfig;
use crate::error::DetectorError;

/// Streaming FFT front-end producing one magnitude frame per hop
pub struct SpectrumFrontend {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    hop_size: usize,
    bands: usize,
    scale: f32,
    /// Hann window (pre-computed)
    window: Vec<f32>,
    /// Circular sample window; `write` points at the oldest sample once full
    samples: Vec<f32>,
    write: usize,
    filled: usize,
    since_last_frame: usize,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    frame: Vec<f32>,
}

impl SpectrumFrontend {
    /// Create a front-end emitting frames of `bands` magnitudes
    ///
    /// # Errors
    /// `InvalidConfig` if the FFT cannot supply `bands` bins or the hop is out
    /// of range.
    pub fn new(config: &SpectrumConfig, bands: usize) -> Result<Self, DetectorError> {
        config.validate(bands)?;

        let fft_size = config.fft_size;
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();

        Ok(Self {
            fft,
            fft_size,
            hop_size: config.hop_size,
            bands,
            scale: config.gain * 2.0 / fft_size as f32,
            window,
            samples: vec![0.0; fft_size],
            write: 0,
            filled: 0,
            since_last_frame: 0,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            frame: vec![0.0; bands],
        })
    }

    /// Push mono samples, calling `on_frame` for every completed frame
    ///
    /// # Returns
    /// Number of frames emitted by this call.
    pub fn push_samples(&mut self, samples: &[f32], mut on_frame: impl FnMut(&[f32])) -> usize {
        let mut emitted = 0;

        for &sample in samples {
            self.samples[self.write] = sample;
            self.write = (self.write + 1) % self.fft_size;
            if self.filled < self.fft_size {
                self.filled += 1;
            }
            self.since_last_frame += 1;

            if self.filled == self.fft_size && self.since_last_frame >= self.hop_size {
                self.since_last_frame = 0;
                self.compute_frame();
                on_frame(&self.frame);
                emitted += 1;
            }
        }

        emitted
    }

    /// Magnitude frame of a single block of samples
    ///
    /// Blocks shorter than `fft_size` are zero-padded, longer ones truncated.
    /// The streaming window is left untouched.
    pub fn analyze_block(&mut self, block: &[f32]) -> &[f32] {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = block.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.transform();
        &self.frame
    }

    /// Drop buffered samples so the next frame starts from a fresh window
    pub fn reset(&mut self) {
        self.samples.fill(0.0);
        self.write = 0;
        self.filled = 0;
        self.since_last_frame = 0;
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    fn compute_frame(&mut self) {
        // Unroll the circular window oldest first.
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = self.samples[(self.write + i) % self.fft_size];
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.transform();
    }

    fn transform(&mut self) {
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (magnitude, bin) in self.frame.iter_mut().zip(&self.buffer) {
            *magnitude = bin.norm() * self.scale;
        }
    }
}
