//! Configuration management for the beat detector
//!
//! All detector parameters are fixed at construction time. They are loaded
//! from a JSON file so the hand-tuned constants can be adjusted without
//! recompiling; the defaults reproduce the reference tuning exactly and
//! should be treated as a compatibility contract.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::DetectorError;

/// Band offsets (relative to the clap base index) that make up the clap trigger
pub const CLAP_BAND_OFFSETS: [usize; 3] = [0, 3, 6];

/// Input amplification the detector's thresholds were tuned against
///
/// The mask's mean-based test compares a normalized energy with an absolute
/// one, so band energies must sit well above 1 for it to be selective.
pub const DEFAULT_INPUT_GAIN: f32 = 500_000.0;

/// Band offsets (relative to the hi-hat base index) that make up the hi-hat trigger
pub const HIHAT_BAND_OFFSETS: [usize; 2] = [0, 2];

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Beat detection kernel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of sub-bands per frequency frame (N)
    pub sub_bands: usize,
    /// Depth of the rolling energy history in chunks (H)
    pub history_depth: usize,
    /// Base sub-band index of the clap range
    pub clap_range_low: usize,
    /// Base sub-band index of the hi-hat range
    pub hihat_range_low: usize,
    /// Chunks that must elapse (strictly more than) between two confirmations of one category
    pub debounce_chunks: u64,
    /// Candidate energies collected before bass confirmation activates
    pub bass_bootstrap: usize,
    /// Candidate energies collected before clap confirmation activates
    pub clap_bootstrap: usize,
    /// Candidate energies collected before hi-hat confirmation activates
    pub hihat_bootstrap: usize,
    /// Exponent applied to band magnitudes to obtain energy
    pub energy_exponent: f32,
    /// Variance multiplier of the per-band threshold
    pub threshold_scale: f32,
    /// Constant term of the per-band threshold
    pub threshold_offset: f32,
    /// Normalized energy above which a band always counts as a beat
    pub absolute_floor: f32,
    /// Candidate energy boost for clap and hi-hat
    pub category_boost: f32,
    /// Multiplier of the variance-gated confirmation test
    pub confirm_multiplier: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sub_bands: 128,
            history_depth: 60,
            clap_range_low: 6,
            hihat_range_low: 16,
            debounce_chunks: 4,
            bass_bootstrap: 5,
            clap_bootstrap: 3,
            hihat_bootstrap: 6,
            energy_exponent: 2.4,
            threshold_scale: 27.0,
            threshold_offset: 1.2,
            absolute_floor: 0.15,
            category_boost: 1.6,
            confirm_multiplier: 0.006,
        }
    }
}

impl DetectorConfig {
    /// Reduced 39-band profile for hosts that deliver a coarser spectrum
    pub fn compact() -> Self {
        Self {
            sub_bands: 39,
            ..Self::default()
        }
    }

    /// Check the configuration against the frame layout it will index into
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.sub_bands == 0 {
            return Err(invalid("sub_bands must be greater than 0"));
        }
        if self.history_depth == 0 {
            return Err(invalid("history_depth must be greater than 0"));
        }

        let clap_top = self.clap_range_low + CLAP_BAND_OFFSETS[CLAP_BAND_OFFSETS.len() - 1];
        if clap_top >= self.sub_bands {
            return Err(invalid(format!(
                "clap range reaches band {} but only {} sub-bands are configured",
                clap_top, self.sub_bands
            )));
        }

        let hihat_top = self.hihat_range_low + HIHAT_BAND_OFFSETS[HIHAT_BAND_OFFSETS.len() - 1];
        if hihat_top >= self.sub_bands {
            return Err(invalid(format!(
                "hi-hat range reaches band {} but only {} sub-bands are configured",
                hihat_top, self.sub_bands
            )));
        }

        if self.bass_bootstrap == 0 || self.clap_bootstrap == 0 || self.hihat_bootstrap == 0 {
            return Err(invalid("bootstrap capacities must be greater than 0"));
        }

        let constants = [
            ("energy_exponent", self.energy_exponent),
            ("threshold_scale", self.threshold_scale),
            ("threshold_offset", self.threshold_offset),
            ("absolute_floor", self.absolute_floor),
            ("category_boost", self.category_boost),
            ("confirm_multiplier", self.confirm_multiplier),
        ];
        for (name, value) in constants {
            if !value.is_finite() {
                return Err(invalid(format!("{} must be finite (got {})", name, value)));
            }
        }
        if self.energy_exponent <= 0.0 {
            return Err(invalid("energy_exponent must be positive"));
        }

        Ok(())
    }
}

/// Spectrum front-end parameters (time-domain samples to frequency frames)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Expected input sample rate in Hz
    pub sample_rate: u32,
    /// FFT window size in samples
    pub fft_size: usize,
    /// New samples between two emitted frames
    pub hop_size: usize,
    /// Linear gain applied to the samples before the FFT
    pub gain: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 1024,
            hop_size: 1024,
            gain: DEFAULT_INPUT_GAIN,
        }
    }
}

impl SpectrumConfig {
    /// Check the front-end can deliver `sub_bands` magnitudes per frame
    pub fn validate(&self, sub_bands: usize) -> Result<(), DetectorError> {
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate must be greater than 0"));
        }
        if self.fft_size < 2 {
            return Err(invalid("fft_size must be at least 2"));
        }
        if self.hop_size == 0 || self.hop_size > self.fft_size {
            return Err(invalid(format!(
                "hop_size must be within 1..={} (got {})",
                self.fft_size, self.hop_size
            )));
        }
        if !self.gain.is_finite() || self.gain <= 0.0 {
            return Err(invalid(format!("gain must be positive (got {})", self.gain)));
        }
        if sub_bands > self.fft_size / 2 + 1 {
            return Err(invalid(format!(
                "fft_size {} yields {} bins, fewer than {} sub-bands",
                self.fft_size,
                self.fft_size / 2 + 1,
                sub_bands
            )));
        }
        Ok(())
    }

    /// Duration of one chunk in milliseconds
    pub fn chunk_duration_ms(&self) -> f64 {
        self.hop_size as f64 / self.sample_rate as f64 * 1000.0
    }
}

/// Capture engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Number of pre-allocated frame buffers in the frame port
    pub frame_port_capacity: usize,
    /// Capacity of the detection broadcast channel
    pub result_channel_capacity: usize,
    /// Sleep between two drains of an empty frame port
    pub worker_poll_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_port_capacity: crate::audio::DEFAULT_PORT_CAPACITY,
            result_channel_capacity: 256,
            worker_poll_ms: 1,
        }
    }
}

impl AppConfig {
    /// Validate every section against each other
    pub fn validate(&self) -> Result<(), DetectorError> {
        self.detector.validate()?;
        self.spectrum.validate(self.detector.sub_bands)?;
        if self.audio.frame_port_capacity == 0 {
            return Err(invalid("frame_port_capacity must be greater than 0"));
        }
        if self.audio.result_channel_capacity == 0 {
            return Err(invalid("result_channel_capacity must be greater than 0"));
        }
        Ok(())
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// cannot be parsed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/beat_config.json")
    }
}

fn invalid(reason: impl Into<String>) -> DetectorError {
    DetectorError::InvalidConfig {
        reason: reason.into(),
    }
}
