//! Synthetic drum patterns
//!
//! Renders deterministic test audio for the detector:
//! - Kick: decaying sine sweeping down to the lowest sub-bands
//! - Clap: three short noise bursts band-passed around the clap range
//! - Hi-hat: short noise burst band-passed around the hi-hat range
//!
//! Voice centre frequencies follow the default band layout (48 kHz,
//! 1024-point FFT, about 47 Hz per sub-band). Noise comes from a seeded
//! `StdRng`, so equal seeds give bit-identical output.

use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis::BeatCategory;

/// Sixteenth-note steps per bar
pub const STEPS_PER_BAR: usize = 16;

const KICK_DURATION_MS: f32 = 180.0;
const CLAP_DURATION_MS: f32 = 120.0;
const HIHAT_DURATION_MS: f32 = 60.0;
/// Silence appended after the last bar so trailing hits decay fully
const TAIL_MS: f32 = 500.0;

/// One-bar step sequence repeated `bars` times
#[derive(Debug, Clone, PartialEq)]
pub struct DrumPattern {
    pub bpm: f32,
    pub bars: usize,
    pub kick: [bool; STEPS_PER_BAR],
    pub clap: [bool; STEPS_PER_BAR],
    pub hihat: [bool; STEPS_PER_BAR],
}

/// A scheduled voice onset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumHit {
    pub category: BeatCategory,
    pub offset_ms: f32,
}

fn steps(active: &[usize]) -> [bool; STEPS_PER_BAR] {
    let mut pattern = [false; STEPS_PER_BAR];
    for &step in active {
        pattern[step % STEPS_PER_BAR] = true;
    }
    pattern
}

impl DrumPattern {
    /// Kick on every beat, clap on 2 and 4, hi-hat on the off-beats
    pub fn four_on_the_floor(bars: usize) -> Self {
        Self {
            bpm: 120.0,
            bars,
            kick: steps(&[0, 4, 8, 12]),
            clap: steps(&[4, 12]),
            hihat: steps(&[2, 6, 10, 14]),
        }
    }

    /// Kick on every beat, nothing else
    pub fn kick_only(bars: usize) -> Self {
        Self {
            bpm: 120.0,
            bars,
            kick: steps(&[0, 4, 8, 12]),
            clap: [false; STEPS_PER_BAR],
            hihat: [false; STEPS_PER_BAR],
        }
    }

    pub fn step_duration_ms(&self) -> f32 {
        60_000.0 / self.bpm / 4.0
    }

    pub fn duration_ms(&self) -> f32 {
        self.step_duration_ms() * (STEPS_PER_BAR * self.bars) as f32 + TAIL_MS
    }

    /// Every onset in time order
    pub fn hits(&self) -> Vec<DrumHit> {
        let step_ms = self.step_duration_ms();
        let mut hits = Vec::new();

        for bar in 0..self.bars {
            for step in 0..STEPS_PER_BAR {
                let offset_ms = (bar * STEPS_PER_BAR + step) as f32 * step_ms;
                let voices = [
                    (BeatCategory::Bass, self.kick[step]),
                    (BeatCategory::Clap, self.clap[step]),
                    (BeatCategory::HiHat, self.hihat[step]),
                ];
                for (category, active) in voices {
                    if active {
                        hits.push(DrumHit {
                            category,
                            offset_ms,
                        });
                    }
                }
            }
        }

        hits
    }
}

/// Render `pattern` to mono samples in [-1, 1]
///
/// # Arguments
/// * `pattern` - Step sequence to render
/// * `sample_rate` - Output sample rate in Hz
/// * `seed` - Noise seed; equal seeds give identical output
pub fn render_pattern(pattern: &DrumPattern, sample_rate: u32, seed: u64) -> Vec<f32> {
    let total = ms_to_samples(pattern.duration_ms(), sample_rate);
    let mut samples = vec![0.0_f32; total];
    let mut rng = StdRng::seed_from_u64(seed);

    for hit in pattern.hits() {
        let start = ms_to_samples(hit.offset_ms, sample_rate);
        let voice = match hit.category {
            BeatCategory::Bass => kick(sample_rate),
            BeatCategory::Clap => clap(sample_rate, &mut rng),
            BeatCategory::HiHat => hihat(sample_rate, &mut rng),
        };
        for (out, value) in samples.iter_mut().skip(start).zip(voice) {
            *out += value;
        }
    }

    for sample in samples.iter_mut() {
        *sample = sample.clamp(-1.0, 1.0);
    }

    samples
}

fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    (ms * sample_rate as f32 / 1000.0).round() as usize
}

/// Pitch-swept sine: 100 Hz falling to 40 Hz
fn kick(sample_rate: u32) -> Vec<f32> {
    let len = ms_to_samples(KICK_DURATION_MS, sample_rate);
    let dt = 1.0 / sample_rate as f32;
    let mut phase = 0.0_f32;

    (0..len)
        .map(|n| {
            let t = n as f32 * dt;
            let frequency = 40.0 + 60.0 * (-t / 0.03).exp();
            phase += 2.0 * PI * frequency * dt;
            0.9 * (-t / 0.06).exp() * phase.sin()
        })
        .collect()
}

/// Three 10 ms noise bursts, then a short decay, centred near 420 Hz
fn clap(sample_rate: u32, rng: &mut StdRng) -> Vec<f32> {
    let len = ms_to_samples(CLAP_DURATION_MS, sample_rate);
    let burst = ms_to_samples(10.0, sample_rate).max(1);
    let mut filter = Bandpass::new(420.0, 1.5, sample_rate);

    (0..len)
        .map(|n| {
            let envelope = if n < 3 * burst {
                1.0 - (n % burst) as f32 / burst as f32 * 0.7
            } else {
                (-((n - 3 * burst) as f32 / sample_rate as f32) / 0.03).exp()
            };
            0.8 * envelope * filter.process(rng.gen_range(-1.0..1.0))
        })
        .collect()
}

/// Noise burst centred near 800 Hz with a fast decay
fn hihat(sample_rate: u32, rng: &mut StdRng) -> Vec<f32> {
    let len = ms_to_samples(HIHAT_DURATION_MS, sample_rate);
    let mut filter = Bandpass::new(800.0, 4.0, sample_rate);

    (0..len)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            0.6 * (-t / 0.015).exp() * filter.process(rng.gen_range(-1.0..1.0))
        })
        .collect()
}

/// Constant 0 dB peak gain band-pass biquad
struct Bandpass {
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl Bandpass {
    fn new(centre_hz: f32, q: f32, sample_rate: u32) -> Self {
        let w0 = 2.0 * PI * centre_hz / sample_rate as f32;
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: alpha / a0,
            b2: -alpha / a0,
            a1: -2.0 * w0.cos() / a0,
            a2: (1.0 - alpha) / a0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    fn process(&mut self, x: f32) -> f32 {
        let y = self.b0 * x + self.b2 * self.x2 - self.a1 * self.y1 - self.a2 * self.y2;
        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;
        y
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SpectrumFrontend;
    use crate::config::SpectrumConfig;

    const RATE: u32 = 48_000;

    fn spectrum_at(samples: &[f32], offset_ms: f32) -> Vec<f32> {
        let mut frontend = SpectrumFrontend::new(&SpectrumConfig::default(), 128).unwrap();
        let start = ms_to_samples(offset_ms, RATE);
        frontend.analyze_block(&samples[start..start + 1024]).to_vec()
    }

    fn band_energy(frame: &[f32], range: std::ops::Range<usize>) -> f32 {
        frame[range].iter().map(|m| m * m).sum()
    }

    #[test]
    fn test_hits_follow_pattern() {
        let pattern = DrumPattern::four_on_the_floor(2);
        let hits = pattern.hits();

        let count = |category: BeatCategory| {
            hits.iter()
                .filter(|hit| hit.category == category)
                .count()
        };
        assert_eq!(count(BeatCategory::Bass), 8);
        assert_eq!(count(BeatCategory::Clap), 4);
        assert_eq!(count(BeatCategory::HiHat), 8);

        assert!(hits.windows(2).all(|pair| pair[0].offset_ms <= pair[1].offset_ms));
        // 120 BPM: one beat every 500 ms, second kick at 500 ms.
        assert_eq!(hits[1].category, BeatCategory::HiHat);
        assert_eq!(hits[2].offset_ms, 500.0);
    }

    #[test]
    fn test_render_is_deterministic() {
        let pattern = DrumPattern::four_on_the_floor(1);
        let a = render_pattern(&pattern, RATE, 7);
        let b = render_pattern(&pattern, RATE, 7);
        let c = render_pattern(&pattern, RATE, 8);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), ms_to_samples(pattern.duration_ms(), RATE));
        assert!(a.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn test_kick_only_is_silent_between_hits() {
        let samples = render_pattern(&DrumPattern::kick_only(1), RATE, 1);
        let gap = ms_to_samples(300.0, RATE)..ms_to_samples(480.0, RATE);
        assert!(samples[gap].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_voices_land_in_their_bands() {
        let pattern = DrumPattern::four_on_the_floor(1);
        let samples = render_pattern(&pattern, RATE, 3);

        // Downbeat kick: energy sits in the lowest sub-bands.
        let kick = spectrum_at(&samples, 0.0);
        assert!(band_energy(&kick, 0..4) > 10.0 * band_energy(&kick, 4..128));

        // First off-beat hi-hat (step 2 = 250 ms) stands alone.
        let hat = spectrum_at(&samples, 250.0);
        assert!(band_energy(&hat, 12..24) > band_energy(&hat, 0..12));
        assert!(band_energy(&hat, 12..24) > band_energy(&hat, 30..128));
    }
}
