// Spectral feature extraction
// Per-segment descriptors (energy, spectral shape, MFCC, chroma) plus the FFT
// helpers shared with onset detection

use rayon::prelude::*;
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::mfcc::{MfccBank, N_MFCC};
use crate::chops::types::{Segment, SegmentFeatures};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Band edges for the low/high energy shares
const LOW_BAND_MAX_HZ: f32 = 200.0;
const HIGH_BAND_MIN_HZ: f32 = 2000.0;

/// Chroma only looks at A0..~C8
const CHROMA_MIN_HZ: f32 = 27.5;
const CHROMA_MAX_HZ: f32 = 4200.0;

/// Configuration for per-segment spectral analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples between averaged frames
    pub hop_size: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        FeatureConfig {
            window_size: 2048,
            hop_size: 1024,
        }
    }
}

/// Windowed real FFT producing magnitude spectra
///
/// The plan is built once and shared; `RealToComplex` is `Send + Sync`, so one
/// analyzer can serve every rayon worker.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_size);

        SpectrumAnalyzer {
            fft,
            window: hann_window(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Number of magnitude bins (window_size / 2 + 1)
    pub fn bin_count(&self) -> usize {
        self.window.len() / 2 + 1
    }

    /// Magnitude spectrum of one frame
    /// Frames shorter than the window are zero-padded, longer ones truncated
    pub fn magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        let n = self.window.len();
        let mut input = vec![0.0f32; n];
        let copy_len = frame.len().min(n);
        for i in 0..copy_len {
            input[i] = frame[i] * self.window[i];
        }

        let mut spectrum = self.fft.make_output_vec();
        if let Err(e) = self.fft.process(&mut input, &mut spectrum) {
            log::warn!("FFT failed on {}-sample frame: {}", n, e);
            return vec![0.0; self.bin_count()];
        }

        spectrum.iter().map(|c| c.norm()).collect()
    }
}

/// Hann window of length n
pub fn hann_window(n: usize) -> Vec<f32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Replace NaN/Inf with 0
pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Computes SegmentFeatures for independent slices of a mono signal
pub struct FeatureExtractor {
    analyzer: SpectrumAnalyzer,
    mfcc: MfccBank,
    hop_size: usize,
    sample_rate: u32,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig, sample_rate: u32) -> Self {
        let analyzer = SpectrumAnalyzer::new(config.window_size);
        let mfcc = MfccBank::new(analyzer.bin_count(), sample_rate);

        FeatureExtractor {
            analyzer,
            mfcc,
            hop_size: config.hop_size.max(1),
            sample_rate,
        }
    }

    /// Extract features for every segment in parallel
    /// Output order matches `segments`
    pub fn extract_all(&self, mono: &[f32], segments: &[Segment]) -> Vec<SegmentFeatures> {
        segments
            .par_iter()
            .map(|segment| self.extract(segment.view(mono), segment.duration))
            .collect()
    }

    /// Extract features from a single slice of samples
    pub fn extract(&self, samples: &[f32], duration: f64) -> SegmentFeatures {
        if samples.is_empty() {
            return SegmentFeatures::zero(duration);
        }

        let rms = calculate_rms(samples);
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let zcr = calculate_zcr(samples);

        let (power, mfcc) = self.average_spectra(samples);
        let centroid = calculate_spectral_centroid(&power, self.bin_width());
        let flatness = calculate_spectral_flatness(&power);
        let (low, high) = calculate_band_shares(&power, self.bin_width());
        let chroma = calculate_chroma(&power, self.bin_width());
        let dominant_note = dominant_note(&chroma);

        SegmentFeatures {
            rms: finite_or_zero(rms),
            peak: finite_or_zero(peak),
            zcr: finite_or_zero(zcr),
            spectral_centroid: finite_or_zero(centroid),
            spectral_flatness: finite_or_zero(flatness),
            low_band_energy: finite_or_zero(low),
            high_band_energy: finite_or_zero(high),
            mfcc: mfcc.map(finite_or_zero),
            chroma: chroma.map(finite_or_zero),
            dominant_note,
            duration,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.analyzer.window_size() as f32
    }

    /// Mean power spectrum and mean per-frame MFCC over hop-spaced frames
    fn average_spectra(&self, samples: &[f32]) -> (Vec<f32>, [f32; N_MFCC]) {
        let window_size = self.analyzer.window_size();
        let mut power = vec![0.0f32; self.analyzer.bin_count()];
        let mut mfcc = [0.0f32; N_MFCC];
        let mut frames = 0usize;

        let mut start = 0;
        loop {
            let end = (start + window_size).min(samples.len());
            let frame_power: Vec<f32> = self
                .analyzer
                .magnitudes(&samples[start..end])
                .iter()
                .map(|m| m * m)
                .collect();
            for (acc, p) in power.iter_mut().zip(frame_power.iter()) {
                *acc += p;
            }
            for (acc, c) in mfcc.iter_mut().zip(self.mfcc.coefficients(&frame_power)) {
                *acc += c;
            }
            frames += 1;

            if end == samples.len() {
                break;
            }
            start += self.hop_size;
        }

        for p in power.iter_mut() {
            *p /= frames as f32;
        }
        for c in mfcc.iter_mut() {
            *c /= frames as f32;
        }
        (power, mfcc)
    }
}

/// Root-mean-square of raw sample amplitudes
pub fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Calculate Zero-Crossing Rate (ZCR)
/// Returns the rate of sign changes in the signal
/// Higher ZCR indicates noisy/unvoiced content
pub fn calculate_zcr(samples: &[f32]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|w| (w[1] >= 0.0) != (w[0] >= 0.0))
        .count();

    crossings as f32 / (samples.len() - 1) as f32
}

/// Center of mass of the power spectrum, in Hz
fn calculate_spectral_centroid(power: &[f32], bin_width: f32) -> f32 {
    let mut weighted_sum = 0.0;
    let mut total = 0.0;

    for (i, &p) in power.iter().enumerate() {
        weighted_sum += i as f32 * bin_width * p;
        total += p;
    }

    if total > 0.0 {
        weighted_sum / total
    } else {
        0.0
    }
}

/// Geometric mean over arithmetic mean of the power spectrum
/// 1.0 for white noise, near 0 for a pure tone
fn calculate_spectral_flatness(power: &[f32]) -> f32 {
    if power.is_empty() {
        return 0.0;
    }

    let eps = 1e-12f64;
    let n = power.len() as f64;
    let log_mean = power.iter().map(|&p| (p as f64 + eps).ln()).sum::<f64>() / n;
    let mean = power.iter().map(|&p| p as f64).sum::<f64>() / n;

    if mean <= eps {
        return 0.0;
    }

    (log_mean.exp() / (mean + eps)).min(1.0) as f32
}

/// Share of power below 200 Hz and above 2 kHz
fn calculate_band_shares(power: &[f32], bin_width: f32) -> (f32, f32) {
    if bin_width <= 0.0 {
        return (0.0, 0.0);
    }

    let mut low = 0.0;
    let mut high = 0.0;
    let mut total = 0.0;

    for (i, &p) in power.iter().enumerate() {
        let freq = i as f32 * bin_width;
        if freq < LOW_BAND_MAX_HZ {
            low += p;
        } else if freq >= HIGH_BAND_MIN_HZ {
            high += p;
        }
        total += p;
    }

    if total > 0.0 {
        (low / total, high / total)
    } else {
        (0.0, 0.0)
    }
}

/// Pitch-class energy shares (C..B), normalized to sum to 1
fn calculate_chroma(power: &[f32], bin_width: f32) -> [f32; 12] {
    let mut chroma = [0.0f32; 12];

    for (i, &p) in power.iter().enumerate().skip(1) {
        let freq = i as f32 * bin_width;
        if !(CHROMA_MIN_HZ..=CHROMA_MAX_HZ).contains(&freq) {
            continue;
        }
        let midi = 69.0 + 12.0 * (freq / 440.0).log2();
        let pitch_class = (midi.round() as i64).rem_euclid(12) as usize;
        chroma[pitch_class] += p;
    }

    let total: f32 = chroma.iter().sum();
    if total > 0.0 {
        for c in chroma.iter_mut() {
            *c /= total;
        }
    }
    chroma
}

/// Name of the strongest pitch class, None for silence
fn dominant_note(chroma: &[f32; 12]) -> Option<String> {
    let (idx, &max) = chroma
        .iter()
        .enumerate()
        .fold((0, &0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max > 0.0 {
        Some(NOTE_NAMES[idx].to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chops::types::FeatureVector;

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32;
                amplitude * phase.sin()
            })
            .collect()
    }

    /// Deterministic white-ish noise from a fixed LCG
    fn noise(amplitude: f32, len: usize) -> Vec<f32> {
        let mut state: u32 = 12345;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1664525).wrapping_add(1013904223);
                amplitude * ((state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0)
            })
            .collect()
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&FeatureConfig::default(), 44100)
    }

    #[test]
    fn test_zcr_calculation() {
        let alternating = vec![1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        assert!(calculate_zcr(&alternating) > 0.8);

        let constant = vec![1.0, 1.0, 1.0, 1.0];
        assert_eq!(calculate_zcr(&constant), 0.0);
    }

    #[test]
    fn test_hann_window() {
        let window = hann_window(100);

        assert!(window[0] < 0.1);
        assert!(window[99] < 0.1);
        assert!(window[50] > 0.9);
    }

    #[test]
    fn test_rms_is_absolute() {
        let loud = sine(440.0, 0.8, 44100, 4410);
        let quiet = sine(440.0, 0.1, 44100, 4410);

        let loud_rms = calculate_rms(&loud);
        let quiet_rms = calculate_rms(&quiet);

        // Sine RMS = A / sqrt(2)
        assert!((loud_rms - 0.8 / 2f32.sqrt()).abs() < 0.01);
        assert!((quiet_rms - 0.1 / 2f32.sqrt()).abs() < 0.01);
    }

    #[test]
    fn test_feature_extraction_empty() {
        let features = extractor().extract(&[], 0.0);
        assert_eq!(features.zcr, 0.0);
        assert_eq!(features.spectral_centroid, 0.0);
        assert_eq!(features.rms, 0.0);
        assert!(features.dominant_note.is_none());
    }

    #[test]
    fn test_silence_is_finite() {
        let features = extractor().extract(&vec![0.0; 8192], 0.2);
        assert_eq!(features.rms, 0.0);
        assert_eq!(features.spectral_flatness, 0.0);
        assert!(features.chroma.iter().all(|c| *c == 0.0));
        assert!(FeatureVector::from(&features).values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_centroid_tracks_pitch() {
        let ex = extractor();
        let low = ex.extract(&sine(220.0, 0.5, 44100, 8192), 0.19);
        let high = ex.extract(&sine(5000.0, 0.5, 44100, 8192), 0.19);

        assert!(low.spectral_centroid < 600.0);
        assert!(high.spectral_centroid > 4000.0);
        assert!(low.low_band_energy < 0.5);
        assert!(high.high_band_energy > 0.9);
    }

    #[test]
    fn test_flatness_separates_noise_from_tone() {
        let ex = extractor();
        let tone = ex.extract(&sine(1000.0, 0.5, 44100, 8192), 0.19);
        let hiss = ex.extract(&noise(0.5, 8192), 0.19);

        assert!(tone.spectral_flatness < 0.1);
        assert!(hiss.spectral_flatness > 0.3);
        assert!(hiss.zcr > tone.zcr);
    }

    #[test]
    fn test_dominant_note_of_a440() {
        let features = extractor().extract(&sine(440.0, 0.5, 44100, 16384), 0.37);
        assert_eq!(features.dominant_note.as_deref(), Some("A"));
        let sum: f32 = features.chroma.iter().sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_short_segment_is_zero_padded() {
        let features = extractor().extract(&sine(1000.0, 0.5, 44100, 300), 0.0068);
        assert!(features.rms > 0.3);
        assert!(features.spectral_centroid > 0.0);
    }

    #[test]
    fn test_mfcc_reflects_level_and_tilt() {
        let ex = extractor();
        let loud_low = ex.extract(&sine(220.0, 0.5, 44100, 8192), 0.19);
        let quiet_low = ex.extract(&sine(220.0, 0.05, 44100, 8192), 0.19);
        let loud_high = ex.extract(&sine(5000.0, 0.5, 44100, 8192), 0.19);

        assert!(loud_low.mfcc.iter().all(|c| c.is_finite()));
        assert!(loud_low.mfcc[0] > quiet_low.mfcc[0]);
        assert!(loud_low.mfcc[1] > loud_high.mfcc[1]);
    }

    #[test]
    fn test_silence_mfcc_is_finite() {
        let features = extractor().extract(&vec![0.0; 4096], 0.09);
        assert!(features.mfcc.iter().all(|c| c.is_finite()));
        assert!(features.mfcc[1..].iter().all(|c| c.abs() < 1e-2));
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(f32::NAN), 0.0);
        assert_eq!(finite_or_zero(f32::INFINITY), 0.0);
        assert_eq!(finite_or_zero(1.5), 1.5);
    }
}
