// Onset detection
// Log-compressed spectral flux with moving-average adaptive threshold peak picking

use serde::{Deserialize, Serialize};

use super::features::SpectrumAnalyzer;

/// Configuration for onset detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnsetConfig {
    /// FFT window size in samples (power of 2)
    pub window_size: usize,

    /// Hop size in samples (advance between frames)
    pub hop_size: usize,

    /// Frames before/after n that n must dominate to be a peak
    pub pre_max: usize,
    pub post_max: usize,

    /// Frames before/after n averaged for the adaptive threshold
    pub pre_avg: usize,
    pub post_avg: usize,

    /// Margin above the local mean, on the novelty curve normalized to [0, 1]
    pub delta: f32,

    /// Raw flux a frame needs before it can count as an onset
    /// Keeps numerical jitter in steady signals from being normalized into peaks
    pub min_novelty: f32,

    /// Minimum time between onsets in milliseconds
    pub min_onset_gap_ms: f64,
}

impl Default for OnsetConfig {
    fn default() -> Self {
        OnsetConfig {
            window_size: 2048,
            hop_size: 512,
            pre_max: 7,
            post_max: 7,
            pre_avg: 7,
            post_avg: 7,
            delta: 0.25,
            min_novelty: 1.0,
            min_onset_gap_ms: 30.0,
        }
    }
}

/// Ordered, deduplicated onset times in seconds
///
/// Always starts with 0.0. Every time lies in [0, duration).
#[derive(Debug, Clone, PartialEq)]
pub struct OnsetSet {
    times: Vec<f64>,
    detected: usize,
}

impl OnsetSet {
    /// Only the implicit onset at 0
    pub fn start_only() -> Self {
        OnsetSet {
            times: vec![0.0],
            detected: 0,
        }
    }

    /// Normalize detected peak times against a buffer duration
    /// Times outside [0, duration) are dropped; 0 is added if missing
    pub fn from_peaks(peaks: &[f64], duration: f64) -> Self {
        let mut times: Vec<f64> = peaks
            .iter()
            .copied()
            .filter(|t| t.is_finite() && *t >= 0.0 && *t < duration)
            .collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times.dedup();
        let detected = times.len();

        if times.first().map_or(true, |&t| t > 0.0) {
            times.insert(0, 0.0);
        }

        OnsetSet { times, detected }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of peaks the detector actually found
    pub fn detected(&self) -> usize {
        self.detected
    }
}

/// Detect onsets in a mono signal
///
/// Returns `{0}` when the signal is shorter than one window or has no peaks.
pub fn detect_onsets(mono: &[f32], sample_rate: u32, config: &OnsetConfig) -> OnsetSet {
    let duration = mono.len() as f64 / sample_rate.max(1) as f64;

    let novelty = compute_spectral_flux(mono, config);
    if novelty.is_empty() {
        return OnsetSet::start_only();
    }

    // A flux peak fires while the attack is still inside the frame, so the
    // frame start runs ahead of the event; search the frame for the sharpest rise
    let block = (config.hop_size / 4).max(1);
    let frames = pick_onset_peaks(&novelty, sample_rate, config);
    let peaks: Vec<f64> = frames
        .iter()
        .map(|&f| refine_onset(mono, f * config.hop_size, config.window_size, block))
        .map(|sample| sample as f64 / sample_rate as f64)
        .collect();

    log::debug!(
        "Onset detection: {} frames, {} peaks",
        novelty.len(),
        peaks.len()
    );

    OnsetSet::from_peaks(&peaks, duration)
}

/// Sample position of the sharpest energy rise in `[start, start + span)`
///
/// Energy is summed over `block`-sized blocks; each block is compared with the
/// one before it (the block just before `start` when there is one, silence
/// otherwise). Returns the start of the winning block, earliest on ties.
pub fn refine_onset(samples: &[f32], start: usize, span: usize, block: usize) -> usize {
    let block = block.max(1);
    let end = (start + span).min(samples.len());
    if start >= end {
        return start.min(samples.len());
    }

    let energy = |from: usize| -> f32 {
        let to = (from + block).min(samples.len());
        samples[from..to].iter().map(|s| s * s).sum()
    };

    let mut prev = if start >= block { energy(start - block) } else { 0.0 };
    let mut best = start;
    let mut best_rise = f32::NEG_INFINITY;

    for pos in (start..end).step_by(block) {
        let current = energy(pos);
        let rise = current - prev;
        if rise > best_rise {
            best_rise = rise;
            best = pos;
        }
        prev = current;
    }

    best
}

/// Spectral flux per frame: sum of positive differences between consecutive
/// log-compressed magnitude spectra. Frame 0 has no predecessor and gets 0.
pub fn compute_spectral_flux(samples: &[f32], config: &OnsetConfig) -> Vec<f32> {
    let window_size = config.window_size;
    let hop_size = config.hop_size;

    if hop_size == 0 || window_size == 0 || samples.len() < window_size {
        return Vec::new();
    }

    let num_frames = (samples.len() - window_size) / hop_size + 1;
    let analyzer = SpectrumAnalyzer::new(window_size);

    let mut flux = Vec::with_capacity(num_frames);
    let mut prev_spectrum: Option<Vec<f32>> = None;

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_size;
        let frame = &samples[start..start + window_size];

        let spectrum: Vec<f32> = analyzer
            .magnitudes(frame)
            .into_iter()
            .map(|m| m.ln_1p())
            .collect();

        let frame_flux: f32 = match prev_spectrum {
            Some(ref prev) => spectrum
                .iter()
                .zip(prev.iter())
                .map(|(curr, prev)| (curr - prev).max(0.0))
                .sum(),
            None => 0.0,
        };

        flux.push(frame_flux);
        prev_spectrum = Some(spectrum);
    }

    flux
}

/// Pick onset frames from a novelty curve
///
/// A frame is an onset when it is the maximum of its
/// [n - pre_max, n + post_max] neighbourhood, exceeds the mean of its
/// [n - pre_avg, n + post_avg] neighbourhood by `delta`, and is at least
/// `min_onset_gap_ms` after the previous onset. Frames with raw flux below
/// `min_novelty` never qualify.
pub fn pick_onset_peaks(novelty: &[f32], sample_rate: u32, config: &OnsetConfig) -> Vec<usize> {
    if novelty.len() < 2 || config.hop_size == 0 {
        return Vec::new();
    }

    let min = novelty.iter().copied().fold(f32::INFINITY, f32::min);
    let max = novelty.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range <= f32::EPSILON {
        return Vec::new();
    }
    let normalized: Vec<f32> = novelty.iter().map(|v| (v - min) / range).collect();

    let wait_frames = (config.min_onset_gap_ms * sample_rate as f64
        / 1000.0
        / config.hop_size as f64)
        .ceil() as usize;

    let n = normalized.len();
    let mut onsets = Vec::new();
    let mut last_onset: Option<usize> = None;

    for i in 0..n {
        let value = normalized[i];

        let max_lo = i.saturating_sub(config.pre_max);
        let max_hi = (i + config.post_max + 1).min(n);
        let is_peak = normalized[max_lo..max_hi].iter().all(|&v| v <= value);

        let avg_lo = i.saturating_sub(config.pre_avg);
        let avg_hi = (i + config.post_avg + 1).min(n);
        let window = &normalized[avg_lo..avg_hi];
        let local_mean = window.iter().sum::<f32>() / window.len() as f32;
        let above_threshold = value >= local_mean + config.delta;

        let strong_enough = novelty[i] >= config.min_novelty;
        let gap_ok = last_onset.map_or(true, |last| i - last >= wait_frames);

        if is_peak && above_threshold && strong_enough && gap_ok {
            onsets.push(i);
            last_onset = Some(i);
        }
    }

    onsets
}
