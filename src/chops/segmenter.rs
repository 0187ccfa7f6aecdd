// Segmenter
// Turns onsets into ordered, non-overlapping segments covering the whole buffer

use crate::audio::OnsetSet;
use crate::chops::types::Segment;
use crate::error::{ChopError, ChopResult};

/// Length rules applied to onset intervals
#[derive(Debug, Clone, Copy)]
pub struct SegmentPolicy {
    /// Fixed window length used to subdivide long intervals (seconds)
    pub default_length: f64,

    /// Shortest allowed segment (seconds)
    pub min_duration: f64,

    /// Intervals longer than split_factor * default_length get subdivided
    pub split_factor: f64,
}

impl SegmentPolicy {
    /// Smallest frame count whose duration is at least `min_duration`
    /// Never below one frame
    pub fn min_frames(&self, sample_rate: u32) -> usize {
        let sr = sample_rate as f64;
        let mut frames = ((self.min_duration * sr).ceil() as usize).max(1);
        while (frames as f64 / sr) < self.min_duration {
            frames += 1;
        }
        frames
    }

    /// Fixed window length in frames, never shorter than the minimum
    fn window_frames(&self, sample_rate: u32) -> usize {
        let default = (self.default_length * sample_rate as f64).round() as usize;
        default.max(self.min_frames(sample_rate))
    }

    /// Intervals longer than this many frames get subdivided
    fn split_threshold(&self, sample_rate: u32) -> f64 {
        self.split_factor * self.default_length * sample_rate as f64
    }
}

/// Build the run's segment list
///
/// All boundaries live on the sample grid, so every segment covers at least
/// one frame and its duration (frame count / sample rate) is never below
/// `min_duration`.
///
/// 1. Boundaries are the onsets (rounded to the nearest frame) plus the
///    buffer end.
/// 2. Intervals shorter than `min_duration` are merged forward; a short tail
///    left when boundaries run out is merged into its predecessor.
/// 3. Intervals longer than `split_factor * default_length` are cut into
///    `default_length` windows, with a short remainder folded into the last
///    window.
///
/// The result covers [0, frame_count) exactly, in order.
pub fn segment(
    onsets: &OnsetSet,
    sample_rate: u32,
    frame_count: usize,
    policy: &SegmentPolicy,
) -> ChopResult<Vec<Segment>> {
    let infeasible = || ChopError::SegmentationInfeasible {
        duration: frame_count as f64 / sample_rate.max(1) as f64,
        min_duration: policy.min_duration,
    };

    if sample_rate == 0 {
        return Err(infeasible());
    }

    let min_frames = policy.min_frames(sample_rate);
    if frame_count < min_frames {
        return Err(infeasible());
    }

    let boundaries = onset_frames(onsets, sample_rate, frame_count);
    let intervals = merge_short_intervals(&boundaries, frame_count, min_frames)
        .ok_or_else(infeasible)?;

    let mut bounds: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for (start, end) in intervals {
        split_long_interval(start, end, policy, sample_rate, &mut bounds);
    }

    let segments = bounds
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Segment::from_samples(index, start, end, sample_rate))
        .collect();

    Ok(segments)
}

/// Onset times as ascending, distinct frame positions inside [0, frame_count)
fn onset_frames(onsets: &OnsetSet, sample_rate: u32, frame_count: usize) -> Vec<usize> {
    let mut frames: Vec<usize> = onsets
        .times()
        .iter()
        .map(|&t| (t * sample_rate as f64).round() as usize)
        .filter(|&f| f < frame_count)
        .collect();
    frames.sort_unstable();
    frames.dedup();
    if frames.first() != Some(&0) {
        frames.insert(0, 0);
    }
    frames
}

/// Coalesce onset intervals until each spans at least `min_frames`
/// Returns None only when the whole buffer is shorter than `min_frames`
fn merge_short_intervals(
    boundaries: &[usize],
    frame_count: usize,
    min_frames: usize,
) -> Option<Vec<(usize, usize)>> {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;

    for &boundary in boundaries.iter().skip(1).chain(std::iter::once(&frame_count)) {
        if boundary - start >= min_frames {
            merged.push((start, boundary));
            start = boundary;
        }
    }

    if start < frame_count {
        // Boundaries exhausted with a short tail pending
        let last = merged.last_mut()?;
        last.1 = frame_count;
    }

    if merged.is_empty() {
        None
    } else {
        Some(merged)
    }
}

/// Push one interval, subdivided into fixed windows if it is too long
fn split_long_interval(
    start: usize,
    end: usize,
    policy: &SegmentPolicy,
    sample_rate: u32,
    out: &mut Vec<(usize, usize)>,
) {
    let length = end - start;
    if length as f64 <= policy.split_threshold(sample_rate) {
        out.push((start, end));
        return;
    }

    let window = policy.window_frames(sample_rate);
    let full_windows = length / window;
    let remainder = length % window;

    // Cut points strictly inside (start, end)
    let mut cuts: Vec<usize> = (1..full_windows).map(|k| start + k * window).collect();
    if remainder >= policy.min_frames(sample_rate) {
        cuts.push(start + full_windows * window);
    }

    let mut prev = start;
    for cut in cuts {
        out.push((prev, cut));
        prev = cut;
    }
    out.push((prev, end));
}
