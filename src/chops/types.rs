// Chop data types
// Segments, feature snapshots, clusters, and the externally visible ChopSummary

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::mfcc::N_MFCC;

/// A contiguous, finalized time interval of the source recording
///
/// Holds the sample range it covers so the audio can be viewed without copying
/// until a chop is materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the run's ordered segment list
    pub index: usize,

    /// Start time in seconds
    pub start: f64,

    /// End time in seconds (> start)
    pub end: f64,

    /// Length in seconds, from the frame count rather than end - start
    pub duration: f64,

    /// First frame covered (inclusive)
    pub start_sample: usize,

    /// Last frame covered (exclusive, > start_sample)
    pub end_sample: usize,
}

impl Segment {
    /// Segment covering frames [start_sample, end_sample) of a signal at `sample_rate`
    pub fn from_samples(
        index: usize,
        start_sample: usize,
        end_sample: usize,
        sample_rate: u32,
    ) -> Self {
        let sr = sample_rate as f64;
        Segment {
            index,
            start: start_sample as f64 / sr,
            end: end_sample as f64 / sr,
            duration: end_sample.saturating_sub(start_sample) as f64 / sr,
            start_sample,
            end_sample,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.end_sample.saturating_sub(self.start_sample)
    }

    /// Borrow this segment's samples from a signal of the same timeline
    pub fn view<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        let end = self.end_sample.min(samples.len());
        let start = self.start_sample.min(end);
        &samples[start..end]
    }
}

/// Numeric description of a segment's acoustic character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentFeatures {
    /// Root-mean-square of raw amplitudes (absolute loudness, not normalized)
    pub rms: f32,

    /// Maximum absolute sample value
    pub peak: f32,

    /// Zero-crossing rate (crossings per sample)
    /// Higher values indicate noisy/unvoiced content
    pub zcr: f32,

    /// Spectral centroid (Hz) - "center of mass" of spectrum
    pub spectral_centroid: f32,

    /// Spectral flatness [0, 1]; 1 is white noise, ~0 is a pure tone
    pub spectral_flatness: f32,

    /// Share of power below 200 Hz
    pub low_band_energy: f32,

    /// Share of power above 2 kHz
    pub high_band_energy: f32,

    /// Mean mel-frequency cepstral coefficients over the segment's frames
    pub mfcc: [f32; N_MFCC],

    /// Pitch-class energy shares, C through B
    pub chroma: [f32; 12],

    /// Strongest pitch class name (e.g. "A"), None for silence
    pub dominant_note: Option<String>,

    /// Segment length in seconds
    pub duration: f64,
}

impl SegmentFeatures {
    /// Features of a segment with no samples
    pub fn zero(duration: f64) -> Self {
        SegmentFeatures {
            rms: 0.0,
            peak: 0.0,
            zcr: 0.0,
            spectral_centroid: 0.0,
            spectral_flatness: 0.0,
            low_band_energy: 0.0,
            high_band_energy: 0.0,
            mfcc: [0.0; N_MFCC],
            chroma: [0.0; 12],
            dominant_note: None,
            duration,
        }
    }
}

/// Leading MFCC coefficients that take part in clustering
pub const CLUSTER_MFCC: usize = 4;

/// Number of dimensions in a clustering vector
pub const FEATURE_DIMS: usize = 6 + CLUSTER_MFCC;

/// Fixed-size clustering input derived from SegmentFeatures
///
/// Order: rms, spectral_centroid, spectral_flatness, zcr, low_band_energy,
/// high_band_energy, mfcc[0..4]. The same order is used for every segment of
/// a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_DIMS]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_DIMS]) -> Self {
        FeatureVector(values)
    }

    pub fn values(&self) -> &[f64; FEATURE_DIMS] {
        &self.0
    }
}

impl From<&SegmentFeatures> for FeatureVector {
    fn from(f: &SegmentFeatures) -> Self {
        let clamp = |v: f32| if v.is_finite() { v as f64 } else { 0.0 };
        FeatureVector([
            clamp(f.rms),
            clamp(f.spectral_centroid),
            clamp(f.spectral_flatness),
            clamp(f.zcr),
            clamp(f.low_band_energy),
            clamp(f.high_band_energy),
            clamp(f.mfcc[0]),
            clamp(f.mfcc[1]),
            clamp(f.mfcc[2]),
            clamp(f.mfcc[3]),
        ])
    }
}

/// A group of acoustically similar segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// Label in [0, clusters_used)
    pub label: usize,

    /// Member segment indices, ascending
    pub members: Vec<usize>,
}

impl Cluster {
    pub fn size(&self) -> usize {
        self.members.len()
    }
}

/// Run-level facts about how the pipeline behaved
///
/// Reductions of the caller's parameters (fewer clusters, fewer chops) are
/// visible here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Onset peaks found by the detector (the implicit onset at 0 is not counted)
    pub onsets_detected: usize,

    /// Segments produced by the segmenter, before representative selection
    pub segments_before_filtering: usize,

    pub clusters_requested: usize,

    /// Non-empty clusters actually formed
    pub clusters_used: usize,

    pub max_chops: usize,

    pub chops_returned: usize,

    pub sample_rate: u32,

    pub channels: usize,

    pub duration_secs: f64,

    /// SHA-256 (hex) of the input bytes or decoded samples
    pub content_hash: String,
}

/// One returned chop, independent of the engine's internal buffers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChopSummary {
    /// Deterministic identifier derived from content hash and sample range
    pub id: Uuid,

    /// Readable name, e.g. "chop_004" (segment position in the run)
    pub name: String,

    pub start: f64,

    pub end: f64,

    pub duration: f64,

    pub cluster_label: usize,

    /// Short tag such as "bright/loud/short"
    pub descriptor: String,

    /// How this chop was grouped and picked
    pub reasoning: String,

    pub features: SegmentFeatures,

    /// 16-bit PCM WAV of the chop, all original channels
    #[serde(skip)]
    pub audio: Vec<u8>,
}

/// Output of one chopping run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChopReport {
    /// Chops ordered by start time
    pub chops: Vec<ChopSummary>,

    pub metadata: RunMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_view_clamps() {
        let samples = vec![0.0, 1.0, 2.0, 3.0, 4.0];
        let segment = Segment::from_samples(0, 3, 10, 10);
        assert_eq!(segment.view(&samples), &[3.0, 4.0]);
    }

    #[test]
    fn test_segment_times_follow_samples() {
        let segment = Segment::from_samples(2, 5600, 11200, 8000);
        assert_eq!(segment.start, 0.7);
        assert_eq!(segment.end, 1.4);
        assert_eq!(segment.duration, 0.7);
        assert_eq!(segment.frame_count(), 5600);
    }

    #[test]
    fn test_feature_vector_order() {
        let mut features = SegmentFeatures::zero(1.0);
        features.rms = 0.5;
        features.spectral_centroid = 1200.0;
        features.spectral_flatness = 0.2;
        features.zcr = 0.1;
        features.low_band_energy = 0.3;
        features.high_band_energy = f32::NAN;
        features.mfcc = [
            -250.0, 12.0, -3.0, 1.5, 99.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ];

        let vector = FeatureVector::from(&features);
        assert_eq!(
            vector.values(),
            &[
                0.5,
                1200.0,
                0.2f32 as f64,
                0.1f32 as f64,
                0.3f32 as f64,
                0.0,
                -250.0,
                12.0,
                -3.0,
                1.5,
            ]
        );
    }

    #[test]
    fn test_chop_audio_not_serialized() {
        let chop = ChopSummary {
            id: Uuid::nil(),
            name: "chop_000".to_string(),
            start: 0.0,
            end: 1.0,
            duration: 1.0,
            cluster_label: 0,
            descriptor: "warm/quiet/medium".to_string(),
            reasoning: String::new(),
            features: SegmentFeatures::zero(1.0),
            audio: vec![1, 2, 3],
        };

        let json = serde_json::to_value(&chop).unwrap();
        assert!(json.get("audio").is_none());
        assert_eq!(json["name"], "chop_000");
    }
}
