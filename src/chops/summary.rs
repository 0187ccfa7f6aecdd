// Chop summary builder
// Materializes selected segments as self-contained ChopSummary records

use uuid::Uuid;

use crate::audio::{encode_wav_range, AudioBuffer};
use crate::chops::cluster::Clustering;
use crate::chops::descriptor::{describe, DescriptorRules};
use crate::chops::select::Selection;
use crate::chops::types::{ChopSummary, Segment, SegmentFeatures};
use crate::error::ChopResult;

/// Everything a run knows about its segments, borrowed for materialization
pub struct SummaryBuilder<'a> {
    pub buffer: &'a AudioBuffer,
    pub segments: &'a [Segment],
    pub features: &'a [SegmentFeatures],
    pub clustering: &'a Clustering,
    pub rules: &'a DescriptorRules,
    pub content_hash: &'a str,
}

impl<'a> SummaryBuilder<'a> {
    /// Build one ChopSummary per selection, keeping the selection order
    pub fn build(&self, selections: &[Selection]) -> ChopResult<Vec<ChopSummary>> {
        selections.iter().map(|s| self.build_one(s)).collect()
    }

    fn build_one(&self, selection: &Selection) -> ChopResult<ChopSummary> {
        let segment = &self.segments[selection.segment];
        let features = &self.features[selection.segment];

        let audio = encode_wav_range(self.buffer, segment.start_sample, segment.end_sample)?;
        let cluster_label = self.clustering.labels[selection.segment];
        let descriptor = describe(features, self.rules);
        let reasoning = self.reasoning(selection, features, &descriptor);

        Ok(ChopSummary {
            id: chop_id(self.content_hash, segment.start_sample, segment.end_sample),
            name: chop_name(segment.index),
            start: segment.start,
            end: segment.end,
            duration: segment.duration,
            cluster_label,
            descriptor,
            reasoning,
            features: features.clone(),
            audio,
        })
    }

    fn reasoning(
        &self,
        selection: &Selection,
        features: &SegmentFeatures,
        descriptor: &str,
    ) -> String {
        let label = self.clustering.labels[selection.segment];
        let cluster_size = self.clustering.clusters[label].size();
        let mut reason_parts = Vec::new();

        // 1. Grouping
        reason_parts.push(format!(
            "Grouped into cluster {} of {} ({} of {} segments).",
            label,
            self.clustering.clusters_used(),
            cluster_size,
            self.segments.len()
        ));

        // 2. Selection
        if cluster_size == 1 {
            reason_parts.push("Only member of its cluster.".to_string());
        } else {
            reason_parts.push(format!(
                "Ranked {} of {} by closeness to the cluster centre (distance {:.2}).",
                selection.rank,
                cluster_size,
                self.clustering.distance_to_centroid(selection.segment)
            ));
        }

        // 3. Character
        reason_parts.push(format!(
            "Sounds {}: RMS {:.3}, centroid {:.0} Hz, flatness {:.2}.",
            descriptor,
            features.rms,
            features.spectral_centroid,
            features.spectral_flatness
        ));

        if let Some(note) = &features.dominant_note {
            reason_parts.push(format!("Dominant pitch class {}.", note));
        }

        reason_parts.join(" ")
    }
}

/// Stable identifier for a sample range of a given input
pub fn chop_id(content_hash: &str, start_sample: usize, end_sample: usize) -> Uuid {
    let key = format!("{}:{}:{}", content_hash, start_sample, end_sample);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

/// `chop_004` for the segment at position 4
pub fn chop_name(segment_index: usize) -> String {
    format!("chop_{:03}", segment_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chops::cluster::cluster_segments;
    use crate::chops::select::select_representatives;
    use crate::chops::types::FeatureVector;

    const SR: u32 = 1000;

    fn fixture() -> (AudioBuffer, Vec<Segment>, Vec<SegmentFeatures>) {
        let samples: Vec<f32> = (0..3000)
            .map(|i| if i < 1000 { 0.5 } else { 0.05 })
            .collect();
        let buffer = AudioBuffer::new(SR, vec![samples]).unwrap();

        let segments: Vec<Segment> = (0..3)
            .map(|i| Segment::from_samples(i, i * 1000, (i + 1) * 1000, SR))
            .collect();

        let features = vec![
            SegmentFeatures {
                rms: 0.5,
                spectral_centroid: 300.0,
                dominant_note: Some("A".to_string()),
                ..SegmentFeatures::zero(1.0)
            },
            SegmentFeatures {
                rms: 0.05,
                spectral_centroid: 3000.0,
                ..SegmentFeatures::zero(1.0)
            },
            SegmentFeatures {
                rms: 0.05,
                spectral_centroid: 3100.0,
                ..SegmentFeatures::zero(1.0)
            },
        ];

        (buffer, segments, features)
    }

    #[test]
    fn test_build_summaries() {
        let (buffer, segments, features) = fixture();
        let vectors: Vec<FeatureVector> = features.iter().map(FeatureVector::from).collect();
        let clustering = cluster_segments(&vectors, 2, 100);
        let selections = select_representatives(&clustering, 3);
        let rules = DescriptorRules::default();

        let builder = SummaryBuilder {
            buffer: &buffer,
            segments: &segments,
            features: &features,
            clustering: &clustering,
            rules: &rules,
            content_hash: "abc",
        };
        let chops = builder.build(&selections).unwrap();

        assert_eq!(chops.len(), 3);
        assert_eq!(chops[0].name, "chop_000");
        assert_eq!(chops[0].descriptor, "dark/loud/medium");
        assert_eq!(chops[1].descriptor, "bright/medium/medium");
        assert!(chops[0].reasoning.contains("Dominant pitch class A"));
        assert!(chops[0].reasoning.contains("Only member"));
        assert_eq!(chops[1].cluster_label, chops[2].cluster_label);
        assert_ne!(chops[0].cluster_label, chops[1].cluster_label);

        let decoded = crate::audio::decode_audio(&chops[0].audio, None).unwrap();
        assert_eq!(decoded.frame_count(), 1000);
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_selection_must_index_a_segment() {
        let (buffer, segments, features) = fixture();
        let vectors: Vec<FeatureVector> = features.iter().map(FeatureVector::from).collect();
        let clustering = cluster_segments(&vectors, 2, 100);
        let rules = DescriptorRules::default();

        let builder = SummaryBuilder {
            buffer: &buffer,
            segments: &segments,
            features: &features,
            clustering: &clustering,
            rules: &rules,
            content_hash: "abc",
        };
        let _ = builder.build(&[Selection {
            segment: 7,
            rank: 1,
        }]);
    }

    #[test]
    fn test_chop_ids_are_deterministic() {
        assert_eq!(chop_id("abc", 0, 100), chop_id("abc", 0, 100));
        assert_ne!(chop_id("abc", 0, 100), chop_id("abc", 0, 101));
        assert_ne!(chop_id("abc", 0, 100), chop_id("abd", 0, 100));
    }

    #[test]
    fn test_chop_name_padding() {
        assert_eq!(chop_name(4), "chop_004");
        assert_eq!(chop_name(1234), "chop_1234");
    }
}
