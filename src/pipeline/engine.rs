// Chop engine
// The public operation: audio in, ordered representative chops out

use rayon::prelude::*;

use crate::audio::{decode_audio, detect_onsets, AudioBuffer, FeatureExtractor};
use crate::chops::{
    cluster_segments, segment, select_representatives, ChopReport, FeatureVector, RunMetadata,
    SegmentPolicy, SummaryBuilder,
};
use crate::config::{ChopParams, ConfigError, EngineConfig};
use crate::error::{ChopError, ChopResult};
use crate::pipeline::trace::{ChopStage, TraceEntry};
use crate::state::storage::calculate_sha256;

/// Audio handed to the engine
pub enum ChopInput<'a> {
    /// Encoded file contents; the hint is a file extension such as "mp3"
    Bytes {
        data: &'a [u8],
        format_hint: Option<&'a str>,
    },

    /// Already-decoded audio
    Buffer(&'a AudioBuffer),
}

/// Stateless chopping engine
///
/// Holds only analysis configuration; every call owns its own buffers, so one
/// engine can serve concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct ChopEngine {
    config: EngineConfig,
}

impl ChopEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(ChopEngine { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Segment, cluster, and select representative chops
    ///
    /// Parameters are validated before the audio is touched. Either the full
    /// chop list is returned or a specific error kind.
    pub fn chop(&self, input: ChopInput<'_>, params: &ChopParams) -> ChopResult<ChopReport> {
        self.run(input, params, None)
    }

    /// Same as [`chop`](Self::chop), appending one trace entry per completed stage
    pub fn chop_traced(
        &self,
        input: ChopInput<'_>,
        params: &ChopParams,
        trace: &mut Vec<TraceEntry>,
    ) -> ChopResult<ChopReport> {
        self.run(input, params, Some(trace))
    }

    fn run(
        &self,
        input: ChopInput<'_>,
        params: &ChopParams,
        mut trace: Option<&mut Vec<TraceEntry>>,
    ) -> ChopResult<ChopReport> {
        // 1. Parameters
        params.validate()?;
        record(&mut trace, || {
            TraceEntry::completed(ChopStage::Validation, "Parameters accepted")
                .with_data(serde_json::json!(params))
        });

        // 2. Decode
        let decoded;
        let (buffer, content_hash) = match input {
            ChopInput::Bytes { data, format_hint } => {
                decoded = decode_audio(data, format_hint)?;
                (&decoded, calculate_sha256(data))
            }
            ChopInput::Buffer(buffer) => (buffer, calculate_sha256(&buffer.sample_bytes())),
        };

        if buffer.frame_count() == 0 {
            return Err(ChopError::EmptyAudio);
        }

        let sample_rate = buffer.sample_rate();
        let duration = buffer.duration_secs();
        log::info!(
            "Loaded {:.2}s of audio ({} Hz, {} channels, {:?})",
            duration,
            sample_rate,
            buffer.channel_count(),
            buffer.source_format()
        );
        record(&mut trace, || {
            TraceEntry::completed(ChopStage::Decode, format!("Loaded {:.2}s of audio", duration))
                .with_data(serde_json::json!({
                    "sample_rate": sample_rate,
                    "channels": buffer.channel_count(),
                    "frames": buffer.frame_count(),
                    "content_hash": content_hash,
                }))
        });

        let mono = buffer.to_mono();

        // 3. Onsets
        let onsets = detect_onsets(&mono, sample_rate, &self.config.onset);
        log::info!("Detected {} onsets", onsets.detected());
        record(&mut trace, || {
            TraceEntry::completed(
                ChopStage::OnsetDetection,
                format!("Detected {} onsets", onsets.detected()),
            )
            .with_data(serde_json::json!({ "onset_times": onsets.times() }))
        });

        // 4. Segments
        let policy = SegmentPolicy {
            default_length: params.default_length,
            min_duration: params.min_duration,
            split_factor: self.config.segmentation.split_factor,
        };
        let segments = segment(&onsets, sample_rate, buffer.frame_count(), &policy)?;
        log::info!("Segmented into {} segments", segments.len());
        record(&mut trace, || {
            TraceEntry::completed(
                ChopStage::Segmentation,
                format!("Segmented into {} segments", segments.len()),
            )
        });

        // 5. Features
        let extractor = FeatureExtractor::new(&self.config.features, sample_rate);
        let features = extractor.extract_all(&mono, &segments);
        let vectors: Vec<FeatureVector> = features.par_iter().map(FeatureVector::from).collect();
        log::info!("Extracted features for {} segments", features.len());
        record(&mut trace, || {
            TraceEntry::completed(
                ChopStage::FeatureExtraction,
                format!("Extracted features for {} segments", features.len()),
            )
        });

        // 6. Clusters
        let clustering = cluster_segments(
            &vectors,
            params.n_clusters,
            self.config.clustering.max_iterations,
        );
        if clustering.clusters_used() < params.n_clusters {
            log::debug!(
                "Requested {} clusters, formed {}",
                params.n_clusters,
                clustering.clusters_used()
            );
        }
        log::info!(
            "Formed {} clusters in {} iterations",
            clustering.clusters_used(),
            clustering.iterations
        );
        record(&mut trace, || {
            let sizes: Vec<usize> = clustering.clusters.iter().map(|c| c.size()).collect();
            TraceEntry::completed(
                ChopStage::Clustering,
                format!("Formed {} clusters", clustering.clusters_used()),
            )
            .with_data(serde_json::json!({
                "requested": params.n_clusters,
                "cluster_sizes": sizes,
                "iterations": clustering.iterations,
            }))
        });

        // 7. Representatives
        let selections = select_representatives(&clustering, params.max_chops);
        log::info!("Selected {} chops", selections.len());
        record(&mut trace, || {
            TraceEntry::completed(
                ChopStage::Selection,
                format!("Selected {} of {} segments", selections.len(), segments.len()),
            )
        });

        // 8. Summaries
        let builder = SummaryBuilder {
            buffer,
            segments: &segments,
            features: &features,
            clustering: &clustering,
            rules: &self.config.descriptor,
            content_hash: &content_hash,
        };
        let chops = builder.build(&selections)?;

        let metadata = RunMetadata {
            onsets_detected: onsets.detected(),
            segments_before_filtering: segments.len(),
            clusters_requested: params.n_clusters,
            clusters_used: clustering.clusters_used(),
            max_chops: params.max_chops,
            chops_returned: chops.len(),
            sample_rate,
            channels: buffer.channel_count(),
            duration_secs: duration,
            content_hash,
        };

        log::info!(
            "Chopping complete: {} chops from {} segments",
            metadata.chops_returned,
            metadata.segments_before_filtering
        );
        record(&mut trace, || {
            TraceEntry::completed(ChopStage::Summary, format!("Built {} chops", chops.len()))
                .with_data(serde_json::json!(metadata))
        });

        Ok(ChopReport { chops, metadata })
    }
}

fn record(trace: &mut Option<&mut Vec<TraceEntry>>, entry: impl FnOnce() -> TraceEntry) {
    if let Some(entries) = trace.as_deref_mut() {
        entries.push(entry());
    }
}
