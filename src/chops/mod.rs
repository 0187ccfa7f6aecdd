// Chop module
// Segmenting, clustering, selecting, and describing chops

pub mod cluster;
pub mod descriptor;
pub mod segmenter;
pub mod select;
pub mod summary;
pub mod types;

pub use cluster::{cluster_segments, Clustering};
pub use descriptor::{describe, DescriptorRules};
pub use segmenter::{segment, SegmentPolicy};
pub use select::{select_representatives, Selection};
pub use summary::SummaryBuilder;
pub use types::{
    ChopReport, ChopSummary, Cluster, FeatureVector, RunMetadata, Segment, SegmentFeatures,
};
