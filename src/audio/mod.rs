// Audio processing module
// Decoding, onset detection, spectral features, and chop encoding

pub mod encode;
pub mod features;
pub mod ingest;
pub mod mfcc;
pub mod onset;

pub use encode::encode_wav_range;
pub use features::{FeatureConfig, FeatureExtractor};
pub use ingest::{decode_audio, AudioBuffer, SourceFormat};
pub use onset::{detect_onsets, OnsetConfig, OnsetSet};
