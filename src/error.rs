// Engine error taxonomy
// Input errors, infeasibility errors, and the rare encoding failure

use thiserror::Error;

/// Errors surfaced by a chopping run
///
/// Degenerate-but-valid inputs (no onsets, more clusters than segments,
/// a budget larger than the segment count) are not errors; they show up as
/// reduced values in the run metadata instead.
#[derive(Debug, Error)]
pub enum ChopError {
    /// The bytes are not a supported or parseable audio container
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    /// The decoded audio contains no frames
    #[error("Decoded audio is empty")]
    EmptyAudio,

    /// No segment can satisfy the minimum duration
    #[error(
        "Cannot segment {duration:.3}s of audio: shorter than min_duration {min_duration:.3}s"
    )]
    SegmentationInfeasible { duration: f64, min_duration: f64 },

    /// A caller parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Writing a chop's audio failed
    #[error("Failed to encode chop audio: {0}")]
    Encode(String),
}

impl From<hound::Error> for ChopError {
    fn from(err: hound::Error) -> Self {
        ChopError::Decode(err.to_string())
    }
}

impl ChopError {
    /// Stable machine-readable kind, used by the CLI and in traces
    pub fn kind(&self) -> &'static str {
        match self {
            ChopError::Decode(_) => "DecodeError",
            ChopError::EmptyAudio => "EmptyAudioError",
            ChopError::SegmentationInfeasible { .. } => "SegmentationInfeasibleError",
            ChopError::InvalidParameter(_) => "InvalidParameterError",
            ChopError::Encode(_) => "EncodeError",
        }
    }
}

/// Result type alias for engine operations
pub type ChopResult<T> = Result<T, ChopError>;
