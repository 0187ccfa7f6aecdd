// Chopshop - Onset-driven audio chopping and clustering
// Module declarations

pub mod audio;
pub mod chops;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod state;

pub use audio::{decode_audio, AudioBuffer};
pub use chops::{ChopReport, ChopSummary, RunMetadata};
pub use config::{load_config, ChopParams, ConfigError, EngineConfig};
pub use error::{ChopError, ChopResult};
pub use pipeline::{ChopEngine, ChopInput, TraceEntry, TraceWriter};
