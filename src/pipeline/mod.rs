// Pipeline execution and monitoring module
// Runs the full decode-to-chops pipeline and records per-stage traces

pub mod engine;
pub mod trace;

pub use engine::{ChopEngine, ChopInput};
pub use trace::{read_trace_file, ChopStage, TraceEntry, TraceError, TraceWriter};
