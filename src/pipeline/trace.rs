// Chop run tracing
// Per-stage progress records, optionally persisted as an append-only JSONL file

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Stages of a chopping run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChopStage {
    Validation,
    Decode,
    OnsetDetection,
    Segmentation,
    FeatureExtraction,
    Clustering,
    Selection,
    Summary,
}

impl ChopStage {
    pub const ALL: [ChopStage; 8] = [
        ChopStage::Validation,
        ChopStage::Decode,
        ChopStage::OnsetDetection,
        ChopStage::Segmentation,
        ChopStage::FeatureExtraction,
        ChopStage::Clustering,
        ChopStage::Selection,
        ChopStage::Summary,
    ];

    /// Overall run progress once this stage has finished
    pub fn progress(&self) -> f32 {
        let position = ChopStage::ALL
            .iter()
            .position(|s| s == self)
            .unwrap_or(0);
        (position + 1) as f32 / ChopStage::ALL.len() as f32
    }
}

/// A single trace record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp of when this entry was created
    pub timestamp: String,

    pub stage: ChopStage,

    /// Overall run progress [0.0, 1.0]
    pub progress: f32,

    /// Human-readable summary of what the stage produced
    pub message: String,

    /// Optional structured data (counts, cluster sizes, run metadata)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Entry for a completed stage
    pub fn completed(stage: ChopStage, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress: stage.progress(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Append-only JSONL trace file
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter { file_path }
    }

    /// Append one entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Append several entries with a single open/flush
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        for entry in entries {
            let json_line = entry.to_json_line()?;
            file.write_all(json_line.as_bytes())?;
        }

        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_progress_is_monotonic() {
        let progress: Vec<f32> = ChopStage::ALL.iter().map(|s| s.progress()).collect();
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ChopStage::Summary.progress(), 1.0);
    }

    #[test]
    fn test_entry_with_data() {
        let entry = TraceEntry::completed(ChopStage::OnsetDetection, "Found 4 onsets")
            .with_data(serde_json::json!({ "onsets_detected": 4 }));

        assert_eq!(entry.stage, ChopStage::OnsetDetection);
        assert_eq!(entry.data.unwrap()["onsets_detected"], 4);
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let entry = TraceEntry::completed(ChopStage::FeatureExtraction, "done");
        let line = entry.to_json_line().unwrap();

        assert!(line.ends_with('\n'));
        assert!(line.contains("\"feature_extraction\""));
        assert!(!line.contains("\"data\""));
    }

    #[test]
    fn test_trace_writer_appends() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(trace_path.clone());

        writer
            .write(&TraceEntry::completed(ChopStage::Validation, "ok"))
            .unwrap();
        writer
            .write_batch(&[
                TraceEntry::completed(ChopStage::Decode, "decoded"),
                TraceEntry::completed(ChopStage::Summary, "built"),
            ])
            .unwrap();

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].stage, ChopStage::Validation);
        assert_eq!(entries[2].progress, 1.0);
        assert_eq!(writer.path(), trace_path.as_path());
    }
}
