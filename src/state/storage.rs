// File system operations for writing a chopping run to disk
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::chops::{ChopReport, ChopSummary, SegmentFeatures};

pub const CHOPS_METADATA_FILE: &str = "chops_metadata.json";
pub const RUN_METADATA_FILE: &str = "run_metadata.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A file written by `write_run`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub sha256: String,
}

/// Per-chop entry of chops_metadata.json
#[derive(Debug, Serialize)]
struct ChopFileEntry<'a> {
    id: String,
    file_path: String,
    start: f64,
    end: f64,
    duration: f64,
    cluster_label: usize,
    descriptor: &'a str,
    reasoning: &'a str,
    features: &'a SegmentFeatures,
}

impl<'a> ChopFileEntry<'a> {
    fn new(chop: &'a ChopSummary, file_path: &Path) -> Self {
        ChopFileEntry {
            id: chop.id.to_string(),
            file_path: file_path.display().to_string(),
            start: chop.start,
            end: chop.end,
            duration: chop.duration,
            cluster_label: chop.cluster_label,
            descriptor: &chop.descriptor,
            reasoning: &chop.reasoning,
            features: &chop.features,
        }
    }
}

/// Write every chop as `<name>.wav` plus the two metadata files
///
/// Creates `dir` if needed and overwrites files of the same name.
/// Returns the written files in order: chops, chops metadata, run metadata.
pub fn write_run(dir: &Path, report: &ChopReport) -> StorageResult<Vec<StoredFile>> {
    fs::create_dir_all(dir)?;

    let mut stored = Vec::with_capacity(report.chops.len() + 2);
    let mut entries = BTreeMap::new();

    for chop in &report.chops {
        let file = store_file(dir, &format!("{}.wav", chop.name), &chop.audio)?;
        entries.insert(chop.name.as_str(), ChopFileEntry::new(chop, &file.path));
        stored.push(file);
    }

    let chops_json = serde_json::to_vec_pretty(&entries)?;
    stored.push(store_file(dir, CHOPS_METADATA_FILE, &chops_json)?);

    let run_json = serde_json::to_vec_pretty(&report.metadata)?;
    stored.push(store_file(dir, RUN_METADATA_FILE, &run_json)?);

    log::info!("Wrote {} chops to {}", report.chops.len(), dir.display());

    Ok(stored)
}

/// Store a file and return its path and SHA256 hash
pub fn store_file(dir: &Path, filename: &str, data: &[u8]) -> StorageResult<StoredFile> {
    let path = dir.join(filename);
    let mut file = fs::File::create(&path)?;
    file.write_all(data)?;

    Ok(StoredFile {
        path,
        sha256: calculate_sha256(data),
    })
}

/// Calculate SHA256 hash of data
pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
