// Run parameters and analysis tuning
// ChopParams are the four caller-facing knobs; EngineConfig holds the detector/extractor settings

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::audio::{FeatureConfig, OnsetConfig};
use crate::chops::DescriptorRules;
use crate::error::{ChopError, ChopResult};

/// Caller parameters for one chopping run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChopParams {
    /// Target segment length (seconds) when onset segmentation under- or over-shoots
    /// Must be finite and > 0
    pub default_length: f64,

    /// Floor (seconds) below which adjacent segments are merged
    /// Must be finite and > 0; should be < default_length
    pub min_duration: f64,

    /// Requested number of clusters, >= 1
    pub n_clusters: usize,

    /// Maximum number of chops to return, >= 1
    pub max_chops: usize,
}

impl Default for ChopParams {
    fn default() -> Self {
        ChopParams {
            default_length: 1.8,
            min_duration: 0.2,
            n_clusters: 6,
            max_chops: 16,
        }
    }
}

impl ChopParams {
    pub fn new(
        default_length: f64,
        min_duration: f64,
        n_clusters: usize,
        max_chops: usize,
    ) -> Self {
        ChopParams {
            default_length,
            min_duration,
            n_clusters,
            max_chops,
        }
    }

    /// Reject out-of-range parameters before any audio work starts
    pub fn validate(&self) -> ChopResult<()> {
        if !self.default_length.is_finite() || self.default_length <= 0.0 {
            return Err(ChopError::InvalidParameter(format!(
                "default_length must be a positive number of seconds, got {}",
                self.default_length
            )));
        }
        if !self.min_duration.is_finite() || self.min_duration <= 0.0 {
            return Err(ChopError::InvalidParameter(format!(
                "min_duration must be a positive number of seconds, got {}",
                self.min_duration
            )));
        }
        if self.n_clusters < 1 {
            return Err(ChopError::InvalidParameter(
                "n_clusters must be at least 1".to_string(),
            ));
        }
        if self.max_chops < 1 {
            return Err(ChopError::InvalidParameter(
                "max_chops must be at least 1".to_string(),
            ));
        }
        if self.min_duration > self.default_length {
            log::warn!(
                "min_duration {:.3}s exceeds default_length {:.3}s; fixed windows will use min_duration",
                self.min_duration,
                self.default_length
            );
        }
        Ok(())
    }
}

/// Segmenter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Intervals longer than split_factor * default_length are subdivided
    pub split_factor: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        SegmentationConfig { split_factor: 2.0 }
    }
}

/// Clusterer tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Refinement stops here even if assignments are still changing
    pub max_iterations: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        ClusteringConfig { max_iterations: 100 }
    }
}

/// Complete analysis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub onset: OnsetConfig,
    pub features: FeatureConfig,
    pub segmentation: SegmentationConfig,
    pub clustering: ClusteringConfig,
    pub descriptor: DescriptorRules,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_window("onset.window_size", self.onset.window_size, self.onset.hop_size)?;
        check_window(
            "features.window_size",
            self.features.window_size,
            self.features.hop_size,
        )?;

        if !self.onset.delta.is_finite() || self.onset.delta < 0.0 {
            return Err(ConfigError::Invalid(
                "onset.delta must be a non-negative number".to_string(),
            ));
        }
        if !self.segmentation.split_factor.is_finite() || self.segmentation.split_factor < 1.0 {
            return Err(ConfigError::Invalid(
                "segmentation.split_factor must be >= 1".to_string(),
            ));
        }
        if self.clustering.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "clustering.max_iterations must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_window(name: &str, window_size: usize, hop_size: usize) -> Result<(), ConfigError> {
    if window_size == 0 || !window_size.is_power_of_two() {
        return Err(ConfigError::Invalid(format!(
            "{} must be a power of two, got {}",
            name, window_size
        )));
    }
    if hop_size == 0 || hop_size > window_size {
        return Err(ConfigError::Invalid(format!(
            "hop size for {} must be in 1..={}, got {}",
            name, window_size, hop_size
        )));
    }
    Ok(())
}

/// Load an engine configuration from a JSON file
/// Missing fields fall back to defaults
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
