//! Mapping thresholds and the RAG → project status table.
//!
//! Stored in `~/.plan-pulse/mapping.json`. Every field has a default, so an
//! empty object (or no file at all) yields the stock thresholds.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::ocr::RagStatus;
use crate::types::ProjectStatus;

/// Source tag stamped on risks synthesized from OCR imports.
pub const DEFAULT_RISK_SOURCE: &str = "steering-committee-ocr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingConfig {
    /// Best candidate must score at least this to be mapped.
    #[serde(default = "default_min_match_confidence")]
    pub min_match_confidence: f64,
    /// Mappings at or above this (and without medium/high conflict) apply
    /// without review.
    #[serde(default = "default_auto_apply_threshold")]
    pub auto_apply_threshold: f64,
    /// Edit-distance similarities below this clamp to zero.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
    #[serde(default)]
    pub rag_status_map: RagStatusMap,
    #[serde(default = "default_risk_source")]
    pub risk_source: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            min_match_confidence: default_min_match_confidence(),
            auto_apply_threshold: default_auto_apply_threshold(),
            min_similarity: default_min_similarity(),
            rag_status_map: RagStatusMap::default(),
            risk_source: default_risk_source(),
        }
    }
}

fn default_min_match_confidence() -> f64 {
    0.5
}

fn default_auto_apply_threshold() -> f64 {
    0.8
}

fn default_min_similarity() -> f64 {
    0.3
}

fn default_risk_source() -> String {
    DEFAULT_RISK_SOURCE.to_string()
}

/// Project status written when a RAG colour is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagStatusMap {
    #[serde(default = "default_green")]
    pub green: ProjectStatus,
    #[serde(default = "default_amber")]
    pub amber: ProjectStatus,
    #[serde(default = "default_red")]
    pub red: ProjectStatus,
}

impl Default for RagStatusMap {
    fn default() -> Self {
        Self {
            green: default_green(),
            amber: default_amber(),
            red: default_red(),
        }
    }
}

fn default_green() -> ProjectStatus {
    ProjectStatus::InProgress
}

fn default_amber() -> ProjectStatus {
    ProjectStatus::InProgress
}

fn default_red() -> ProjectStatus {
    ProjectStatus::AtRisk
}

impl RagStatusMap {
    pub fn status_for(&self, rag: RagStatus) -> ProjectStatus {
        match rag {
            RagStatus::Green => self.green,
            RagStatus::Amber => self.amber,
            RagStatus::Red => self.red,
        }
    }
}

impl MappingConfig {
    /// True when a mapping at this confidence may be applied unreviewed.
    pub fn is_auto_apply(&self, confidence: f64) -> bool {
        confidence >= self.auto_apply_threshold
    }
}

/// Check threshold ranges and ordering.
pub fn validate_config(config: &MappingConfig) -> Result<(), MappingError> {
    let thresholds = [
        ("minSimilarity", config.min_similarity),
        ("minMatchConfidence", config.min_match_confidence),
        ("autoApplyThreshold", config.auto_apply_threshold),
    ];
    for (name, value) in thresholds {
        if !(0.0..=1.0).contains(&value) {
            return Err(MappingError::InvalidThreshold { name, value });
        }
    }
    if config.min_similarity > config.min_match_confidence {
        return Err(MappingError::InvalidThreshold {
            name: "minSimilarity",
            value: config.min_similarity,
        });
    }
    if config.min_match_confidence > config.auto_apply_threshold {
        return Err(MappingError::InvalidThreshold {
            name: "minMatchConfidence",
            value: config.min_match_confidence,
        });
    }
    if config.risk_source.trim().is_empty() {
        return Err(MappingError::InvalidConfig(
            "riskSource must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Default location: `~/.plan-pulse/mapping.json`.
pub fn default_config_path() -> Result<PathBuf, MappingError> {
    let home = dirs::home_dir()
        .ok_or_else(|| MappingError::InvalidConfig("Could not find home directory".into()))?;
    Ok(home.join(".plan-pulse").join("mapping.json"))
}

/// Load and validate a mapping config from a JSON file.
pub fn load_config(path: &Path) -> Result<MappingConfig, MappingError> {
    if !path.exists() {
        return Err(MappingError::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path)?;
    let config: MappingConfig =
        serde_json::from_str(&content).map_err(|e| MappingError::parse("mapping config", e))?;

    validate_config(&config)?;
    Ok(config)
}

/// Load `~/.plan-pulse/mapping.json`, falling back to defaults when the
/// file does not exist. A file that exists but is invalid is still an error.
pub fn load_default_config() -> Result<MappingConfig, MappingError> {
    let path = default_config_path()?;
    match load_config(&path) {
        Ok(config) => Ok(config),
        Err(MappingError::ConfigNotFound(_)) => {
            log::debug!("No mapping config at {}, using defaults", path.display());
            Ok(MappingConfig::default())
        }
        Err(e) => Err(e),
    }
}
