//! Error types for mapping configuration and input loading
//!
//! Matching itself never fails: unmatched entities, conflicts and
//! low-confidence mappings are reported as data. Errors only come from
//! loading configuration, snapshots, or OCR text from disk.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for the mapping engine's loading surface
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Failed to parse {what}: {message}")]
    ParseError { what: String, message: String },

    #[error("Invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MappingError {
    pub fn parse(what: &str, err: impl std::fmt::Display) -> Self {
        MappingError::ParseError {
            what: what.to_string(),
            message: err.to_string(),
        }
    }

    /// Returns true if the caller can fall back to the default configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            MappingError::ConfigNotFound(_)
                | MappingError::InvalidThreshold { .. }
                | MappingError::InvalidConfig(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MappingError::ConfigNotFound(_) => {
                "Create ~/.plan-pulse/mapping.json or run with the default thresholds."
            }
            MappingError::IoError(_) => "Check file permissions and that the path exists.",
            MappingError::ParseError { .. } => "Check the file is valid JSON in the expected shape.",
            MappingError::InvalidThreshold { .. } => {
                "Thresholds must lie in [0, 1] with minSimilarity <= minMatchConfidence <= autoApplyThreshold."
            }
            MappingError::InvalidConfig(_) => "Fix the listed configuration field.",
            MappingError::InvalidInput(_) => "Re-run the OCR import and review the extracted text.",
        }
    }
}

impl From<std::io::Error> for MappingError {
    fn from(err: std::io::Error) -> Self {
        MappingError::IoError(err.to_string())
    }
}

/// Serializable error representation for the review UI
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingErrorInfo {
    pub message: String,
    pub error_type: ErrorType,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorType {
    Config,
    Io,
    Input,
}

impl From<&MappingError> for MappingErrorInfo {
    fn from(err: &MappingError) -> Self {
        let error_type = if err.is_config_error() {
            ErrorType::Config
        } else if matches!(err, MappingError::IoError(_)) {
            ErrorType::Io
        } else {
            ErrorType::Input
        };

        MappingErrorInfo {
            message: err.to_string(),
            error_type,
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
