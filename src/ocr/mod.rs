//! Entities extracted from OCR'd steering-committee documents.
//!
//! An `ExtractionResult` is produced once per imported document and never
//! mutated afterwards. Each entity carries the raw text span it came from
//! plus the typed fields the matcher compares against planning records.

pub mod extract;

use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MappingError;
use crate::types::RiskLevel;

pub use extract::extract_entities;

/// Red/Amber/Green health indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Red,
    Amber,
    Green,
}

impl RagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RagStatus::Red => "red",
            RagStatus::Amber => "amber",
            RagStatus::Green => "green",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "red" => Some(RagStatus::Red),
            "amber" | "yellow" => Some(RagStatus::Amber),
            "green" => Some(RagStatus::Green),
            _ => None,
        }
    }
}

/// Milestone progress as reported in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneProgress {
    OnTrack,
    AtRisk,
    Delayed,
    Completed,
}

impl MilestoneProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneProgress::OnTrack => "on-track",
            MilestoneProgress::AtRisk => "at-risk",
            MilestoneProgress::Delayed => "delayed",
            MilestoneProgress::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match key.as_str() {
            "ontrack" => Some(MilestoneProgress::OnTrack),
            "atrisk" => Some(MilestoneProgress::AtRisk),
            "delayed" | "late" => Some(MilestoneProgress::Delayed),
            "completed" | "complete" | "done" => Some(MilestoneProgress::Completed),
            _ => None,
        }
    }
}

/// Type-specific payload of an extracted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntityKind {
    #[serde(rename_all = "camelCase")]
    ProjectStatus {
        project_name: String,
        status: RagStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status_reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Risk {
        description: String,
        impact: RiskLevel,
        probability: RiskLevel,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mitigation: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_name: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Milestone {
        milestone_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_date: Option<NaiveDate>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_date: Option<NaiveDate>,
        status: MilestoneProgress,
    },
    #[serde(rename_all = "camelCase")]
    TeamUpdate {
        team_name: String,
        update: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        utilization: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Financial {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_name: Option<String>,
        category: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        budget_amount: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actual_amount: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    Commentary {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section: Option<String>,
        content: String,
    },
}

impl EntityKind {
    /// Short label for logs and suggested actions.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::ProjectStatus { .. } => "project status",
            EntityKind::Risk { .. } => "risk",
            EntityKind::Milestone { .. } => "milestone",
            EntityKind::TeamUpdate { .. } => "team update",
            EntityKind::Financial { .. } => "financial",
            EntityKind::Commentary { .. } => "commentary",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEntity {
    pub id: String,
    /// Raw text span the entity was read from.
    pub text: String,
    /// Extraction confidence (0.0–1.0).
    pub confidence: f64,
    #[serde(flatten)]
    pub kind: EntityKind,
}

impl ExtractedEntity {
    pub fn is_risk(&self) -> bool {
        matches!(self.kind, EntityKind::Risk { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default)]
    pub raw_text: String,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub entities: Vec<ExtractedEntity>,
}

impl ExtractionResult {
    pub fn entity(&self, id: &str) -> Option<&ExtractedEntity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Read OCR output from disk. Blank files are rejected.
pub fn load_report(path: &Path) -> Result<String, MappingError> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(MappingError::InvalidInput(format!(
            "OCR report {} contains no text",
            path.display()
        )));
    }
    Ok(text)
}
