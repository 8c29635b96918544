//! Reconciles OCR-extracted entities against existing planning records.
//!
//! Pipeline: candidate matching (similarity-scored) → conflict detection →
//! aggregation into a `MappingResult`. Everything here is pure: inputs are
//! borrowed snapshots, outputs are fresh values, and nothing is cached.
//!
//! Confidence tiers:
//! - `>= autoApplyThreshold` (0.8) without medium/high conflict: counted as
//!   auto-apply; the updater only writes those with no conflict at all
//! - `minMatchConfidence`..`autoApplyThreshold` (0.5–0.8): mapped, needs review
//! - below `minMatchConfidence`: left unmapped

pub mod aggregate;
pub mod candidates;
pub mod conflict;
pub mod similarity;

use serde::{Deserialize, Serialize};

use crate::config::MappingConfig;
use crate::entity::RecordType;
use crate::ocr::{ExtractedEntity, ExtractionResult};
use crate::types::PlanningSnapshot;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Severity of disagreement between an extracted entity and its record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl ConflictLevel {
    /// Medium and high conflicts block automatic application.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ConflictLevel::Medium | ConflictLevel::High)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictLevel::None => "none",
            ConflictLevel::Low => "low",
            ConflictLevel::Medium => "medium",
            ConflictLevel::High => "high",
        }
    }
}

/// Links one extracted entity to one existing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMapping {
    pub extracted_entity_id: String,
    pub existing_entity_id: String,
    pub existing_entity_type: RecordType,
    pub match_confidence: f64,
    pub mapping_reason: String,
    #[serde(default)]
    pub conflict_level: ConflictLevel,
}

impl EntityMapping {
    /// Confident enough and conflict-free enough to apply without review.
    pub fn is_auto_applicable(&self, config: &MappingConfig) -> bool {
        config.is_auto_apply(self.match_confidence) && !self.conflict_level.is_blocking()
    }

    pub fn requires_review(&self, config: &MappingConfig) -> bool {
        !config.is_auto_apply(self.match_confidence) || self.conflict_level.is_blocking()
    }

    /// Whether the updater may write this mapping. Stricter than
    /// `is_auto_applicable`: any recorded conflict, even low, leaves the
    /// record untouched.
    pub fn is_applicable_update(&self, config: &MappingConfig) -> bool {
        config.is_auto_apply(self.match_confidence) && self.conflict_level == ConflictLevel::None
    }
}

/// A field on which an extracted entity disagrees with its matched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub extracted_entity_id: String,
    pub existing_entity_id: String,
    pub existing_entity_type: RecordType,
    pub field: String,
    pub existing_value: String,
    pub extracted_value: String,
    pub conflict_level: ConflictLevel,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub auto_apply_count: usize,
    pub requires_review_count: usize,
    pub suggested_actions: Vec<String>,
}

/// Sole output of the matching phase and sole input to the update phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingResult {
    pub mappings: Vec<EntityMapping>,
    pub unmapped_entities: Vec<ExtractedEntity>,
    pub conflicts: Vec<Conflict>,
    pub recommendations: Recommendations,
}

// ---------------------------------------------------------------------------
// Top-level API
// ---------------------------------------------------------------------------

/// Matching engine bound to a set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct EntityMapper {
    config: MappingConfig,
}

impl EntityMapper {
    pub fn new(config: MappingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    /// Map every extracted entity onto the best existing record, detect
    /// conflicts, and summarize what can be applied automatically.
    pub fn map(&self, extraction: &ExtractionResult, snapshot: &PlanningSnapshot) -> MappingResult {
        let (mut mappings, unmapped) =
            candidates::match_entities(&extraction.entities, snapshot, &self.config);

        let mut conflicts = Vec::new();
        for mapping in &mut mappings {
            let Some(entity) = extraction.entity(&mapping.extracted_entity_id) else {
                continue;
            };
            if let Some(found) = conflict::detect_conflict(mapping, entity, snapshot) {
                mapping.conflict_level = found.conflict_level;
                conflicts.push(found);
            }
        }

        let result = aggregate::aggregate(mappings, unmapped, conflicts, &self.config);
        log::info!(
            "Mapped {} of {} OCR entities ({} auto-apply, {} need review, {} conflicts)",
            result.mappings.len(),
            extraction.entities.len(),
            result.recommendations.auto_apply_count,
            result.recommendations.requires_review_count,
            result.conflicts.len()
        );
        result
    }

    /// Apply the auto-applicable mappings of `result` to the snapshot.
    pub fn generate_updates<'a>(
        &self,
        result: &MappingResult,
        extraction: &ExtractionResult,
        snapshot: &'a PlanningSnapshot,
    ) -> crate::updates::ContextUpdatePlan<'a> {
        crate::updates::generate_updates_with_config(result, extraction, snapshot, &self.config)
    }
}

/// Map extracted entities using the default thresholds.
pub fn map_extracted_entities_to_existing(
    extraction: &ExtractionResult,
    snapshot: &PlanningSnapshot,
) -> MappingResult {
    EntityMapper::default().map(extraction, snapshot)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::ocr::{EntityKind, MilestoneProgress, RagStatus};
    use crate::types::{ProjectStatus, RiskLevel};

    #[test]
    fn test_exact_project_match_without_conflict() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::InProgress)],
            ..Default::default()
        };
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Green)]);

        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings.len(), 1);
        let mapping = &result.mappings[0];
        assert_eq!(mapping.existing_entity_id, "proj-1");
        assert_eq!(mapping.existing_entity_type, RecordType::Project);
        assert!(mapping.match_confidence >= 0.9);
        assert_eq!(mapping.conflict_level, ConflictLevel::None);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.recommendations.auto_apply_count, 1);
    }

    #[test]
    fn test_exact_match_wins_over_substring_candidate() {
        let snapshot = PlanningSnapshot {
            projects: vec![
                project("proj-1", "Alpha", ProjectStatus::Active),
                project("proj-2", "Alpha Project", ProjectStatus::Active),
            ],
            ..Default::default()
        };
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Green)]);

        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].existing_entity_id, "proj-2");
        assert_eq!(result.mappings[0].match_confidence, 1.0);
    }

    #[test]
    fn test_completed_project_reported_red_is_high_conflict() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Completed)],
            ..Default::default()
        };
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Red)]);

        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].conflict_level, ConflictLevel::High);
        assert_eq!(result.mappings[0].conflict_level, ConflictLevel::High);
        assert_eq!(result.recommendations.auto_apply_count, 0);
        assert_eq!(result.recommendations.requires_review_count, 1);
    }

    #[test]
    fn test_empty_snapshot_leaves_everything_unmapped() {
        let extraction = extraction(vec![
            status_entity("ps-1", "Alpha Project", RagStatus::Green),
            risk_entity("risk-1", "Vendor delay", Some("Alpha Project")),
            team_entity("team-1", "Platform", Some(80.0)),
            entity(
                "note-1",
                EntityKind::Commentary {
                    section: None,
                    content: "next review in April".to_string(),
                },
            ),
        ]);

        let result = map_extracted_entities_to_existing(&extraction, &PlanningSnapshot::default());
        assert!(result.mappings.is_empty());
        assert!(result.conflicts.is_empty());
        assert_eq!(result.unmapped_entities.len(), extraction.entities.len());
    }

    #[test]
    fn test_empty_extraction_yields_empty_result() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            ..Default::default()
        };
        let result = map_extracted_entities_to_existing(&extraction(vec![]), &snapshot);
        assert!(result.mappings.is_empty());
        assert!(result.unmapped_entities.is_empty());
        assert!(result.conflicts.is_empty());
        assert!(result.recommendations.suggested_actions.is_empty());
    }

    #[test]
    fn test_mapping_preserves_input_order() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            milestones: vec![milestone("ms-1", "proj-1", "Beta launch", Some(date(2026, 4, 1)))],
            teams: vec![team("team-a", "Platform")],
            ..Default::default()
        };
        let extraction = extraction(vec![
            team_entity("team-1", "Platform", None),
            milestone_entity(
                "ms-1",
                "Beta launch",
                Some("Alpha Project"),
                Some(date(2026, 4, 1)),
                None,
                MilestoneProgress::OnTrack,
            ),
            status_entity("ps-1", "Alpha Project", RagStatus::Green),
        ]);

        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let ids: Vec<&str> = result
            .mappings
            .iter()
            .map(|m| m.extracted_entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["team-1", "ms-1", "ps-1"]);
    }

    #[test]
    fn test_custom_threshold_moves_mapping_to_review() {
        let config = MappingConfig {
            auto_apply_threshold: 0.99,
            ..MappingConfig::default()
        };
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            ..Default::default()
        };
        let extraction = extraction(vec![status_entity("ps-1", "alpha project", RagStatus::Green)]);

        let result = EntityMapper::new(config).map(&extraction, &snapshot);
        assert_eq!(result.mappings[0].match_confidence, 0.95);
        assert_eq!(result.recommendations.auto_apply_count, 0);
        assert_eq!(result.recommendations.requires_review_count, 1);
    }

    #[test]
    fn test_mapping_result_serializes_camel_case() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            ..Default::default()
        };
        let extraction = extraction(vec![risk_entity("risk-1", "Vendor delay", None)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("unmappedEntities").is_some());
        assert_eq!(json["unmappedEntities"][0]["type"], "risk");
        assert_eq!(json["unmappedEntities"][0]["impact"], serde_json::json!(RiskLevel::High));
        assert_eq!(json["recommendations"]["autoApplyCount"], 0);
    }
}
