//! Turns a confirmed `MappingResult` into patched planning collections.
//!
//! Only mappings at or above the auto-apply threshold with no recorded
//! conflict are applied; even a low conflict leaves the record for
//! review. Untouched records are
//! returned as `Cow::Borrowed` from the caller's snapshot so "nothing
//! changed here" is a pointer check, and collection order and length are
//! always preserved.
//!
//! The update is deterministic: timestamps come from the extraction's
//! `processedAt` and synthesized risk ids are content hashes, so applying
//! the same result twice yields equal plans.

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::MappingConfig;
use crate::entity::RecordType;
use crate::matching::candidates::{best_candidate, Candidate};
use crate::matching::{EntityMapping, MappingResult};
use crate::ocr::{EntityKind, ExtractedEntity, ExtractionResult, MilestoneProgress, RagStatus};
use crate::types::{
    Epic, EpicStatus, Milestone, MilestoneStatus, Person, PlanningSnapshot, Project, Risk,
};

// =============================================================================
// Output types
// =============================================================================

/// Informational team update; teams themselves are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamNote {
    pub team_id: String,
    pub team_name: String,
    pub update: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_utilization: Option<f64>,
    /// Sum of the team's recorded allocation percentages.
    pub allocated_percentage: f64,
}

/// One applied patch, in application order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChange {
    pub record_type: RecordType,
    pub record_id: String,
    pub extracted_entity_id: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUpdatePlan<'a> {
    pub projects: Vec<Cow<'a, Project>>,
    pub epics: Vec<Cow<'a, Epic>>,
    pub milestones: Vec<Cow<'a, Milestone>>,
    pub new_risks: Vec<Risk>,
    pub team_notes: Vec<TeamNote>,
    pub changes: Vec<AppliedChange>,
}

fn owned_only<'b, T: Clone>(items: &'b [Cow<'_, T>]) -> Vec<&'b T> {
    items
        .iter()
        .filter_map(|item| match item {
            Cow::Owned(value) => Some(value),
            Cow::Borrowed(_) => None,
        })
        .collect()
}

impl ContextUpdatePlan<'_> {
    pub fn changed_projects(&self) -> Vec<&Project> {
        owned_only(&self.projects)
    }

    pub fn changed_epics(&self) -> Vec<&Epic> {
        owned_only(&self.epics)
    }

    pub fn changed_milestones(&self) -> Vec<&Milestone> {
        owned_only(&self.milestones)
    }

    /// True when nothing was patched and no records were synthesized.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.new_risks.is_empty()
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Apply a mapping result using the default thresholds.
pub fn generate_context_updates<'a>(
    result: &MappingResult,
    extraction: &ExtractionResult,
    snapshot: &'a PlanningSnapshot,
) -> ContextUpdatePlan<'a> {
    generate_updates_with_config(result, extraction, snapshot, &MappingConfig::default())
}

/// Index of the first record carrying each id.
fn index_by_id<'a, T>(items: &'a [T], id: impl Fn(&'a T) -> &'a str) -> HashMap<&'a str, usize> {
    let mut index = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        index.entry(id(item)).or_insert(i);
    }
    index
}

pub fn generate_updates_with_config<'a>(
    result: &MappingResult,
    extraction: &ExtractionResult,
    snapshot: &'a PlanningSnapshot,
    config: &MappingConfig,
) -> ContextUpdatePlan<'a> {
    let now = extraction.processed_at;
    let project_index = index_by_id(&snapshot.projects, |p| p.id.as_str());
    let epic_index = index_by_id(&snapshot.epics, |e| e.id.as_str());
    let milestone_index = index_by_id(&snapshot.milestones, |m| m.id.as_str());

    let mut plan = ContextUpdatePlan {
        projects: snapshot.projects.iter().map(Cow::Borrowed).collect(),
        epics: snapshot.epics.iter().map(Cow::Borrowed).collect(),
        milestones: snapshot.milestones.iter().map(Cow::Borrowed).collect(),
        new_risks: Vec::new(),
        team_notes: Vec::new(),
        changes: Vec::new(),
    };

    for mapping in &result.mappings {
        if !mapping.is_applicable_update(config) {
            log::debug!(
                "Skipping mapping {} -> {} (confidence {:.2}, conflict {})",
                mapping.extracted_entity_id,
                mapping.existing_entity_id,
                mapping.match_confidence,
                mapping.conflict_level.as_str()
            );
            continue;
        }
        let Some(entity) = extraction.entity(&mapping.extracted_entity_id) else {
            log::warn!(
                "Mapping references unknown extracted entity {}",
                mapping.extracted_entity_id
            );
            continue;
        };

        let id = mapping.existing_entity_id.as_str();
        let summary = match (&entity.kind, mapping.existing_entity_type) {
            (EntityKind::ProjectStatus { status, .. }, RecordType::Project) => {
                project_index.get(id).map(|&i| {
                    let project = plan.projects[i].to_mut();
                    let new_status = config.rag_status_map.status_for(*status);
                    project.status = new_status;
                    project.last_updated = Some(now);
                    format!("status set to {} ({})", new_status.as_str(), status.as_str())
                })
            }
            (EntityKind::ProjectStatus { status, .. }, RecordType::Epic) => {
                epic_index.get(id).map(|&i| {
                    let epic = plan.epics[i].to_mut();
                    if *status != RagStatus::Red && epic.status == EpicStatus::NotStarted {
                        epic.status = EpicStatus::InProgress;
                    }
                    epic.last_updated = Some(now);
                    format!("reported {} (status {})", status.as_str(), epic.status.as_str())
                })
            }
            (
                EntityKind::Milestone {
                    status,
                    actual_date,
                    ..
                },
                RecordType::Milestone,
            ) => milestone_index.get(id).map(|&i| {
                let milestone = plan.milestones[i].to_mut();
                milestone.status = milestone_status_for(*status);
                if let Some(date) = actual_date {
                    milestone.actual_date = Some(*date);
                }
                milestone.last_updated = Some(now);
                format!("status set to {}", milestone.status.as_str())
            }),
            (
                EntityKind::Financial {
                    budget_amount: Some(amount),
                    ..
                },
                RecordType::Project,
            ) => project_index.get(id).map(|&i| {
                let project = plan.projects[i].to_mut();
                project.budget = Some(*amount);
                project.last_updated = Some(now);
                format!("budget set to {:.2}", amount)
            }),
            (
                EntityKind::TeamUpdate {
                    update,
                    utilization,
                    ..
                },
                RecordType::Team,
            ) => {
                if let Some(team) = snapshot.team(id) {
                    plan.team_notes.push(TeamNote {
                        team_id: team.id.clone(),
                        team_name: team.name.clone(),
                        update: update.clone(),
                        reported_utilization: *utilization,
                        allocated_percentage: snapshot.allocated_percentage(&team.id),
                    });
                }
                None
            }
            (EntityKind::Risk { .. }, RecordType::Project) => {
                if let Some(risk) = synthesize_risk(entity, Some(mapping), snapshot, config, now) {
                    plan.new_risks.push(risk);
                }
                None
            }
            _ => None,
        };

        if let Some(summary) = summary {
            plan.changes.push(AppliedChange {
                record_type: mapping.existing_entity_type,
                record_id: mapping.existing_entity_id.clone(),
                extracted_entity_id: entity.id.clone(),
                summary,
            });
        }
    }

    for entity in result.unmapped_entities.iter().filter(|e| e.is_risk()) {
        if let Some(risk) = synthesize_risk(entity, None, snapshot, config, now) {
            plan.new_risks.push(risk);
        }
    }

    log::info!(
        "Context update: {} records patched, {} new risks, {} team notes",
        plan.changes.len(),
        plan.new_risks.len(),
        plan.team_notes.len()
    );

    plan
}

fn milestone_status_for(progress: MilestoneProgress) -> MilestoneStatus {
    match progress {
        MilestoneProgress::OnTrack => MilestoneStatus::InProgress,
        MilestoneProgress::AtRisk | MilestoneProgress::Delayed => MilestoneStatus::AtRisk,
        MilestoneProgress::Completed => MilestoneStatus::Completed,
    }
}

/// Stable id derived from the entity, so repeated imports dedupe.
fn risk_id(entity: &ExtractedEntity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(entity.id.as_bytes());
    hasher.update(b"\n");
    hasher.update(entity.text.as_bytes());
    let hash = hasher.finalize();
    format!("risk-ocr-{}", hex::encode(&hash[..6]))
}

fn resolve_owner<'a>(owner: &str, people: &'a [Person], config: &MappingConfig) -> Option<&'a str> {
    let candidates = people.iter().map(|p| Candidate {
        id: &p.id,
        name: &p.name,
        record_type: RecordType::Person,
    });
    best_candidate(owner, candidates, config).map(|found| found.candidate_id)
}

fn synthesize_risk(
    entity: &ExtractedEntity,
    mapping: Option<&EntityMapping>,
    snapshot: &PlanningSnapshot,
    config: &MappingConfig,
    identified_at: DateTime<Utc>,
) -> Option<Risk> {
    let EntityKind::Risk {
        description,
        impact,
        probability,
        mitigation,
        owner,
        ..
    } = &entity.kind
    else {
        return None;
    };

    Some(Risk {
        id: risk_id(entity),
        project_id: mapping.map(|m| m.existing_entity_id.clone()),
        description: description.clone(),
        impact: *impact,
        probability: *probability,
        mitigation: mitigation.clone(),
        owner_id: owner
            .as_deref()
            .and_then(|o| resolve_owner(o, &snapshot.people, config))
            .map(str::to_string),
        owner_name: owner.clone(),
        source: config.risk_source.clone(),
        identified_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::test_support::*;
    use crate::matching::{map_extracted_entities_to_existing, ConflictLevel, EntityMapper};
    use crate::types::{ActualAllocation, ProjectStatus, RiskLevel};

    fn alpha_snapshot() -> PlanningSnapshot {
        PlanningSnapshot {
            projects: vec![
                project("proj-1", "Alpha Project", ProjectStatus::InProgress),
                project("proj-2", "Beta Platform", ProjectStatus::Active),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_green_status_applied() {
        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Green)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects.len(), 2);
        assert!(matches!(plan.projects[0], Cow::Owned(_)));
        assert_eq!(plan.projects[0].status, ProjectStatus::InProgress);
        assert_eq!(plan.projects[0].last_updated, Some(processed_at()));
        assert_ne!(plan.projects[0].last_updated, snapshot.projects[0].last_updated);
        // untouched record is the caller's own value
        assert!(matches!(plan.projects[1], Cow::Borrowed(p) if std::ptr::eq(p, &snapshot.projects[1])));
        assert_eq!(plan.changed_projects().len(), 1);
        assert_eq!(plan.changes[0].record_id, "proj-1");
    }

    #[test]
    fn test_red_status_maps_to_at_risk() {
        let mut snapshot = alpha_snapshot();
        snapshot.projects[0].status = ProjectStatus::AtRisk;
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Red)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects[0].status, ProjectStatus::AtRisk);
        assert_eq!(plan.changes.len(), 1);
    }

    #[test]
    fn test_low_confidence_mapping_not_applied() {
        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Red)]);
        let result = MappingResult {
            mappings: vec![EntityMapping {
                extracted_entity_id: "ps-1".to_string(),
                existing_entity_id: "proj-1".to_string(),
                existing_entity_type: RecordType::Project,
                match_confidence: 0.5,
                mapping_reason: "partial name match".to_string(),
                conflict_level: ConflictLevel::None,
            }],
            ..Default::default()
        };

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects[0].status, snapshot.projects[0].status);
        assert_eq!(plan.projects[0].last_updated, snapshot.projects[0].last_updated);
        assert!(plan.changed_projects().is_empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_blocking_conflict_not_applied() {
        let mut snapshot = alpha_snapshot();
        snapshot.projects[0].status = ProjectStatus::Completed;
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Red)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].conflict_level, ConflictLevel::High);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects[0].status, ProjectStatus::Completed);
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_low_conflict_left_for_review() {
        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Amber)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].conflict_level, ConflictLevel::Low);
        // still counted as auto-apply by the aggregator
        assert_eq!(result.recommendations.auto_apply_count, 1);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert!(matches!(plan.projects[0], Cow::Borrowed(p) if std::ptr::eq(p, &snapshot.projects[0])));
        assert!(plan.changed_projects().is_empty());
        assert!(plan.changes.is_empty());
    }

    #[test]
    fn test_milestone_with_small_date_gap_not_patched() {
        let mut existing = milestone("ms-1", "proj-1", "Beta launch", Some(date(2026, 3, 1)));
        existing.actual_date = Some(date(2026, 3, 1));
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            milestones: vec![existing],
            ..Default::default()
        };
        let extraction = extraction(vec![milestone_entity(
            "m-1",
            "Beta launch",
            Some("Alpha Project"),
            None,
            Some(date(2026, 3, 4)),
            MilestoneProgress::Completed,
        )]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].conflict_level, ConflictLevel::Low);
        assert_eq!(result.conflicts.len(), 1);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert!(matches!(plan.milestones[0], Cow::Borrowed(_)));
        assert_eq!(plan.milestones[0].actual_date, Some(date(2026, 3, 1)));
        assert_eq!(plan.milestones[0].status, MilestoneStatus::InProgress);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let mut snapshot = alpha_snapshot();
        snapshot.people = vec![person("person-1", "Dana Lee")];
        let mut risk = risk_entity("risk-1", "Vendor delay", None);
        if let EntityKind::Risk { owner, .. } = &mut risk.kind {
            *owner = Some("Dana Lee".to_string());
        }
        let extraction = extraction(vec![
            status_entity("ps-1", "Alpha Project", RagStatus::Green),
            risk,
        ]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);

        let first = generate_context_updates(&result, &extraction, &snapshot);
        let second = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn test_unmapped_risk_synthesized() {
        let mut snapshot = alpha_snapshot();
        snapshot.people = vec![person("person-1", "Dana Lee"), person("person-2", "Sam Ortiz")];
        let mut risk = risk_entity("risk-1", "Vendor delay", None);
        if let EntityKind::Risk { owner, .. } = &mut risk.kind {
            *owner = Some("dana lee".to_string());
        }
        let extraction = extraction(vec![risk]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.unmapped_entities.len(), 1);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.new_risks.len(), 1);
        let new_risk = &plan.new_risks[0];
        assert_eq!(new_risk.source, "steering-committee-ocr");
        assert!(new_risk.id.starts_with("risk-ocr-"));
        assert_eq!(new_risk.id.len(), "risk-ocr-".len() + 12);
        assert!(new_risk.project_id.is_none());
        assert_eq!(new_risk.owner_id.as_deref(), Some("person-1"));
        assert_eq!(new_risk.impact, RiskLevel::High);
        assert_eq!(new_risk.identified_at, processed_at());
    }

    #[test]
    fn test_mapped_risk_attached_to_project() {
        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![risk_entity("risk-1", "Vendor delay", Some("Beta Platform"))]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.new_risks.len(), 1);
        assert_eq!(plan.new_risks[0].project_id.as_deref(), Some("proj-2"));
        assert!(plan.changed_projects().is_empty());
    }

    #[test]
    fn test_milestone_update_sets_status_and_actual_date() {
        let snapshot = PlanningSnapshot {
            projects: vec![project("proj-1", "Alpha Project", ProjectStatus::Active)],
            milestones: vec![
                milestone("ms-1", "proj-1", "Beta launch", Some(date(2026, 3, 1))),
                milestone("ms-2", "proj-1", "General availability", Some(date(2026, 6, 1))),
            ],
            ..Default::default()
        };
        let extraction = extraction(vec![milestone_entity(
            "m-1",
            "Beta launch",
            Some("Alpha Project"),
            None,
            Some(date(2026, 2, 27)),
            MilestoneProgress::Completed,
        )]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].existing_entity_id, "ms-1");

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.milestones.len(), 2);
        assert_eq!(plan.milestones[0].status, MilestoneStatus::Completed);
        assert_eq!(plan.milestones[0].actual_date, Some(date(2026, 2, 27)));
        assert!(matches!(plan.milestones[1], Cow::Borrowed(_)));
        assert_eq!(plan.changed_milestones().len(), 1);
    }

    #[test]
    fn test_completed_milestone_not_reopened() {
        let mut done = milestone("ms-1", "proj-1", "Beta launch", None);
        done.status = MilestoneStatus::Completed;
        let snapshot = PlanningSnapshot {
            milestones: vec![done],
            ..Default::default()
        };
        let extraction = extraction(vec![milestone_entity(
            "m-1",
            "Beta launch",
            None,
            None,
            None,
            MilestoneProgress::OnTrack,
        )]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        assert_eq!(result.mappings[0].conflict_level, ConflictLevel::Low);

        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.milestones[0].status, MilestoneStatus::Completed);
        assert!(plan.changed_milestones().is_empty());
    }

    #[test]
    fn test_epic_update() {
        let snapshot = PlanningSnapshot {
            epics: vec![epic("epic-1", "proj-1", "Checkout Redesign", EpicStatus::NotStarted)],
            ..Default::default()
        };
        let extraction = extraction(vec![status_entity("ps-1", "Checkout Redesign", RagStatus::Green)]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.epics[0].status, EpicStatus::InProgress);
        assert_eq!(plan.changed_epics().len(), 1);
    }

    #[test]
    fn test_team_update_is_informational() {
        let snapshot = PlanningSnapshot {
            teams: vec![team("team-1", "Platform")],
            actual_allocations: vec![
                ActualAllocation {
                    id: "a-1".to_string(),
                    team_id: "team-1".to_string(),
                    epic_id: None,
                    iteration: 1,
                    percentage: 60.0,
                },
                ActualAllocation {
                    id: "a-2".to_string(),
                    team_id: "team-1".to_string(),
                    epic_id: Some("epic-1".to_string()),
                    iteration: 1,
                    percentage: 30.0,
                },
            ],
            ..Default::default()
        };
        let extraction = extraction(vec![team_entity("t-1", "Platform", Some(95.0))]);
        let result = map_extracted_entities_to_existing(&extraction, &snapshot);
        let plan = generate_context_updates(&result, &extraction, &snapshot);

        assert!(plan.changes.is_empty());
        assert_eq!(plan.team_notes.len(), 1);
        assert_eq!(plan.team_notes[0].reported_utilization, Some(95.0));
        assert_eq!(plan.team_notes[0].allocated_percentage, 90.0);
    }

    #[test]
    fn test_custom_rag_map_and_risk_source() {
        let mut config = MappingConfig::default();
        config.rag_status_map.green = ProjectStatus::Active;
        config.risk_source = "qbr-ocr".to_string();
        let mapper = EntityMapper::new(config);

        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![
            status_entity("ps-1", "Alpha Project", RagStatus::Green),
            risk_entity("risk-1", "Scope creep", None),
        ]);
        let result = mapper.map(&extraction, &snapshot);
        let plan = mapper.generate_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects[0].status, ProjectStatus::Active);
        assert_eq!(plan.new_risks[0].source, "qbr-ocr");
    }

    #[test]
    fn test_stale_mapping_ids_are_ignored() {
        let snapshot = alpha_snapshot();
        let extraction = extraction(vec![status_entity("ps-1", "Alpha Project", RagStatus::Green)]);
        let result = MappingResult {
            mappings: vec![EntityMapping {
                extracted_entity_id: "ps-1".to_string(),
                existing_entity_id: "proj-deleted".to_string(),
                existing_entity_type: RecordType::Project,
                match_confidence: 1.0,
                mapping_reason: "exact name match".to_string(),
                conflict_level: ConflictLevel::None,
            }],
            ..Default::default()
        };
        let plan = generate_context_updates(&result, &extraction, &snapshot);
        assert_eq!(plan.projects.len(), 2);
        assert!(plan.is_empty());
    }
}
