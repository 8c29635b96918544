//! Conflict detection between an extracted entity's implied state and the
//! matched record's current state.
//!
//! Detection is read-only: the caller folds the returned level into the
//! mapping exactly once.

use chrono::NaiveDate;

use crate::entity::RecordType;
use crate::ocr::{EntityKind, ExtractedEntity, MilestoneProgress, RagStatus};
use crate::types::{EpicStatus, Milestone, MilestoneStatus, PlanningSnapshot, ProjectStatus};

use super::{Conflict, ConflictLevel, EntityMapping};

/// Date gaps up to this many days are low severity.
const DATE_GAP_LOW_DAYS: i64 = 7;
/// Date gaps up to this many days are medium severity; beyond is high.
const DATE_GAP_MEDIUM_DAYS: i64 = 30;

/// Relative budget differences above these ratios escalate severity.
const BUDGET_LOW_RATIO: f64 = 0.10;
const BUDGET_MEDIUM_RATIO: f64 = 0.25;
const BUDGET_HIGH_RATIO: f64 = 0.50;

/// Compatibility of a reported RAG colour with a project's current status.
pub fn project_rag_conflict(existing: ProjectStatus, rag: RagStatus) -> ConflictLevel {
    match (existing, rag) {
        (ProjectStatus::Planning | ProjectStatus::Active | ProjectStatus::InProgress, rag) => {
            match rag {
                RagStatus::Green => ConflictLevel::None,
                RagStatus::Amber => ConflictLevel::Low,
                RagStatus::Red => ConflictLevel::Medium,
            }
        }
        (ProjectStatus::AtRisk, RagStatus::Green) => ConflictLevel::Low,
        (ProjectStatus::AtRisk, RagStatus::Amber | RagStatus::Red) => ConflictLevel::None,
        (ProjectStatus::OnHold, _) => ConflictLevel::Low,
        (ProjectStatus::Completed, RagStatus::Green) => ConflictLevel::None,
        (ProjectStatus::Completed, RagStatus::Amber) => ConflictLevel::Medium,
        (ProjectStatus::Completed, RagStatus::Red) => ConflictLevel::High,
        (ProjectStatus::Cancelled, RagStatus::Green | RagStatus::Amber) => ConflictLevel::Medium,
        (ProjectStatus::Cancelled, RagStatus::Red) => ConflictLevel::High,
    }
}

/// Compatibility of a reported RAG colour with an epic's current status.
pub fn epic_rag_conflict(existing: EpicStatus, rag: RagStatus) -> ConflictLevel {
    match (existing, rag) {
        (EpicStatus::Completed, RagStatus::Green) => ConflictLevel::None,
        (EpicStatus::Completed, RagStatus::Amber) => ConflictLevel::Medium,
        (EpicStatus::Completed, RagStatus::Red) => ConflictLevel::High,
        (_, RagStatus::Green) => ConflictLevel::None,
        (_, RagStatus::Amber) => ConflictLevel::Low,
        (_, RagStatus::Red) => ConflictLevel::Medium,
    }
}

/// Severity of a disagreement between two dates.
pub fn date_gap_conflict(extracted: NaiveDate, existing: NaiveDate) -> ConflictLevel {
    let gap = (extracted - existing).num_days().abs();
    if gap == 0 {
        ConflictLevel::None
    } else if gap <= DATE_GAP_LOW_DAYS {
        ConflictLevel::Low
    } else if gap <= DATE_GAP_MEDIUM_DAYS {
        ConflictLevel::Medium
    } else {
        ConflictLevel::High
    }
}

/// Severity of a budget disagreement, relative to the recorded budget.
pub fn budget_conflict(extracted: f64, existing: f64) -> ConflictLevel {
    if existing <= 0.0 {
        return ConflictLevel::None;
    }
    let ratio = (extracted - existing).abs() / existing;
    if ratio > BUDGET_HIGH_RATIO {
        ConflictLevel::High
    } else if ratio > BUDGET_MEDIUM_RATIO {
        ConflictLevel::Medium
    } else if ratio > BUDGET_LOW_RATIO {
        ConflictLevel::Low
    } else {
        ConflictLevel::None
    }
}

/// One field-level finding before it is attached to a mapping.
struct Finding {
    field: &'static str,
    existing_value: String,
    extracted_value: String,
    level: ConflictLevel,
}

/// Compare a mapped entity against its record. Returns `None` when the
/// states are compatible or there is nothing comparable.
pub fn detect_conflict(
    mapping: &EntityMapping,
    extracted: &ExtractedEntity,
    snapshot: &PlanningSnapshot,
) -> Option<Conflict> {
    let id = mapping.existing_entity_id.as_str();

    let finding = match (&extracted.kind, mapping.existing_entity_type) {
        (EntityKind::ProjectStatus { status, .. }, RecordType::Project) => {
            let project = snapshot.project(id)?;
            Finding {
                field: "status",
                existing_value: project.status.as_str().to_string(),
                extracted_value: status.as_str().to_string(),
                level: project_rag_conflict(project.status, *status),
            }
        }
        (EntityKind::ProjectStatus { status, .. }, RecordType::Epic) => {
            let epic = snapshot.epic(id)?;
            Finding {
                field: "status",
                existing_value: epic.status.as_str().to_string(),
                extracted_value: status.as_str().to_string(),
                level: epic_rag_conflict(epic.status, *status),
            }
        }
        (
            EntityKind::Milestone {
                target_date,
                actual_date,
                status,
                ..
            },
            RecordType::Milestone,
        ) => {
            let milestone = snapshot.milestone(id)?;
            milestone_finding(milestone, *target_date, *actual_date, *status)?
        }
        (
            EntityKind::Financial {
                budget_amount: Some(amount),
                ..
            },
            RecordType::Project,
        ) => {
            let budget = snapshot.project(id)?.budget?;
            Finding {
                field: "budget",
                existing_value: format!("{:.2}", budget),
                extracted_value: format!("{:.2}", amount),
                level: budget_conflict(*amount, budget),
            }
        }
        _ => return None,
    };

    if finding.level == ConflictLevel::None {
        return None;
    }

    Some(Conflict {
        extracted_entity_id: mapping.extracted_entity_id.clone(),
        existing_entity_id: mapping.existing_entity_id.clone(),
        existing_entity_type: mapping.existing_entity_type,
        field: finding.field.to_string(),
        description: format!(
            "{} {} is '{}' but the document reports '{}' ({} conflict)",
            mapping.existing_entity_type,
            finding.field,
            finding.existing_value,
            finding.extracted_value,
            finding.level.as_str()
        ),
        existing_value: finding.existing_value,
        extracted_value: finding.extracted_value,
        conflict_level: finding.level,
    })
}

/// A completed milestone reported as anything but completed would reopen it.
fn milestone_status_conflict(
    existing: MilestoneStatus,
    progress: MilestoneProgress,
) -> Option<ConflictLevel> {
    match (existing, progress) {
        (MilestoneStatus::Completed, MilestoneProgress::Delayed | MilestoneProgress::AtRisk) => {
            Some(ConflictLevel::Medium)
        }
        (MilestoneStatus::Completed, MilestoneProgress::OnTrack) => Some(ConflictLevel::Low),
        _ => None,
    }
}

/// Most severe of the date and status disagreements for a milestone.
fn milestone_finding(
    milestone: &Milestone,
    target_date: Option<NaiveDate>,
    actual_date: Option<NaiveDate>,
    progress: MilestoneProgress,
) -> Option<Finding> {
    let date_finding = match (actual_date, milestone.actual_date) {
        (Some(extracted), Some(existing)) => Some(("actualDate", extracted, existing)),
        _ => match (target_date, milestone.due_date) {
            (Some(extracted), Some(existing)) => Some(("dueDate", extracted, existing)),
            _ => None,
        },
    }
    .map(|(field, extracted, existing)| Finding {
        field,
        existing_value: existing.to_string(),
        extracted_value: extracted.to_string(),
        level: date_gap_conflict(extracted, existing),
    });

    let status_finding = milestone_status_conflict(milestone.status, progress).map(|level| Finding {
        field: "status",
        existing_value: milestone.status.as_str().to_string(),
        extracted_value: progress.as_str().to_string(),
        level,
    });

    match (date_finding, status_finding) {
        (Some(d), Some(s)) => Some(if s.level > d.level { s } else { d }),
        (d, s) => d.or(s),
    }
}
