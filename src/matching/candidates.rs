//! Candidate selection: pick the best existing record for each extracted
//! entity.
//!
//! Candidates scoring below `minMatchConfidence` are never force-matched.
//! Ties on score are broken by match tier, then by the lexicographically
//! smallest id, so results are reproducible regardless of input order.

use std::cmp::Ordering;

use crate::config::MappingConfig;
use crate::entity::RecordType;
use crate::ocr::{EntityKind, ExtractedEntity};
use crate::types::{Milestone, PlanningSnapshot, Project};

use super::similarity::{score_labels, Similarity};
use super::{ConflictLevel, EntityMapping};

/// A record eligible for matching, reduced to what scoring needs.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub record_type: RecordType,
}

/// Best-scoring candidate for a label.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateMatch<'a> {
    pub candidate_id: &'a str,
    pub candidate_name: &'a str,
    pub record_type: RecordType,
    pub similarity: Similarity,
}

/// Return the best candidate for `label` at or above the confidence floor.
pub fn best_candidate<'a, I>(label: &str, candidates: I, config: &MappingConfig) -> Option<CandidateMatch<'a>>
where
    I: IntoIterator<Item = Candidate<'a>>,
{
    let mut best: Option<CandidateMatch<'a>> = None;

    for candidate in candidates {
        let similarity = score_labels(label, candidate.name, config.min_similarity);
        if similarity.score < config.min_match_confidence {
            continue;
        }

        let current = CandidateMatch {
            candidate_id: candidate.id,
            candidate_name: candidate.name,
            record_type: candidate.record_type,
            similarity,
        };

        if best
            .as_ref()
            .is_none_or(|b| compare_matches(&current, b) == Ordering::Greater)
        {
            best = Some(current);
        }
    }

    best
}

/// Higher score wins, then stronger tier, then the smaller id.
fn compare_matches(a: &CandidateMatch<'_>, b: &CandidateMatch<'_>) -> Ordering {
    a.similarity
        .score
        .total_cmp(&b.similarity.score)
        .then_with(|| a.similarity.tier.cmp(&b.similarity.tier))
        .then_with(|| b.candidate_id.cmp(a.candidate_id))
}

fn project_candidates(projects: &[Project]) -> impl Iterator<Item = Candidate<'_>> {
    projects.iter().map(|p| Candidate {
        id: &p.id,
        name: &p.name,
        record_type: RecordType::Project,
    })
}

fn milestone_candidates<'a>(
    milestones: impl IntoIterator<Item = &'a Milestone>,
) -> impl Iterator<Item = Candidate<'a>> {
    milestones.into_iter().map(|m| Candidate {
        id: &m.id,
        name: &m.name,
        record_type: RecordType::Milestone,
    })
}

/// Map a single extracted entity, or `None` when nothing clears the floor.
///
/// The returned mapping always carries `ConflictLevel::None`; conflict
/// detection runs afterwards.
pub fn match_entity(
    entity: &ExtractedEntity,
    snapshot: &PlanningSnapshot,
    config: &MappingConfig,
) -> Option<EntityMapping> {
    let (found, scope) = match &entity.kind {
        EntityKind::ProjectStatus { project_name, .. } => {
            let found = best_candidate(project_name, project_candidates(&snapshot.projects), config)
                .or_else(|| {
                    let epics = snapshot.epics.iter().map(|e| Candidate {
                        id: &e.id,
                        name: &e.name,
                        record_type: RecordType::Epic,
                    });
                    best_candidate(project_name, epics, config)
                });
            (found, None)
        }
        EntityKind::Financial { project_name, .. } | EntityKind::Risk { project_name, .. } => {
            let name = project_name.as_deref()?;
            (
                best_candidate(name, project_candidates(&snapshot.projects), config),
                None,
            )
        }
        EntityKind::Milestone {
            milestone_name,
            project_name,
            ..
        } => {
            let scope = likely_project(project_name.as_deref(), &entity.text, snapshot, config);
            let scoped: Vec<&Milestone> = match scope {
                Some(p) => snapshot
                    .milestones
                    .iter()
                    .filter(|m| m.project_id == p.id)
                    .collect(),
                None => Vec::new(),
            };
            let found = if scoped.is_empty() {
                best_candidate(milestone_name, milestone_candidates(&snapshot.milestones), config)
            } else {
                best_candidate(milestone_name, milestone_candidates(scoped), config)
            };
            (found, scope)
        }
        EntityKind::TeamUpdate { team_name, .. } => {
            let teams = snapshot.teams.iter().map(|t| Candidate {
                id: &t.id,
                name: &t.name,
                record_type: RecordType::Team,
            });
            (best_candidate(team_name, teams, config), None)
        }
        EntityKind::Commentary { .. } => return None,
    };

    let found = found?;
    let mut reason = format!(
        "{} on {} '{}' ({:.0}% similarity)",
        found.similarity.tier.describe(),
        found.record_type,
        found.candidate_name,
        found.similarity.score * 100.0
    );
    if let Some(project) = scope {
        reason.push_str(&format!(" within project '{}'", project.name));
    }

    log::debug!(
        "Entity {} -> {} {} ({:.2})",
        entity.id,
        found.record_type,
        found.candidate_id,
        found.similarity.score
    );

    Some(EntityMapping {
        extracted_entity_id: entity.id.clone(),
        existing_entity_id: found.candidate_id.to_string(),
        existing_entity_type: found.record_type,
        match_confidence: found.similarity.score,
        mapping_reason: reason,
        conflict_level: ConflictLevel::None,
    })
}

/// Split entities into mappings and leftovers, both in input order.
pub fn match_entities(
    extracted: &[ExtractedEntity],
    snapshot: &PlanningSnapshot,
    config: &MappingConfig,
) -> (Vec<EntityMapping>, Vec<ExtractedEntity>) {
    let mut mappings = Vec::new();
    let mut unmapped = Vec::new();
    for entity in extracted {
        match match_entity(entity, snapshot, config) {
            Some(mapping) => mappings.push(mapping),
            None => {
                log::debug!("No {} match for entity {}", entity.kind.label(), entity.id);
                unmapped.push(entity.clone());
            }
        }
    }
    (mappings, unmapped)
}

/// Project a milestone most likely belongs to.
///
/// Prefers the named project; otherwise the longest project name that
/// appears in the entity's source text.
fn likely_project<'a>(
    project_name: Option<&str>,
    text: &str,
    snapshot: &'a PlanningSnapshot,
    config: &MappingConfig,
) -> Option<&'a Project> {
    if let Some(name) = project_name {
        if let Some(found) = best_candidate(name, project_candidates(&snapshot.projects), config) {
            return snapshot.project(found.candidate_id);
        }
    }

    let text_lower = text.to_lowercase();
    snapshot
        .projects
        .iter()
        .filter(|p| {
            let name = p.name.trim().to_lowercase();
            !name.is_empty() && text_lower.contains(&name)
        })
        .max_by(|a, b| {
            a.name
                .chars()
                .count()
                .cmp(&b.name.chars().count())
                .then_with(|| b.id.cmp(&a.id))
        })
}
