//! Folds mappings, leftovers and conflicts into a `MappingResult` with
//! review recommendations.

use crate::config::MappingConfig;
use crate::ocr::ExtractedEntity;

use super::{Conflict, EntityMapping, MappingResult, Recommendations};

pub fn aggregate(
    mappings: Vec<EntityMapping>,
    unmapped: Vec<ExtractedEntity>,
    conflicts: Vec<Conflict>,
    config: &MappingConfig,
) -> MappingResult {
    let recommendations = recommend(&mappings, &unmapped, config);
    MappingResult {
        mappings,
        unmapped_entities: unmapped,
        conflicts,
        recommendations,
    }
}

fn recommend(
    mappings: &[EntityMapping],
    unmapped: &[ExtractedEntity],
    config: &MappingConfig,
) -> Recommendations {
    let auto_apply_count = mappings
        .iter()
        .filter(|m| m.is_auto_applicable(config))
        .count();
    let requires_review_count = mappings.iter().filter(|m| m.requires_review(config)).count();
    let blocking_conflicts = mappings
        .iter()
        .filter(|m| m.conflict_level.is_blocking())
        .count();
    let low_confidence = mappings
        .iter()
        .filter(|m| !config.is_auto_apply(m.match_confidence))
        .count();
    let unmapped_risks = unmapped.iter().filter(|e| e.is_risk()).count();

    let mut suggested_actions = Vec::new();
    if !unmapped.is_empty() {
        suggested_actions.push(format!(
            "{} entities could not be matched - consider creating new records",
            unmapped.len()
        ));
    }
    if blocking_conflicts > 0 {
        suggested_actions.push(format!(
            "{} mappings have conflicting status - review before applying",
            blocking_conflicts
        ));
    }
    if low_confidence > 0 {
        suggested_actions.push(format!(
            "{} mappings have low match confidence - confirm the matched records",
            low_confidence
        ));
    }
    if unmapped_risks > 0 {
        suggested_actions.push(format!(
            "{} risks will be added as new risk records",
            unmapped_risks
        ));
    }
    if auto_apply_count > 0 {
        suggested_actions.push(format!(
            "{} mappings can be applied automatically",
            auto_apply_count
        ));
    }

    Recommendations {
        auto_apply_count,
        requires_review_count,
        suggested_actions,
    }
}
