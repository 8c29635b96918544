//! Line-oriented entity extraction from OCR'd steering-committee text.
//!
//! Recognizes project RAG lines, risks, milestones, team updates, budget
//! lines and notes. A `Project:` header sets the project context that
//! following risks and milestones inherit until the next header.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use super::{EntityKind, ExtractedEntity, ExtractionResult, MilestoneProgress, RagStatus};
use crate::types::RiskLevel;

const STRUCTURED_CONFIDENCE: f64 = 0.9;
const PARTIAL_CONFIDENCE: f64 = 0.7;

// Compile-once regex patterns via OnceLock.
fn re_bullet() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:[-*•·]|\d+[.)])\s+").unwrap())
}

fn re_project_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^project\s*[:\-]\s*(?P<name>.+?)(?:\s*[-|,]\s*(?:(?:rag|status)\s*[:\-]?\s*)?(?P<rag>red|amber|yellow|green)\b(?:\s*[-:(]\s*(?P<reason>[^)]+?)\)?)?)?\s*$",
        )
        .unwrap()
    })
}

fn re_rag_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<name>[^:|]+?)\s*[-|:]\s*(?:(?:rag|status)\s*[:\-]?\s*)?(?P<rag>red|amber|yellow|green)\b(?:\s*[-:(]\s*(?P<reason>[^)]+?)\)?)?\s*$",
        )
        .unwrap()
    })
}

fn re_risk() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^risk\s*[:\-]\s*(?P<body>.+)$").unwrap())
}

fn re_risk_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\(\s*(impact|probability|likelihood|owner|mitigation)\s*:\s*([^)]+?)\s*\)")
            .unwrap()
    })
}

fn re_milestone() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^milestone\s*[:\-]\s*(?P<body>.+)$").unwrap())
}

fn re_segment_split() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+[-–—]\s+|\s*\|\s*").unwrap())
}

fn re_iso_date() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b").unwrap())
}

fn re_team() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^team\s+(?P<name>[^:]+?)\s*:\s*(?P<update>.+)$").unwrap())
}

fn re_utilization() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\(?\s*(\d{1,3}(?:\.\d+)?)\s*%\s*utili[sz]ation\s*\)?").unwrap()
    })
}

fn re_budget() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^budget\s*[:\-]\s*(?:(?P<project>[^:$]+?)\s*:\s*)?\$?\s*(?P<amount>\d[\d,]*(?:\.\d+)?)(?:.*?spent\s*\$?\s*(?P<actual>\d[\d,]*(?:\.\d+)?))?",
        )
        .unwrap()
    })
}

fn re_note() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:note|comment)s?\s*[:\-]\s*(?P<content>.+)$").unwrap())
}

/// Per-kind id counters so ids stay stable for a given document.
#[derive(Default)]
struct IdCounters {
    project_status: usize,
    risk: usize,
    milestone: usize,
    team: usize,
    financial: usize,
    note: usize,
}

impl IdCounters {
    fn next(&mut self, kind: &EntityKind) -> String {
        let (prefix, counter) = match kind {
            EntityKind::ProjectStatus { .. } => ("ps", &mut self.project_status),
            EntityKind::Risk { .. } => ("risk", &mut self.risk),
            EntityKind::Milestone { .. } => ("ms", &mut self.milestone),
            EntityKind::TeamUpdate { .. } => ("team", &mut self.team),
            EntityKind::Financial { .. } => ("fin", &mut self.financial),
            EntityKind::Commentary { .. } => ("note", &mut self.note),
        };
        *counter += 1;
        format!("{}-{}", prefix, counter)
    }
}

/// Extract planning entities from OCR text.
///
/// Input is NFKC-normalized first so OCR ligatures and full-width
/// characters compare equal to their plain forms. Lines that match no
/// pattern are ignored.
pub fn extract_entities(text: &str, processed_at: DateTime<Utc>) -> ExtractionResult {
    let normalized: String = text.nfkc().collect();

    let mut entities = Vec::new();
    let mut ids = IdCounters::default();
    let mut current_project: Option<String> = None;

    for raw_line in normalized.lines() {
        let line = re_bullet().replace(raw_line, "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed = parse_line(line, &mut current_project);
        if let Some((kind, confidence)) = parsed {
            let id = ids.next(&kind);
            entities.push(ExtractedEntity {
                id,
                text: line.to_string(),
                confidence,
                kind,
            });
        }
    }

    log::debug!("Extracted {} entities from OCR text", entities.len());

    ExtractionResult {
        document_name: None,
        raw_text: normalized,
        processed_at,
        entities,
    }
}

fn parse_line(line: &str, current_project: &mut Option<String>) -> Option<(EntityKind, f64)> {
    if let Some(caps) = re_project_header().captures(line) {
        let name = clean_text(&caps["name"]);
        *current_project = Some(name.clone());
        let rag = caps.name("rag").and_then(|m| RagStatus::parse(m.as_str()))?;
        return Some((
            EntityKind::ProjectStatus {
                project_name: name,
                status: rag,
                status_reason: caps.name("reason").map(|m| clean_text(m.as_str())),
            },
            STRUCTURED_CONFIDENCE,
        ));
    }

    if let Some(caps) = re_risk().captures(line) {
        return Some(parse_risk(&caps["body"], current_project.as_deref()));
    }

    if let Some(caps) = re_milestone().captures(line) {
        return parse_milestone(&caps["body"], current_project.as_deref());
    }

    if let Some(caps) = re_team().captures(line) {
        let update_raw = &caps["update"];
        let utilization = re_utilization()
            .captures(update_raw)
            .and_then(|c| c[1].parse::<f64>().ok());
        let update = clean_text(&re_utilization().replace_all(update_raw, ""));
        let confidence = if utilization.is_some() {
            STRUCTURED_CONFIDENCE
        } else {
            PARTIAL_CONFIDENCE
        };
        return Some((
            EntityKind::TeamUpdate {
                team_name: clean_text(&caps["name"]),
                update,
                utilization,
            },
            confidence,
        ));
    }

    if let Some(caps) = re_budget().captures(line) {
        let project_name = caps
            .name("project")
            .map(|m| clean_text(m.as_str()))
            .or_else(|| current_project.clone());
        let confidence = if caps.name("project").is_some() {
            STRUCTURED_CONFIDENCE
        } else {
            PARTIAL_CONFIDENCE
        };
        return Some((
            EntityKind::Financial {
                project_name,
                category: "budget".to_string(),
                budget_amount: parse_amount(&caps["amount"]),
                actual_amount: caps.name("actual").and_then(|m| parse_amount(m.as_str())),
            },
            confidence,
        ));
    }

    if let Some(caps) = re_note().captures(line) {
        return Some((
            EntityKind::Commentary {
                section: current_project.clone(),
                content: clean_text(&caps["content"]),
            },
            PARTIAL_CONFIDENCE,
        ));
    }

    if let Some(caps) = re_rag_line().captures(line) {
        let rag = RagStatus::parse(&caps["rag"])?;
        let name = clean_text(&caps["name"]);
        *current_project = Some(name.clone());
        return Some((
            EntityKind::ProjectStatus {
                project_name: name,
                status: rag,
                status_reason: caps.name("reason").map(|m| clean_text(m.as_str())),
            },
            STRUCTURED_CONFIDENCE,
        ));
    }

    None
}

fn parse_risk(body: &str, current_project: Option<&str>) -> (EntityKind, f64) {
    let mut impact = None;
    let mut probability = None;
    let mut owner = None;
    let mut mitigation = None;

    for caps in re_risk_attr().captures_iter(body) {
        let value = clean_text(&caps[2]);
        match caps[1].to_lowercase().as_str() {
            "impact" => impact = Some(RiskLevel::parse_lossy(&value)),
            "probability" | "likelihood" => probability = Some(RiskLevel::parse_lossy(&value)),
            "owner" => owner = Some(value),
            _ => mitigation = Some(value),
        }
    }

    let description = clean_text(&re_risk_attr().replace_all(body, ""));
    let confidence = if impact.is_some() {
        STRUCTURED_CONFIDENCE
    } else {
        PARTIAL_CONFIDENCE
    };

    (
        EntityKind::Risk {
            description,
            impact: impact.unwrap_or(RiskLevel::Medium),
            probability: probability.unwrap_or(RiskLevel::Medium),
            mitigation,
            owner,
            project_name: current_project.map(str::to_string),
        },
        confidence,
    )
}

fn parse_milestone(body: &str, current_project: Option<&str>) -> Option<(EntityKind, f64)> {
    let mut segments = re_segment_split().split(body);
    let name = clean_text(segments.next()?);
    if name.is_empty() {
        return None;
    }

    let mut date = None;
    let mut status = None;
    for segment in segments {
        if let Some(caps) = re_iso_date().captures(segment) {
            if let Ok(d) = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d") {
                date = Some(d);
                continue;
            }
        }
        if let Some(s) = MilestoneProgress::parse(segment) {
            status = Some(s);
        }
    }

    let confidence = if date.is_some() && status.is_some() {
        STRUCTURED_CONFIDENCE
    } else {
        PARTIAL_CONFIDENCE
    };
    let status = status.unwrap_or(MilestoneProgress::OnTrack);
    let (target_date, actual_date) = if status == MilestoneProgress::Completed {
        (None, date)
    } else {
        (date, None)
    };

    Some((
        EntityKind::Milestone {
            milestone_name: name,
            project_name: current_project.map(str::to_string),
            target_date,
            actual_date,
            status,
        },
        confidence,
    ))
}

/// Collapse whitespace and trim stray separators left by OCR.
fn clean_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == '-' || c == '|' || c == ',' || c == ':' || c.is_whitespace())
        .to_string()
}

fn parse_amount(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok()
}
