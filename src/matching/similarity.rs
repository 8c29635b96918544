//! Label similarity scoring.
//!
//! Tiered like the meeting-title matchers: exact, case-insensitive,
//! containment, then normalized Levenshtein distance as the fuzzy fallback.

use serde::Serialize;

use crate::config::MappingConfig;

pub const EXACT_SCORE: f64 = 1.0;
pub const CASE_INSENSITIVE_SCORE: f64 = 0.95;
pub const SUBSTRING_FLOOR: f64 = 0.6;
const SUBSTRING_SCALE: f64 = 0.9;

/// Which rule produced a similarity score. Ordered weakest to strongest so
/// it can break ties between equal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchTier {
    None,
    Fuzzy,
    Substring,
    CaseInsensitive,
    Exact,
}

impl MatchTier {
    pub fn describe(&self) -> &'static str {
        match self {
            MatchTier::None => "no match",
            MatchTier::Fuzzy => "fuzzy name match",
            MatchTier::Substring => "partial name match",
            MatchTier::CaseInsensitive => "case-insensitive name match",
            MatchTier::Exact => "exact name match",
        }
    }
}

/// A similarity score together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub score: f64,
    pub tier: MatchTier,
}

impl Similarity {
    const NONE: Similarity = Similarity {
        score: 0.0,
        tier: MatchTier::None,
    };
}

/// Score two labels in [0, 1] using the default floor.
pub fn similarity(a: &str, b: &str) -> f64 {
    score_labels(a, b, MappingConfig::default().min_similarity).score
}

/// Score two labels, clamping fuzzy scores below `min_similarity` to zero.
pub fn similarity_with_floor(a: &str, b: &str, min_similarity: f64) -> f64 {
    score_labels(a, b, min_similarity).score
}

/// Score two labels and report which tier matched.
pub fn score_labels(a: &str, b: &str, min_similarity: f64) -> Similarity {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return Similarity::NONE;
    }

    if a == b {
        return Similarity {
            score: EXACT_SCORE,
            tier: MatchTier::Exact,
        };
    }

    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    if a_lower == b_lower {
        return Similarity {
            score: CASE_INSENSITIVE_SCORE,
            tier: MatchTier::CaseInsensitive,
        };
    }

    let a_len = a_lower.chars().count();
    let b_len = b_lower.chars().count();
    let max_len = a_len.max(b_len);

    if a_lower.contains(&b_lower) || b_lower.contains(&a_lower) {
        let ratio = a_len.min(b_len) as f64 / max_len as f64;
        return Similarity {
            score: (SUBSTRING_SCALE * ratio).max(SUBSTRING_FLOOR),
            tier: MatchTier::Substring,
        };
    }

    let distance = strsim::levenshtein(&a_lower, &b_lower);
    let score = 1.0 - distance as f64 / max_len as f64;
    if score < min_similarity {
        return Similarity::NONE;
    }

    Similarity {
        score: score.clamp(0.0, 1.0),
        tier: MatchTier::Fuzzy,
    }
}
