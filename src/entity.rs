//! Record-type discriminant for existing planning entities.
//!
//! Extracted OCR entities are reconciled against one of these collections.
//! The discriminant travels on every mapping and conflict so callers can
//! route updates without string comparisons.

use serde::{Deserialize, Serialize};

/// The kind of existing planning record a mapping points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Project,
    Epic,
    Team,
    Milestone,
    Person,
}

impl RecordType {
    /// String label used in mapping reasons and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Project => "project",
            RecordType::Epic => "epic",
            RecordType::Team => "team",
            RecordType::Milestone => "milestone",
            RecordType::Person => "person",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
