//! Plan Pulse: reconciles OCR-extracted steering-committee reports against
//! existing planning records.
//!
//! The pipeline is `extract_entities` (raw OCR text to typed entities),
//! `EntityMapper::map` (entities to existing records, with conflicts and
//! recommendations) and `EntityMapper::generate_updates` (confirmed
//! mappings to patched collections).

pub mod config;
pub mod entity;
pub mod error;
pub mod matching;
pub mod ocr;
pub mod types;
pub mod updates;

pub use config::{load_config, load_default_config, MappingConfig, RagStatusMap};
pub use entity::RecordType;
pub use error::{MappingError, MappingErrorInfo};
pub use matching::{
    map_extracted_entities_to_existing, Conflict, ConflictLevel, EntityMapper, EntityMapping,
    MappingResult, Recommendations,
};
pub use ocr::{extract_entities, EntityKind, ExtractedEntity, ExtractionResult};
pub use types::PlanningSnapshot;
pub use updates::{generate_context_updates, ContextUpdatePlan};
