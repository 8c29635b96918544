//! Plan Pulse mapping CLI: runs one OCR report through extraction and
//! matching against a planning snapshot and prints the result as JSON.
//!
//! Build: `cargo build --features cli --bin pulse-map`
//! Usage: `pulse-map <ocr-text-file> <snapshot.json> [--config <mapping.json>] [--apply]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;

use plan_pulse_lib::config::{load_config, load_default_config};
use plan_pulse_lib::ocr::load_report;
use plan_pulse_lib::updates::ContextUpdatePlan;
use plan_pulse_lib::{extract_entities, EntityMapper, ExtractionResult, MappingResult, PlanningSnapshot};

#[derive(Parser, Debug)]
#[clap(name = "pulse-map")]
#[clap(about = "Map an OCR'd steering-committee report onto a planning snapshot")]
struct Args {
    /// OCR text of the report
    #[clap(value_name = "REPORT")]
    report: PathBuf,

    /// Planning snapshot exported as JSON
    #[clap(value_name = "SNAPSHOT")]
    snapshot: PathBuf,

    /// Mapping config (defaults to ~/.plan-pulse/mapping.json)
    #[clap(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also print the update plan for conflict-free mappings
    #[clap(long)]
    apply: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    extraction: &'a ExtractionResult,
    mapping: &'a MappingResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    updates: Option<ContextUpdatePlan<'a>>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    };

    let text = load_report(&args.report)
        .with_context(|| format!("failed to read report {}", args.report.display()))?;
    let snapshot = PlanningSnapshot::load(&args.snapshot)
        .with_context(|| format!("failed to load snapshot {}", args.snapshot.display()))?;

    let mut extraction = extract_entities(&text, Utc::now());
    extraction.document_name = args
        .report
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let mapper = EntityMapper::new(config);
    let mapping = mapper.map(&extraction, &snapshot);
    let updates = args
        .apply
        .then(|| mapper.generate_updates(&mapping, &extraction, &snapshot));

    for action in &mapping.recommendations.suggested_actions {
        log::info!("{}", action);
    }

    let report = Report {
        extraction: &extraction,
        mapping: &mapping,
        updates,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
