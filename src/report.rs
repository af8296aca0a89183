//! Output formatting for analysis results.
//!
//! Two formats:
//! - JSON: the canonical artifact handed to downstream consumers (graph
//!   import, visualization, summarization). Optional fields are omitted
//!   when absent, never emitted as null.
//! - Pretty: colored terminal summary for humans.

use colored::*;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::engine::RunResult;
use crate::model::{CfgResult, RunStats};
use crate::reconcile::{HybridEntity, HybridRelationship, Provenance};

/// Top-level JSON artifact.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub success: bool,
    pub entities: Vec<HybridEntity>,
    pub relationships: Vec<HybridRelationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_flow: Option<ControlFlowSection>,
    pub stats: RunStats,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unit_errors: Vec<String>,
}

/// Control-flow portion of the artifact.
#[derive(Serialize, Deserialize)]
pub struct ControlFlowSection {
    pub functions: Vec<CfgResult>,
    pub summary: ControlFlowSummary,
}

/// Aggregate complexity figures across all analyzed functions.
#[derive(Serialize, Deserialize, Default)]
pub struct ControlFlowSummary {
    pub total_functions: usize,
    pub average_complexity: f64,
    pub max_complexity: u32,
    pub total_unreachable_blocks: usize,
}

impl ControlFlowSummary {
    fn from_results(functions: &[CfgResult]) -> Self {
        let mut summary = ControlFlowSummary {
            total_functions: functions.len(),
            ..Default::default()
        };
        if functions.is_empty() {
            return summary;
        }

        let mut total = 0u64;
        for cfg in functions {
            total += cfg.cyclomatic_complexity as u64;
            summary.max_complexity = summary.max_complexity.max(cfg.cyclomatic_complexity);
            summary.total_unreachable_blocks += cfg.unreachable_blocks.len();
        }
        summary.average_complexity = total as f64 / functions.len() as f64;
        summary
    }
}

/// Build the JSON artifact from a finished run.
pub fn build_report(result: RunResult) -> JsonReport {
    let control_flow = if result.control_flow.is_empty() {
        None
    } else {
        Some(ControlFlowSection {
            summary: ControlFlowSummary::from_results(&result.control_flow),
            functions: result.control_flow,
        })
    };

    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        success: true,
        entities: result.entities,
        relationships: result.relationships,
        control_flow,
        stats: result.stats,
        unit_errors: result.unit_errors.iter().map(|e| e.to_string()).collect(),
    }
}

/// Write the JSON artifact.
pub fn write_json<W: Write>(writer: W, report: &JsonReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Write a colored human-readable summary.
pub fn write_pretty(path: &str, report: &JsonReport) {
    println!();
    println!("{} {}", "Analyzed".bold(), path);
    println!();

    let stats = &report.stats;
    println!(
        "  {} entities across {} files ({} units)",
        stats.total_entities.to_string().bold(),
        stats.total_files,
        stats.total_units
    );
    for (kind, count) in &stats.entities_by_kind {
        println!("    {:<12} {}", kind, count);
    }

    println!(
        "  {} relationships",
        stats.total_relationships.to_string().bold()
    );
    for (kind, count) in &stats.relationships_by_kind {
        println!("    {:<12} {}", kind, count);
    }

    let both = report
        .entities
        .iter()
        .filter(|e| e.provenance == Provenance::Both)
        .count();
    let secondary_only = report
        .entities
        .iter()
        .filter(|e| e.provenance == Provenance::SecondaryOnly)
        .count();
    if both > 0 || secondary_only > 0 {
        println!(
            "  provenance: {} confirmed by both passes, {} secondary-only",
            both.to_string().green(),
            secondary_only
        );
    }

    if let Some(cf) = &report.control_flow {
        println!(
            "  control flow: {} functions, avg complexity {:.2}, max {}",
            cf.summary.total_functions, cf.summary.average_complexity, cf.summary.max_complexity
        );
        if cf.summary.total_unreachable_blocks > 0 {
            println!(
                "    {} unreachable blocks detected",
                cf.summary.total_unreachable_blocks.to_string().yellow()
            );
        }
    }

    if stats.units_skipped > 0 {
        println!(
            "  {} {} unit(s) skipped (parse failure)",
            "warning:".yellow(),
            stats.units_skipped
        );
    }
    if stats.units_degraded > 0 {
        println!(
            "  {} {} unit(s) degraded to primary-only output",
            "warning:".yellow(),
            stats.units_degraded
        );
    }
    println!();
}
