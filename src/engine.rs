//! Run orchestration: extraction, reconciliation, control flow, collation.
//!
//! Compilation units are independently analyzable, so the primary pass
//! runs across units in parallel with per-unit id allocators. Final ids
//! are assigned afterwards in a single-threaded collation pass over units
//! in input order, which keeps output identical run to run regardless of
//! worker scheduling.

use std::path::PathBuf;

use rayon::prelude::*;

use crate::config::Config;
use crate::error::{RunError, UnitError};
use crate::extract::{get_extractor, UnitExtraction};
use crate::flow::ControlFlowBuilder;
use crate::model::{CfgResult, IdAllocator, RunStats};
use crate::reconcile::{EntityReconciler, HybridEntity, HybridRelationship};
use crate::secondary::SecondaryClient;

/// The complete output of one analysis run.
#[derive(Debug, Default)]
pub struct RunResult {
    pub entities: Vec<HybridEntity>,
    pub relationships: Vec<HybridRelationship>,
    pub control_flow: Vec<CfgResult>,
    pub stats: RunStats,
    /// Unit-scoped failures absorbed during the run, for observability.
    pub unit_errors: Vec<UnitError>,
}

/// One unit's primary-pass output, carried between pipeline phases.
struct UnitOutput {
    path: PathBuf,
    extraction: UnitExtraction,
}

/// Orchestrates the full per-run pipeline.
pub struct AnalysisEngine {
    config: Config,
}

impl AnalysisEngine {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Analyze a set of compilation units into one canonical record set.
    ///
    /// Unit-level failures are absorbed and counted; the only fatal
    /// condition is a run in which neither pass produced any entity.
    pub fn analyze(&self, unit_paths: &[PathBuf]) -> Result<RunResult, RunError> {
        let mut result = RunResult::default();
        result.stats.total_units = unit_paths.len();

        // Phase 1: primary extraction, parallel across units. Each unit
        // gets a local id allocator; order is restored by collecting into
        // input order.
        let primary: Vec<Result<UnitOutput, UnitError>> = unit_paths
            .par_iter()
            .map(|path| self.extract_primary(path))
            .collect();

        let mut units: Vec<UnitOutput> = Vec::with_capacity(primary.len());
        for outcome in primary {
            match outcome {
                Ok(unit) => units.push(unit),
                Err(err) => {
                    result.stats.units_skipped += 1;
                    result.unit_errors.push(err);
                }
            }
        }

        // Phase 2: secondary extraction, bounded concurrency with a
        // per-unit timeout. Any failure degrades that unit to
        // primary-only.
        let secondary = self.extract_secondary(&units, &mut result);

        // Phase 3: single-threaded collation. One global allocator
        // assigns final ids in unit order; reconciliation and control
        // flow run per unit.
        let reconciler = EntityReconciler::with_min_overlap(self.config.reconcile.min_overlap);
        let mut ids = IdAllocator::new();

        for (i, unit) in units.iter().enumerate() {
            let secondary_extraction = secondary.get(i).and_then(|s| s.as_ref());
            let outcome =
                reconciler.reconcile(&unit.extraction, secondary_extraction, &mut ids);

            if self.config.control_flow.enabled {
                for flow in &unit.extraction.flows {
                    let mut cfg = ControlFlowBuilder::build(flow);
                    // Flow facts are keyed by raw primary ids; rewrite to
                    // the canonical id assigned during reconciliation.
                    if let Some(canonical) = outcome.primary_id_map.get(&cfg.function_id) {
                        cfg.function_id = canonical.clone();
                    }
                    result.control_flow.push(cfg);
                }
            }

            result.stats.type_resolution_gaps += unit.extraction.type_resolution_gaps;
            result.entities.extend(outcome.entities);
            result.relationships.extend(outcome.relationships);
        }

        if result.entities.is_empty() {
            return Err(RunError::NoUsableOutput);
        }

        finalize_stats(&mut result);
        Ok(result)
    }

    fn extract_primary(&self, path: &PathBuf) -> Result<UnitOutput, UnitError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let extractor = get_extractor(ext).ok_or_else(|| UnitError::ParseFailure {
            file: path.display().to_string(),
            reason: format!("no extractor registered for extension {:?}", ext),
        })?;

        if !self.config.language_enabled(extractor.language_id()) {
            return Err(UnitError::ParseFailure {
                file: path.display().to_string(),
                reason: format!("language {:?} disabled by config", extractor.language_id()),
            });
        }

        let source = std::fs::read(path).map_err(|e| UnitError::ParseFailure {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let parsed = extractor
            .parse(path, &source)
            .map_err(|e| UnitError::ParseFailure {
                file: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut ids = IdAllocator::new();
        let extraction =
            extractor
                .extract(&parsed, &mut ids)
                .map_err(|e| UnitError::ParseFailure {
                    file: path.display().to_string(),
                    reason: e.to_string(),
                })?;

        Ok(UnitOutput {
            path: path.clone(),
            extraction,
        })
    }

    /// Run the secondary pass for every surviving unit. The returned list
    /// is parallel to `units`; None marks a degraded unit.
    fn extract_secondary(
        &self,
        units: &[UnitOutput],
        result: &mut RunResult,
    ) -> Vec<Option<UnitExtraction>> {
        if !self.config.secondary.enabled || units.is_empty() {
            return vec![None; units.len()];
        }

        let client = match SecondaryClient::new(&self.config.secondary) {
            Ok(c) => c,
            Err(e) => {
                // The tool could not be set up at all: every unit degrades.
                result.stats.units_degraded += units.len();
                result
                    .unit_errors
                    .push(UnitError::SecondaryUnavailable(e.to_string()));
                return vec![None; units.len()];
            }
        };

        let paths: Vec<PathBuf> = units.iter().map(|u| u.path.clone()).collect();
        client
            .extract_all(&paths)
            .into_iter()
            .map(|outcome| match outcome {
                Ok(extraction) => Some(extraction),
                Err(err) => {
                    result.stats.units_degraded += 1;
                    result.unit_errors.push(if err.is_timeout() {
                        UnitError::SecondaryTimeout(std::time::Duration::from_millis(
                            self.config.secondary.timeout_ms,
                        ))
                    } else {
                        UnitError::SecondaryUnavailable(err.to_string())
                    });
                    None
                }
            })
            .collect()
    }
}

/// Fill in the aggregate counters once the record set is final.
fn finalize_stats(result: &mut RunResult) {
    let stats = &mut result.stats;
    stats.total_entities = result.entities.len();
    stats.total_relationships = result.relationships.len();

    let mut files = std::collections::BTreeSet::new();
    for hybrid in &result.entities {
        files.insert(hybrid.entity.file.clone());
        *stats
            .entities_by_kind
            .entry(hybrid.entity.kind.as_str().to_string())
            .or_insert(0) += 1;
    }
    stats.total_files = files.len();

    for hybrid in &result.relationships {
        *stats
            .relationships_by_kind
            .entry(hybrid.relationship.kind.as_str().to_string())
            .or_insert(0) += 1;
    }
}
