//! Codegraph - static analysis extraction engine.
//!
//! Codegraph turns parsed syntax trees into typed structural records:
//! entities (functions, methods, types, interfaces, variables, constants),
//! directed relationships between them, and an approximate per-function
//! control-flow representation with complexity metrics. Two independent
//! passes - a fast syntactic one and a slower out-of-process semantic
//! one - are reconciled into a single canonical, confidence-scored set.
//!
//! # Architecture
//!
//! - `extract`: syntactic pass; per-language tree-sitter extractors
//! - `secondary`: client for the external semantic pass (per-unit
//!   timeout, bounded concurrency)
//! - `reconcile`: merge/dedup/confidence scoring across the two passes
//! - `flow`: coarse control-flow graphs and cyclomatic complexity
//! - `engine`: per-run orchestration and deterministic id collation
//! - `config`: YAML run configuration
//! - `report`: JSON artifact and terminal summary
//!
//! # Adding a New Language
//!
//! See `src/extract/languages/`. Implement the `UnitExtractor` trait
//! (including the language's visibility convention) and register it in
//! `languages/mod.rs`.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod flow;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod secondary;

pub use config::Config;
pub use engine::{AnalysisEngine, RunResult};
pub use error::{RunError, UnitError};
pub use extract::{
    get_extractor, register_extractors, GoExtractor, ParsedUnit, PythonExtractor, UnitExtraction,
    UnitExtractor,
};
pub use flow::ControlFlowBuilder;
pub use model::{
    CfgNode, CfgNodeKind, CfgResult, Entity, EntityKind, IdAllocator, RelationKind, Relationship,
    RunStats, Visibility,
};
pub use reconcile::{EntityReconciler, HybridEntity, HybridRelationship, Provenance};
pub use secondary::SecondaryClient;

/// Initialize all subsystems.
///
/// Call this once at startup.
pub fn init() {
    register_extractors();
}
