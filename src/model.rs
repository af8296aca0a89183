//! Core record types emitted by the extraction engine.
//!
//! Every record here is created once per analysis run and never mutated
//! afterwards; the engine hands the finished lists to the output boundary
//! and keeps no state across runs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of extracted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Method,
    Type,
    Interface,
    Variable,
    Constant,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Method => "method",
            EntityKind::Type => "type",
            EntityKind::Interface => "interface",
            EntityKind::Variable => "variable",
            EntityKind::Constant => "constant",
        }
    }

    /// Check if this is a callable (function or method).
    pub fn is_callable(&self) -> bool {
        matches!(self, EntityKind::Function | EntityKind::Method)
    }

    /// The coarse class used for cross-source matching.
    ///
    /// `Callable` collapses function/method and `TypeLike` collapses
    /// type/interface; the classes never cross-match.
    pub fn class(&self) -> KindClass {
        match self {
            EntityKind::Function | EntityKind::Method => KindClass::Callable,
            EntityKind::Type | EntityKind::Interface => KindClass::TypeLike,
            EntityKind::Variable | EntityKind::Constant => KindClass::Value,
        }
    }

    /// Prefix used for run-scoped ids of this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            EntityKind::Function => "func",
            EntityKind::Method => "method",
            EntityKind::Type => "type",
            EntityKind::Interface => "interface",
            EntityKind::Variable => "var",
            EntityKind::Constant => "const",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse kind class for entity matching across extraction sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    Callable,
    TypeLike,
    Value,
}

/// Entity visibility, derived from an explicit modifier where the language
/// has one, otherwise from the language's naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structural declaration extracted from a compilation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Run-scoped unique id (e.g. `func_3`).
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    /// Owning package or module.
    pub package: String,
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Receiver/owner type; present exactly for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Field names for struct-like types (embedded fields get a synthetic
    /// `embedded_<Type>` name and a metadata flag).
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<String>,
    /// Method names for interfaces.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub methods: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl Entity {
    /// Line span length, inclusive of both endpoints.
    pub fn span_len(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Kind of directed relationship between a source entity and a target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Calls,
    MethodCall,
    Implements,
    DefinesMethod,
    Contains,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Calls => "calls",
            RelationKind::MethodCall => "method_call",
            RelationKind::Implements => "implements",
            RelationKind::DefinesMethod => "defines_method",
            RelationKind::Contains => "contains",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge from a source entity to a target identified by name.
///
/// Target resolution to a concrete entity id is a downstream concern; the
/// engine only records the name as written at the use site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: String,
    pub source_id: String,
    /// Denormalized source name for diagnostics.
    pub source_name: String,
    pub target_name: String,
    pub kind: RelationKind,
    pub line: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl Relationship {
    /// Dedup key: two relationships are duplicates iff these four fields
    /// are equal.
    pub fn dedup_key(&self) -> (String, String, RelationKind, usize) {
        (
            self.source_id.clone(),
            self.target_name.clone(),
            self.kind,
            self.line,
        )
    }
}

/// Kind of a coarse control-flow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CfgNodeKind {
    Entry,
    Exit,
    If,
    For,
    Range,
    Switch,
    Return,
    Statement,
}

impl CfgNodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CfgNodeKind::Entry => "entry",
            CfgNodeKind::Exit => "exit",
            CfgNodeKind::If => "if",
            CfgNodeKind::For => "for",
            CfgNodeKind::Range => "range",
            CfgNodeKind::Switch => "switch",
            CfgNodeKind::Return => "return",
            CfgNodeKind::Statement => "statement",
        }
    }

    /// Synthetic nodes are never reported as unreachable.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, CfgNodeKind::Entry | CfgNodeKind::Exit)
    }
}

/// One coarse control-flow unit inside a function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgNode {
    /// Monotonic, 0-based, per function.
    pub id: usize,
    pub kind: CfgNodeKind,
    /// One-line text summary of the statement.
    pub summary: String,
    pub line: usize,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

/// Control-flow result for one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfgResult {
    pub function_id: String,
    pub function_name: String,
    pub nodes: Vec<CfgNode>,
    /// Estimate: node count plus a fixed per-construct contribution, not an
    /// exact edge enumeration.
    pub edge_count: usize,
    pub cyclomatic_complexity: u32,
    pub unreachable_blocks: Vec<usize>,
}

/// Kind of a top-level statement as seen by the control-flow builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    If,
    For,
    Range,
    Switch,
    Return,
    Statement,
}

/// Summary of one top-level statement in a function body.
#[derive(Debug, Clone)]
pub struct FlowStatement {
    pub kind: FlowKind,
    pub line: usize,
    pub summary: String,
}

/// Control-flow facts recorded per callable by the language extractor.
///
/// Only top-level statements appear in `statements`; nested structure is
/// summarized into the counters.
#[derive(Debug, Clone, Default)]
pub struct FlowFacts {
    pub statements: Vec<FlowStatement>,
    /// Decision points anywhere in the body, nested included
    /// (if, for, range, switch, type-switch, select).
    pub decision_points: u32,
    /// Fixed per-construct edge contribution (2 per if/loop/switch).
    pub branch_estimate: u32,
    pub body_end_line: usize,
}

impl FlowFacts {
    /// Cyclomatic complexity = decision points + 1.
    pub fn cyclomatic_complexity(&self) -> u32 {
        self.decision_points + 1
    }
}

/// Flow facts tied to the callable entity they were extracted from.
#[derive(Debug, Clone)]
pub struct FunctionFlow {
    pub function_id: String,
    pub function_name: String,
    pub start_line: usize,
    pub facts: FlowFacts,
}

/// Run-scoped id allocation, one monotonic counter per record kind.
///
/// An allocator is threaded explicitly through extraction calls; parallel
/// runs use one per worker and the engine reassigns final ids in a
/// single-threaded collation pass.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: BTreeMap<&'static str, u64>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for the given kind prefix, e.g. `func_1`.
    pub fn next(&mut self, prefix: &'static str) -> String {
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{}_{}", prefix, counter)
    }

    pub fn next_entity(&mut self, kind: EntityKind) -> String {
        self.next(kind.id_prefix())
    }

    pub fn next_relationship(&mut self) -> String {
        self.next("rel")
    }
}

/// Statistics for one analysis run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_units: usize,
    pub total_files: usize,
    pub total_entities: usize,
    pub total_relationships: usize,
    pub entities_by_kind: BTreeMap<String, usize>,
    pub relationships_by_kind: BTreeMap<String, usize>,
    /// Units skipped because the upstream tree was malformed or unavailable.
    pub units_skipped: usize,
    /// Units degraded to primary-only output (secondary failure/timeout).
    pub units_degraded: usize,
    /// Optional fields dropped because type information was incomplete.
    pub type_resolution_gaps: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_allocator_scoped_by_kind() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next_entity(EntityKind::Function), "func_1");
        assert_eq!(ids.next_entity(EntityKind::Type), "type_1");
        assert_eq!(ids.next_entity(EntityKind::Function), "func_2");
        assert_eq!(ids.next_relationship(), "rel_1");
        assert_eq!(ids.next_relationship(), "rel_2");
    }

    #[test]
    fn test_kind_class_collapse() {
        assert_eq!(EntityKind::Function.class(), EntityKind::Method.class());
        assert_eq!(EntityKind::Type.class(), EntityKind::Interface.class());
        assert_ne!(EntityKind::Function.class(), EntityKind::Interface.class());
        assert_eq!(EntityKind::Variable.class(), EntityKind::Constant.class());
        assert_ne!(EntityKind::Variable.class(), EntityKind::Function.class());
    }

    #[test]
    fn test_flow_facts_complexity() {
        let facts = FlowFacts::default();
        assert_eq!(facts.cyclomatic_complexity(), 1);

        let facts = FlowFacts {
            decision_points: 3,
            ..Default::default()
        };
        assert_eq!(facts.cyclomatic_complexity(), 4);
    }

    #[test]
    fn test_entity_span_len() {
        let entity = Entity {
            id: "func_1".to_string(),
            name: "main".to_string(),
            kind: EntityKind::Function,
            package: "main".to_string(),
            file: "main.go".to_string(),
            start_line: 10,
            end_line: 14,
            signature: None,
            return_type: None,
            receiver: None,
            fields: Vec::new(),
            methods: Vec::new(),
            doc: None,
            visibility: Visibility::Private,
            metadata: BTreeMap::new(),
        };
        assert_eq!(entity.span_len(), 5);
    }
}
