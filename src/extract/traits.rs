//! Core traits for the syntactic extraction pass.

use std::path::Path;

use crate::model::{Entity, FunctionFlow, IdAllocator, Relationship};

/// Holds a parsed tree-sitter tree and associated metadata for one
/// compilation unit.
///
/// This is kept separate from the extraction output so the tree can be
/// reused for multiple passes without re-parsing.
pub struct ParsedUnit {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source bytes (kept for node text extraction).
    pub source: Vec<u8>,
    /// The unit path (for record attribution and error reporting).
    pub path: String,
}

impl ParsedUnit {
    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }
}

/// Everything one extraction pass produces for one compilation unit.
///
/// Both the syntactic pass and the normalized output of the secondary
/// (semantic) pass use this contract, so the reconciler never depends on
/// either pass's internals.
#[derive(Debug, Clone, Default)]
pub struct UnitExtraction {
    /// Package/module the unit belongs to, when the language declares one.
    pub package: Option<String>,
    /// Entities in stable top-to-bottom declaration order.
    pub entities: Vec<Entity>,
    /// Relationships in body traversal order.
    pub relationships: Vec<Relationship>,
    /// Control-flow facts per callable (syntactic pass only).
    pub flows: Vec<FunctionFlow>,
    /// Count of optional fields dropped due to missing type information.
    pub type_resolution_gaps: usize,
}

impl UnitExtraction {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relationships.is_empty()
    }
}

/// Language-specific extractor for the syntactic pass.
///
/// Each language (Go, Python, ...) implements this trait. Implementations
/// must walk a unit to completion even when type information is partial:
/// missing type data degrades optional fields, never suppresses entity
/// emission.
///
/// # Thread Safety
///
/// tree_sitter::Parser is not Sync, so implementations create parsers as
/// needed rather than holding one.
pub trait UnitExtractor: Send + Sync {
    /// Returns the language identifier (e.g. "go", "python").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this extractor handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Parse a source file into a tree.
    ///
    /// Returns an error only when parsing fails completely; partial parse
    /// errors still yield a valid tree with ERROR nodes, which is walked
    /// normally.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedUnit>;

    /// Extract all records from a parsed unit.
    ///
    /// Ids are drawn from the caller-supplied allocator; no extractor holds
    /// id state of its own.
    fn extract(&self, unit: &ParsedUnit, ids: &mut IdAllocator) -> anyhow::Result<UnitExtraction>;

    /// Derive visibility from a declaration name per this language's
    /// naming convention. Languages with explicit modifiers resolve those
    /// before falling back here.
    fn visibility_of(&self, name: &str) -> crate::model::Visibility;

    /// Check if this extractor handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
