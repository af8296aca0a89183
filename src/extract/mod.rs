//! Syntactic extraction pass.
//!
//! This module turns one parsed compilation unit into typed structural
//! records: entities, relationships, and per-callable control-flow facts.
//! It is the fast, always-available half of the hybrid pipeline; the
//! slower semantic pass lives in `crate::secondary` and shares the same
//! output contract.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌────────────────┐
//! │ Source Unit  │────▶│ UnitExtractor │────▶│ UnitExtraction │
//! └──────────────┘     │ (Go, Python)  │     │ (entities,     │
//!                      └───────────────┘     │  relationships,│
//!                                            │  flow facts)   │
//!                                            └────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/extract/languages/`
//! 2. Implement the `UnitExtractor` trait, including the language's
//!    visibility convention
//! 3. Register the extractor in `languages/mod.rs`
//!
//! See `languages/go.rs` for a reference implementation.

mod languages;
mod traits;

pub use languages::{
    get_extractor, register_extractors, registered_extensions, GoExtractor, PythonExtractor,
};
pub use traits::{ParsedUnit, UnitExtraction, UnitExtractor};
