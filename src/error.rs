//! Error taxonomy for the extraction engine.
//!
//! All unit-scoped failures are absorbed into run statistics; the only
//! run-fatal condition is a run in which neither extractor produced a
//! single entity.

use std::time::Duration;
use thiserror::Error;

/// Failures scoped to a single compilation unit. Never fatal to the run.
#[derive(Error, Debug)]
pub enum UnitError {
    /// The upstream tree is malformed or unavailable; the unit is skipped.
    #[error("unit parse failure in {file}: {reason}")]
    ParseFailure { file: String, reason: String },

    /// The secondary pass exceeded its per-unit budget; the unit degrades
    /// to primary-only output.
    #[error("secondary pass timed out after {0:?}")]
    SecondaryTimeout(Duration),

    /// The secondary tool could not be invoked or produced unusable output.
    #[error("secondary pass unavailable: {0}")]
    SecondaryUnavailable(String),
}

/// Run-level failures.
#[derive(Error, Debug)]
pub enum RunError {
    /// Neither extractor produced any entity for the entire run.
    #[error("no usable output: neither extraction pass produced any entity")]
    NoUsableOutput,
}
