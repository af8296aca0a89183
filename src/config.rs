//! Run configuration for codegraph.
//!
//! Configuration lives in a YAML file discovered next to the analyzed
//! repository (or passed with `--config`); every field has a default so an
//! absent file means a plain primary-only run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default config file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["codegraph.yaml", ".codegraph.yaml"];

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Languages to extract; empty means every registered language.
    #[serde(default)]
    pub languages: Vec<String>,
    /// Glob patterns for paths to exclude from analysis
    /// (e.g. "**/vendor/**", "**/node_modules/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Whether to include test files in analysis (default: false)
    #[serde(default)]
    pub include_test_files: Option<bool>,
    #[serde(default)]
    pub control_flow: ControlFlowConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Returns whether to include test files (defaults to false).
    pub fn should_include_test_files(&self) -> bool {
        self.include_test_files.unwrap_or(false)
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }

    /// Check if a language is enabled.
    pub fn language_enabled(&self, language_id: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language_id)
    }
}

/// Control-flow analysis settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlFlowConfig {
    /// Whether to build per-function CFGs (default: false; the entity and
    /// relationship passes always run).
    #[serde(default)]
    pub enabled: bool,
}

impl Default for ControlFlowConfig {
    fn default() -> Self {
        Self { enabled: false }
    }
}

/// Settings for the out-of-process semantic pass.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecondaryConfig {
    /// Whether the secondary pass runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Tool executable; invoked as `<command> <args...> <unit-path>`.
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Per-unit budget; on expiry the unit degrades to primary-only.
    #[serde(default = "default_secondary_timeout_ms")]
    pub timeout_ms: u64,
    /// Concurrent tool invocations.
    #[serde(default = "default_secondary_concurrency")]
    pub concurrency: usize,
}

fn default_secondary_timeout_ms() -> u64 {
    30_000
}

fn default_secondary_concurrency() -> usize {
    4
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: String::new(),
            args: Vec::new(),
            timeout_ms: default_secondary_timeout_ms(),
            concurrency: default_secondary_concurrency(),
        }
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Minimum line-range overlap (fraction of the shorter span) for two
    /// entities to match across passes.
    #[serde(default = "default_min_overlap")]
    pub min_overlap: f64,
}

fn default_min_overlap() -> f64 {
    crate::reconcile::DEFAULT_MIN_OVERLAP
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            min_overlap: default_min_overlap(),
        }
    }
}

/// Validate a parsed config.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.secondary.enabled && config.secondary.command.trim().is_empty() {
        anyhow::bail!("secondary.enabled is set but secondary.command is empty");
    }
    if !(0.0..=1.0).contains(&config.reconcile.min_overlap) {
        anyhow::bail!(
            "reconcile.min_overlap must be within [0, 1], got {}",
            config.reconcile.min_overlap
        );
    }
    for language in &config.languages {
        if !matches!(language.as_str(), "go" | "python") {
            anyhow::bail!("unknown language {:?} (supported: go, python)", language);
        }
    }
    Ok(())
}
