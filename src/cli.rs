//! Command-line interface for codegraph.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{self, Config, DEFAULT_CONFIG_NAMES};
use crate::engine::AnalysisEngine;
use crate::extract;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_NO_OUTPUT: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Static analysis extraction engine.
///
/// Codegraph walks a source repository, extracts structural entities and
/// relationships from each compilation unit with a fast syntactic pass,
/// optionally reconciles them against a deeper out-of-process semantic
/// pass, and emits one canonical confidence-scored record set for graph
/// import and visualization.
#[derive(Parser)]
#[command(name = "codegraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a repository or file into graph records
    #[command(visible_alias = "extract")]
    Analyze(AnalyzeArgs),
    /// Create a starter codegraph configuration file
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Write the JSON artifact to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable the secondary (semantic) pass for this run
    #[arg(long)]
    pub no_secondary: bool,

    /// Build per-function control-flow graphs
    #[arg(long)]
    pub enable_cfg: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "codegraph.yaml")]
    pub output: PathBuf,
}

/// Starter configuration written by `init`.
const DEFAULT_TEMPLATE: &str = include_str!("templates/default.yaml");

/// Discover a config file in the current directory.
fn discover_config() -> Option<PathBuf> {
    for name in DEFAULT_CONFIG_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Collect compilation units to analyze.
fn collect_units(
    root: &Path,
    config: &Config,
    include_test_files: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    let supported = extract::registered_extensions();
    let mut units = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            // Skip hidden directories
            if e.file_type().is_dir() && name.starts_with('.') {
                return false;
            }
            // Skip vendor and dependency directories
            if e.file_type().is_dir()
                && (name == "vendor" || name == "node_modules" || name == "__pycache__")
            {
                return false;
            }
            true
        })
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !supported.contains(&ext) {
            continue;
        }
        if let Some(extractor) = extract::get_extractor(ext) {
            if !config.language_enabled(extractor.language_id()) {
                continue;
            }
        }
        if config.is_path_excluded(path) {
            continue;
        }
        if !include_test_files {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with("_test.go") || name.starts_with("test_") {
                continue;
            }
        }
        units.push(path.to_path_buf());
    }

    Ok(units)
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    crate::init();

    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    // Load config: explicit path, discovered file, or defaults.
    let mut config = match &args.config {
        Some(p) => match Config::parse_file(p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error parsing config: {}", e);
                return Ok(EXIT_ERROR);
            }
        },
        None => match discover_config() {
            Some(p) => match Config::parse_file(&p) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error parsing {}: {}", p.display(), e);
                    return Ok(EXIT_ERROR);
                }
            },
            None => Config::default(),
        },
    };

    if args.no_secondary {
        config.secondary.enabled = false;
    }
    if args.enable_cfg {
        config.control_flow.enabled = true;
    }

    if let Err(e) = config::validate(&config) {
        eprintln!("Error: invalid config: {}", e);
        return Ok(EXIT_ERROR);
    }

    // Resolve path
    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };

    let units = if metadata.is_dir() {
        collect_units(&args.path, &config, config.should_include_test_files())?
    } else {
        vec![args.path.clone()]
    };

    if units.is_empty() {
        eprintln!("Warning: no compilation units to analyze");
        return Ok(EXIT_NO_OUTPUT);
    }

    let progress = ProgressBar::new(units.len() as u64).with_style(
        ProgressStyle::with_template("{spinner} analyzing {pos}/{len} units")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(120));

    let engine = AnalysisEngine::new(config);
    let result = match engine.analyze(&units) {
        Ok(r) => r,
        Err(e) => {
            progress.finish_and_clear();
            eprintln!("Error: {}", e);
            return Ok(EXIT_NO_OUTPUT);
        }
    };
    progress.finish_and_clear();

    let report = report::build_report(result);
    let path_str = args.path.to_string_lossy().to_string();

    match (&args.output, args.format.as_str()) {
        (Some(out), _) => {
            let file = std::fs::File::create(out)?;
            report::write_json(file, &report)?;
            if args.format == "pretty" {
                report::write_pretty(&path_str, &report);
            }
        }
        (None, "json") => {
            report::write_json(std::io::stdout().lock(), &report)?;
            println!();
        }
        _ => {
            report::write_pretty(&path_str, &report);
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(&args.output, DEFAULT_TEMPLATE)?;

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to configure languages and the secondary pass", args.output.display());
    println!("  2. Run: codegraph analyze . --config {}", args.output.display());

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_units_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.go"), "package main\n").unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\n").unwrap();
        fs::write(temp.path().join("notes.txt"), "skip me\n").unwrap();
        fs::write(temp.path().join("a_test.go"), "package main\n").unwrap();
        fs::create_dir(temp.path().join("vendor")).unwrap();
        fs::write(temp.path().join("vendor/dep.go"), "package dep\n").unwrap();

        let units = collect_units(temp.path(), &Config::default(), false).unwrap();
        let names: Vec<_> = units
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.go"]);
    }

    #[test]
    fn test_collect_units_respects_excluded_paths() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("gen")).unwrap();
        fs::write(temp.path().join("gen/x.go"), "package gen\n").unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();

        let config = Config {
            excluded_paths: vec!["**/gen/**".to_string()],
            ..Default::default()
        };
        let units = collect_units(temp.path(), &config, false).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].ends_with("main.go"));
    }
}
