//! Client for the out-of-process semantic extraction pass.
//!
//! The deeper pass is an external tool (a type-checked program
//! representation or CPG-class analyzer) invoked once per compilation
//! unit. It emits raw entity and edge records as JSON on stdout; this
//! module normalizes them into the same `UnitExtraction` contract the
//! syntactic pass produces, so the reconciler never sees tool-specific
//! shapes.
//!
//! Every failure mode here - missing binary, non-zero exit, undecodable
//! output, per-unit timeout - degrades the unit to primary-only output.
//! Nothing in this module can abort a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::config::SecondaryConfig;
use crate::extract::UnitExtraction;
use crate::model::{
    Entity, EntityKind, IdAllocator, RelationKind, Relationship, Visibility,
};

/// Errors from one secondary invocation. All unit-scoped.
#[derive(Error, Debug)]
pub enum SecondaryError {
    #[error("failed to invoke secondary tool: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("secondary tool exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("secondary tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("undecodable secondary output: {0}")]
    Decode(#[from] serde_json::Error),
}

impl SecondaryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SecondaryError::Timeout(_))
    }
}

/// Raw entity record as emitted by the external tool.
#[derive(Debug, Deserialize)]
struct RawEntity {
    id: String,
    name: String,
    kind: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<usize>,
    #[serde(default)]
    end_line: Option<usize>,
    #[serde(default)]
    package: Option<String>,
    #[serde(default)]
    signature: Option<String>,
    #[serde(default)]
    return_type: Option<String>,
    #[serde(default)]
    receiver: Option<String>,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

/// Raw edge record as emitted by the external tool.
#[derive(Debug, Deserialize)]
struct RawEdge {
    source_id: String,
    target_id: String,
    #[serde(rename = "type")]
    edge_type: String,
    #[serde(default)]
    line: Option<usize>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

/// Top-level document on the tool's stdout.
#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    edges: Vec<RawEdge>,
}

/// Client that drives the external tool, one invocation per unit, under a
/// per-unit timeout and bounded concurrency.
pub struct SecondaryClient {
    command: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    concurrency: usize,
    runtime: tokio::runtime::Runtime,
}

impl SecondaryClient {
    pub fn new(config: &SecondaryConfig) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            command: PathBuf::from(&config.command),
            args: config.args.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
            concurrency: config.concurrency.max(1),
            runtime,
        })
    }

    /// Run the tool for one unit and normalize its output.
    pub fn extract_unit(&self, unit_path: &Path) -> Result<UnitExtraction, SecondaryError> {
        self.runtime.block_on(self.run_unit(unit_path))
    }

    /// Run the tool for many units with bounded concurrency.
    ///
    /// Results come back in input order regardless of completion order, so
    /// downstream processing stays deterministic.
    pub fn extract_all(
        &self,
        unit_paths: &[PathBuf],
    ) -> Vec<Result<UnitExtraction, SecondaryError>> {
        use futures::stream::{self, StreamExt};

        self.runtime.block_on(async {
            let mut slots: Vec<Option<Result<UnitExtraction, SecondaryError>>> =
                (0..unit_paths.len()).map(|_| None).collect();

            let mut stream = stream::iter(
                unit_paths
                    .iter()
                    .enumerate()
                    .map(|(i, path)| async move { (i, self.run_unit(path).await) }),
            )
            .buffer_unordered(self.concurrency);

            while let Some((i, result)) = stream.next().await {
                slots[i] = Some(result);
            }

            slots.into_iter().flatten().collect()
        })
    }

    async fn run_unit(&self, unit_path: &Path) -> Result<UnitExtraction, SecondaryError> {
        let mut command = tokio::process::Command::new(&self.command);
        command
            .args(&self.args)
            .arg(unit_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(SecondaryError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(SecondaryError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let document: RawDocument = serde_json::from_slice(&output.stdout)?;
        Ok(normalize(document, &unit_path.to_string_lossy()))
    }
}

/// Translate the tool's records into the shared extraction contract.
///
/// Local ids are re-issued from the standard allocator scheme; the tool's
/// own ids survive only long enough to resolve its edges.
fn normalize(document: RawDocument, unit_path: &str) -> UnitExtraction {
    let mut out = UnitExtraction::default();
    let mut ids = IdAllocator::new();

    // Tool id -> (local id, name), for edge resolution.
    let mut by_tool_id: BTreeMap<String, (String, String)> = BTreeMap::new();

    for raw in document.entities {
        let kind = match normalize_kind(&raw.kind, raw.receiver.is_some()) {
            Some(k) => k,
            None => continue,
        };
        let start_line = raw.line.unwrap_or(0);
        let end_line = raw.end_line.unwrap_or(start_line).max(start_line);
        let local_id = ids.next_entity(kind);
        by_tool_id.insert(raw.id.clone(), (local_id.clone(), raw.name.clone()));

        if out.package.is_none() {
            out.package = raw.package.clone();
        }

        let visibility = derive_visibility(&raw);
        out.entities.push(Entity {
            id: local_id,
            name: raw.name,
            kind,
            package: raw.package.unwrap_or_default(),
            file: raw.file.unwrap_or_else(|| unit_path.to_string()),
            start_line,
            end_line,
            signature: raw.signature,
            return_type: if kind.class() == crate::model::KindClass::TypeLike {
                None
            } else {
                raw.return_type
            },
            receiver: raw.receiver,
            fields: Vec::new(),
            methods: Vec::new(),
            doc: raw.doc,
            visibility,
            metadata: raw.properties,
        });
    }

    for raw in document.edges {
        let kind = match normalize_edge_type(&raw.edge_type) {
            Some(k) => k,
            None => continue,
        };
        let (source_id, source_name) = match by_tool_id.get(&raw.source_id) {
            Some(pair) => pair.clone(),
            None => continue,
        };
        // Edges whose target id is unknown in the payload have no name to
        // record and are dropped here; unresolved-but-named targets are
        // the reconciler's concern.
        let target_name = match by_tool_id.get(&raw.target_id) {
            Some((_, name)) => name.clone(),
            None => continue,
        };

        out.relationships.push(Relationship {
            id: ids.next_relationship(),
            source_id,
            source_name,
            target_name,
            kind,
            line: raw.line.unwrap_or(0),
            metadata: raw.properties,
        });
    }

    out
}

/// Map the tool's entity kind vocabulary onto the shared model.
fn normalize_kind(kind: &str, has_receiver: bool) -> Option<EntityKind> {
    match kind.to_ascii_uppercase().as_str() {
        "METHOD" | "FUNCTION" | "FUNC" => {
            if has_receiver {
                Some(EntityKind::Method)
            } else {
                Some(EntityKind::Function)
            }
        }
        "TYPE_DECL" | "TYPE" | "STRUCT" | "CLASS" => Some(EntityKind::Type),
        "INTERFACE" => Some(EntityKind::Interface),
        "VARIABLE" | "VAR" => Some(EntityKind::Variable),
        "CONSTANT" | "CONST" => Some(EntityKind::Constant),
        // Locals, literals, and tool-internal node kinds carry no
        // declaration-level meaning here.
        _ => None,
    }
}

/// Map the tool's edge vocabulary onto the shared relationship kinds.
fn normalize_edge_type(edge_type: &str) -> Option<RelationKind> {
    match edge_type.to_ascii_uppercase().as_str() {
        "CALL" | "CALLS" => Some(RelationKind::Calls),
        "METHOD_CALL" => Some(RelationKind::MethodCall),
        "AST" | "CONTAINS" => Some(RelationKind::Contains),
        "INHERITS_FROM" | "IMPLEMENTS" => Some(RelationKind::Implements),
        "BINDS" | "DEFINES_METHOD" => Some(RelationKind::DefinesMethod),
        _ => None,
    }
}

/// The tool may report visibility directly; otherwise fall back to the
/// exported-identifier casing convention.
fn derive_visibility(raw: &RawEntity) -> Visibility {
    match raw.properties.get("visibility").map(String::as_str) {
        Some("public") => Visibility::Public,
        Some("private") => Visibility::Private,
        _ => {
            if raw
                .name
                .chars()
                .next()
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
            {
                Visibility::Public
            } else {
                Visibility::Private
            }
        }
    }
}
