//! Go syntactic extractor using tree-sitter.
//!
//! Extracts:
//! - Function and method declarations (receiver, signature, return type)
//! - Struct and interface declarations (fields, method sets)
//! - Variable and constant declarations
//! - Call relationships from function bodies
//! - Control-flow facts per callable for the CFG builder

use std::collections::BTreeMap;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::extract::{ParsedUnit, UnitExtraction, UnitExtractor};
use crate::model::{
    Entity, EntityKind, FlowFacts, FlowKind, FlowStatement, FunctionFlow, IdAllocator,
    RelationKind, Relationship, Visibility,
};

/// Go predeclared functions; calls to these are tagged in metadata.
static GO_BUILTINS: phf::Set<&'static str> = phf::phf_set! {
    "append", "cap", "clear", "close", "complex", "copy", "delete", "imag",
    "len", "make", "max", "min", "new", "panic", "print", "println",
    "real", "recover",
};

/// Tree-sitter query for top-level Go declarations.
const DECLARATION_QUERY: &str = r#"
; Function declarations
(function_declaration
  name: (identifier) @func_name
) @function

; Method declarations (with receiver)
(method_declaration
  receiver: (parameter_list
    (parameter_declaration
      type: [
        (pointer_type (type_identifier) @receiver_type)
        (type_identifier) @receiver_type
      ]
    )
  )
  name: (field_identifier) @method_name
) @method

; Type declarations
(type_declaration
  (type_spec
    name: (type_identifier) @type_name
    type: (struct_type) @struct_body
  )
) @struct

(type_declaration
  (type_spec
    name: (type_identifier) @type_name
    type: (interface_type) @interface_body
  )
) @interface

(type_declaration
  (type_spec
    name: (type_identifier) @type_name
    type: (_) @alias_type
  )
) @type_alias

; Constant declarations
(const_declaration
  (const_spec
    name: (identifier) @const_name
  ) @const_spec
) @const

; Variable declarations
(var_declaration
  (var_spec
    name: (identifier) @var_name
  ) @var_spec
) @var
"#;

/// Tree-sitter query for package declaration.
const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @package_name
)
"#;

/// Tree-sitter query for call expressions inside a function body.
const CALL_QUERY: &str = r#"
(call_expression
  function: (identifier) @callee
) @call

(call_expression
  function: (selector_expression
    operand: (_) @call_operand
    field: (field_identifier) @call_method
  )
) @method_call
"#;

/// Tree-sitter query for decision points (complexity and edge estimate).
const DECISION_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @loop
(expression_switch_statement) @switch
(type_switch_statement) @switch
(select_statement) @switch
"#;

/// Go syntactic extractor.
pub struct GoExtractor {
    language: Language,
}

impl GoExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Extract the package name from a parsed unit.
    fn extract_package(&self, unit: &ParsedUnit) -> Option<String> {
        let query = Query::new(&self.language, PACKAGE_QUERY).ok()?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, unit.tree.root_node(), &unit.source[..]);

        if let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                if name == "package_name" {
                    return Some(unit.node_text(capture.node).to_string());
                }
            }
        }
        None
    }

    /// Extract all declarations and body relationships from a unit.
    fn extract_declarations(
        &self,
        unit: &ParsedUnit,
        package: &str,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let query = Query::new(&self.language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, unit.tree.root_node(), &unit.source[..]);

        // Collected first so records can be sorted into source order before
        // ids are assigned; assignment order is what makes ids stable.
        let mut pending: Vec<PendingDecl> = Vec::new();
        let mut seen_positions = std::collections::HashSet::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut kind = EntityKind::Function;
            let mut decl_node = None;
            let mut spec_node = None;
            let mut body_node = None;
            let mut receiver = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => {
                        name = unit.node_text(capture.node).to_string();
                        kind = EntityKind::Function;
                    }
                    "method_name" => {
                        name = unit.node_text(capture.node).to_string();
                        kind = EntityKind::Method;
                    }
                    "receiver_type" => {
                        receiver = Some(unit.node_text(capture.node).to_string());
                    }
                    "type_name" => {
                        name = unit.node_text(capture.node).to_string();
                    }
                    "const_name" => {
                        name = unit.node_text(capture.node).to_string();
                        kind = EntityKind::Constant;
                    }
                    "var_name" => {
                        name = unit.node_text(capture.node).to_string();
                        kind = EntityKind::Variable;
                    }
                    "function" | "method" => {
                        decl_node = Some(capture.node);
                    }
                    "struct" => {
                        decl_node = Some(capture.node);
                        kind = EntityKind::Type;
                    }
                    "interface" => {
                        decl_node = Some(capture.node);
                        kind = EntityKind::Interface;
                    }
                    "type_alias" => {
                        decl_node = Some(capture.node);
                        kind = EntityKind::Type;
                    }
                    "const" | "var" => {
                        decl_node = Some(capture.node);
                    }
                    "struct_body" | "interface_body" | "alias_type" | "const_spec"
                    | "var_spec" => {
                        spec_node = Some(capture.node);
                    }
                    _ => {}
                }
            }

            let decl_node = match decl_node {
                Some(n) if !name.is_empty() => n,
                _ => continue,
            };

            // Struct/interface declarations also match the alias pattern;
            // the first (more specific) match wins.
            let pos_key = (decl_node.start_byte(), name.clone());
            if !seen_positions.insert(pos_key) {
                continue;
            }

            if kind.is_callable() {
                body_node = decl_node
                    .children(&mut decl_node.walk())
                    .find(|n| n.kind() == "block");
            }

            pending.push(PendingDecl {
                name,
                kind,
                receiver,
                decl_node,
                spec_node,
                body_node,
            });
        }

        // Stable top-to-bottom declaration order. Specs inside grouped
        // var/const blocks order by their own position, not the block's.
        pending.sort_by_key(|d| {
            (
                d.spec_node.unwrap_or(d.decl_node).start_byte(),
                d.name.clone(),
            )
        });

        for decl in pending {
            let entity_id = ids.next_entity(decl.kind);
            let entity = self.build_entity(unit, package, &entity_id, &decl, out)?;

            if decl.kind.is_callable() {
                if let Some(body) = decl.body_node {
                    self.extract_calls(unit, &entity, body, ids, out)?;
                    out.flows.push(FunctionFlow {
                        function_id: entity.id.clone(),
                        function_name: entity.name.clone(),
                        start_line: entity.start_line,
                        facts: self.extract_flow_facts(unit, body)?,
                    });
                }
            }

            out.entities.push(entity);
        }

        Ok(())
    }

    /// Build one entity record from a pending declaration.
    fn build_entity(
        &self,
        unit: &ParsedUnit,
        package: &str,
        entity_id: &str,
        decl: &PendingDecl,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<Entity> {
        let node = decl.decl_node;
        let mut metadata = BTreeMap::new();
        let mut fields = Vec::new();
        let mut methods = Vec::new();
        let mut signature = None;
        let mut return_type = None;

        match decl.kind {
            EntityKind::Function | EntityKind::Method => {
                signature = self.function_signature(unit, node);
                return_type = node
                    .child_by_field_name("result")
                    .map(|r| unit.node_text(r).to_string());
                if signature.is_none() {
                    out.type_resolution_gaps += 1;
                }
                let params = self.parameter_types(unit, node);
                if !params.is_empty() {
                    metadata.insert("parameters".to_string(), params.join(","));
                }
            }
            EntityKind::Type => {
                if let Some(spec) = decl.spec_node {
                    if spec.kind() == "struct_type" {
                        metadata.insert("kind".to_string(), "struct".to_string());
                        self.struct_fields(unit, spec, &mut fields, &mut metadata);
                    } else {
                        metadata.insert("kind".to_string(), "alias".to_string());
                        metadata.insert(
                            "underlying_type".to_string(),
                            unit.node_text(spec).to_string(),
                        );
                    }
                }
            }
            EntityKind::Interface => {
                metadata.insert("kind".to_string(), "interface".to_string());
                if let Some(spec) = decl.spec_node {
                    self.interface_methods(unit, spec, &mut methods, &mut metadata);
                }
            }
            EntityKind::Variable | EntityKind::Constant => {
                if let Some(spec) = decl.spec_node {
                    if let Some(ty) = spec.child_by_field_name("type") {
                        metadata.insert("value_type".to_string(), unit.node_text(ty).to_string());
                    }
                }
            }
        }

        if let Some(ref recv) = decl.receiver {
            metadata.insert("receiver_type".to_string(), recv.clone());
        }

        // Grouped var/const blocks span the whole declaration; the record
        // is attributed to its own spec.
        let span_node = match decl.kind {
            EntityKind::Variable | EntityKind::Constant => decl.spec_node.unwrap_or(node),
            _ => node,
        };

        Ok(Entity {
            id: entity_id.to_string(),
            name: decl.name.clone(),
            kind: decl.kind,
            package: package.to_string(),
            file: unit.path.clone(),
            start_line: span_node.start_position().row + 1,
            end_line: span_node.end_position().row + 1,
            signature,
            return_type,
            receiver: decl.receiver.clone(),
            fields,
            methods,
            doc: self.doc_comment(unit, node),
            visibility: self.visibility_of(&decl.name),
            metadata,
        })
    }

    /// Declaration text up to the body block, collapsed to one line.
    fn function_signature(&self, unit: &ParsedUnit, node: Node) -> Option<String> {
        let end = node
            .children(&mut node.walk())
            .find(|n| n.kind() == "block")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        let text = std::str::from_utf8(&unit.source[node.start_byte()..end]).ok()?;
        let sig = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if sig.is_empty() {
            None
        } else {
            Some(sig)
        }
    }

    /// Parameter type strings, in declaration order.
    fn parameter_types(&self, unit: &ParsedUnit, node: Node) -> Vec<String> {
        let mut types = Vec::new();
        let params = match node.child_by_field_name("parameters") {
            Some(p) => p,
            None => return types,
        };
        for child in params.children(&mut params.walk()) {
            match child.kind() {
                "parameter_declaration" | "variadic_parameter_declaration" => {
                    if let Some(ty) = child.child_by_field_name("type") {
                        types.push(unit.node_text(ty).to_string());
                    }
                }
                _ => {}
            }
        }
        types
    }

    /// Collect struct field names. Named fields record their type in
    /// metadata; embedded fields get a synthetic `embedded_<Type>` name and
    /// a distinguishing flag.
    fn struct_fields(
        &self,
        unit: &ParsedUnit,
        struct_node: Node,
        fields: &mut Vec<String>,
        metadata: &mut BTreeMap<String, String>,
    ) {
        let list = match struct_node
            .children(&mut struct_node.walk())
            .find(|n| n.kind() == "field_declaration_list")
        {
            Some(l) => l,
            None => return,
        };

        for field in list.children(&mut list.walk()) {
            if field.kind() != "field_declaration" {
                continue;
            }
            let names: Vec<_> = field
                .children(&mut field.walk())
                .filter(|n| n.kind() == "field_identifier")
                .map(|n| unit.node_text(n).to_string())
                .collect();
            let field_type = field
                .child_by_field_name("type")
                .map(|t| unit.node_text(t).to_string());

            if names.is_empty() {
                // Embedded field: synthesize a name from the type.
                if let Some(ty) = field_type {
                    fields.push(format!("embedded_{}", ty.trim_start_matches('*')));
                    metadata.insert("has_embedded_fields".to_string(), "true".to_string());
                }
            } else {
                for name in names {
                    if let Some(ref ty) = field_type {
                        metadata.insert(format!("field_{}_type", name), ty.clone());
                    }
                    fields.push(name);
                }
            }
        }
    }

    /// Collect interface method names and signature strings.
    fn interface_methods(
        &self,
        unit: &ParsedUnit,
        iface_node: Node,
        methods: &mut Vec<String>,
        metadata: &mut BTreeMap<String, String>,
    ) {
        for child in iface_node.children(&mut iface_node.walk()) {
            // Grammar versions differ on the node name for interface methods.
            if child.kind() != "method_elem" && child.kind() != "method_spec" {
                continue;
            }
            let name = child
                .child_by_field_name("name")
                .map(|n| unit.node_text(n).to_string());
            if let Some(name) = name {
                metadata.insert(
                    format!("method_{}_signature", name),
                    unit.node_text(child).to_string(),
                );
                methods.push(name);
            }
        }
    }

    /// Contiguous `//` comment block immediately above a declaration.
    fn doc_comment(&self, unit: &ParsedUnit, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut expected_line = node.start_position().row;
        let mut prev = node.prev_sibling();

        while let Some(p) = prev {
            if p.kind() != "comment" || p.end_position().row + 1 != expected_line {
                break;
            }
            let text = unit.node_text(p);
            lines.push(text.trim_start_matches("//").trim().to_string());
            expected_line = p.start_position().row;
            prev = p.prev_sibling();
        }

        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    /// Every call expression in a body yields exactly one relationship.
    fn extract_calls(
        &self,
        unit: &ParsedUnit,
        source: &Entity,
        body: Node,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let query = Query::new(&self.language, CALL_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, body, &unit.source[..]);

        while let Some(m) = matches.next() {
            let mut callee = None;
            let mut operand = None;
            let mut method = None;
            let mut call_node = None;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "callee" => callee = Some(unit.node_text(capture.node).to_string()),
                    "call_operand" => operand = Some(capture.node),
                    "call_method" => method = Some(unit.node_text(capture.node).to_string()),
                    "call" | "method_call" => call_node = Some(capture.node),
                    _ => {}
                }
            }

            let call_node = match call_node {
                Some(n) => n,
                None => continue,
            };
            let line = call_node.start_position().row + 1;
            let mut metadata = BTreeMap::new();

            let (target_name, kind) = if let Some(callee) = callee {
                if GO_BUILTINS.contains(callee.as_str()) {
                    metadata.insert("builtin".to_string(), "true".to_string());
                }
                (callee, RelationKind::Calls)
            } else if let Some(method) = method {
                // receiver.method when the receiver is a simple identifier,
                // else just the method name.
                let target = match operand {
                    Some(op) if op.kind() == "identifier" => {
                        format!("{}.{}", unit.node_text(op), method)
                    }
                    _ => method,
                };
                (target, RelationKind::MethodCall)
            } else {
                continue;
            };

            out.relationships.push(Relationship {
                id: ids.next_relationship(),
                source_id: source.id.clone(),
                source_name: source.name.clone(),
                target_name,
                kind,
                line,
                metadata,
            });
        }

        Ok(())
    }

    /// Record top-level statement summaries and nested decision counts for
    /// the control-flow builder.
    fn extract_flow_facts(&self, unit: &ParsedUnit, body: Node) -> anyhow::Result<FlowFacts> {
        let mut facts = FlowFacts {
            body_end_line: body.end_position().row + 1,
            ..Default::default()
        };

        for stmt in body.children(&mut body.walk()) {
            if matches!(stmt.kind(), "{" | "}" | "comment") {
                continue;
            }
            let kind = match stmt.kind() {
                "if_statement" => FlowKind::If,
                "for_statement" => {
                    if stmt
                        .children(&mut stmt.walk())
                        .any(|n| n.kind() == "range_clause")
                    {
                        FlowKind::Range
                    } else {
                        FlowKind::For
                    }
                }
                "expression_switch_statement" | "type_switch_statement" | "select_statement" => {
                    FlowKind::Switch
                }
                "return_statement" => FlowKind::Return,
                _ => FlowKind::Statement,
            };
            facts.statements.push(FlowStatement {
                kind,
                line: stmt.start_position().row + 1,
                summary: summarize(unit.node_text(stmt)),
            });
        }

        // Nested decision points, counted everywhere in the body.
        let query = Query::new(&self.language, DECISION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, body, &unit.source[..]);
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "branch" | "loop" | "switch" => {
                        facts.decision_points += 1;
                        facts.branch_estimate += 2;
                    }
                    _ => {}
                }
            }
        }

        Ok(facts)
    }
}

/// A declaration waiting for id assignment, in source order.
struct PendingDecl<'a> {
    name: String,
    kind: EntityKind,
    receiver: Option<String>,
    decl_node: Node<'a>,
    spec_node: Option<Node<'a>>,
    body_node: Option<Node<'a>>,
}

/// First line of a statement, truncated for node summaries.
fn summarize(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.len() > 80 {
        format!("{}...", &first[..77])
    } else {
        first.to_string()
    }
}

impl Default for GoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitExtractor for GoExtractor {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedUnit> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Go source: {}", path.display()))?;

        Ok(ParsedUnit {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract(&self, unit: &ParsedUnit, ids: &mut IdAllocator) -> anyhow::Result<UnitExtraction> {
        let package = self.extract_package(unit).unwrap_or_default();

        let mut out = UnitExtraction {
            package: if package.is_empty() {
                None
            } else {
                Some(package.clone())
            },
            ..Default::default()
        };

        self.extract_declarations(unit, &package, ids, &mut out)?;
        Ok(out)
    }

    fn visibility_of(&self, name: &str) -> Visibility {
        // Go convention: an exported identifier starts with an upper-case
        // letter.
        if name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_go(source: &str) -> UnitExtraction {
        let extractor = GoExtractor::new();
        let unit = extractor
            .parse(Path::new("test.go"), source.as_bytes())
            .unwrap();
        let mut ids = IdAllocator::new();
        extractor.extract(&unit, &mut ids).unwrap()
    }

    #[test]
    fn test_extract_functions() {
        let out = extract_go(
            r#"
package main

func main() {
    println("hello")
}

func helper(x int) int {
    return x + 1
}
"#,
        );

        let funcs: Vec<_> = out
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Function)
            .collect();
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "main");
        assert_eq!(funcs[1].name, "helper");
        assert_eq!(out.package.as_deref(), Some("main"));
        assert_eq!(funcs[1].return_type.as_deref(), Some("int"));
        assert_eq!(
            funcs[1].metadata.get("parameters").map(String::as_str),
            Some("int")
        );
    }

    #[test]
    fn test_extract_methods_with_receiver() {
        let out = extract_go(
            r#"
package main

type Config struct {
    Name string
}

func (c *Config) Validate() error {
    return nil
}
"#,
        );

        let method = out
            .entities
            .iter()
            .find(|e| e.kind == EntityKind::Method)
            .unwrap();
        assert_eq!(method.name, "Validate");
        assert_eq!(method.receiver.as_deref(), Some("Config"));
        assert_eq!(method.return_type.as_deref(), Some("error"));
    }

    #[test]
    fn test_struct_fields_and_embedded() {
        let out = extract_go(
            r#"
package main

import "sync"

type Server struct {
    sync.Mutex
    Addr string
    port int
}
"#,
        );

        let server = out.entities.iter().find(|e| e.name == "Server").unwrap();
        assert_eq!(server.kind, EntityKind::Type);
        assert!(server.fields.contains(&"Addr".to_string()));
        assert!(server.fields.contains(&"port".to_string()));
        assert!(server
            .fields
            .iter()
            .any(|f| f.starts_with("embedded_sync.Mutex")));
        assert_eq!(
            server.metadata.get("has_embedded_fields").map(String::as_str),
            Some("true")
        );
        assert_eq!(
            server.metadata.get("field_Addr_type").map(String::as_str),
            Some("string")
        );
    }

    #[test]
    fn test_interface_methods() {
        let out = extract_go(
            r#"
package main

type Service interface {
    Run() error
    Stop()
}
"#,
        );

        let svc = out.entities.iter().find(|e| e.name == "Service").unwrap();
        assert_eq!(svc.kind, EntityKind::Interface);
        assert_eq!(svc.methods, vec!["Run".to_string(), "Stop".to_string()]);
        assert!(svc.metadata.contains_key("method_Run_signature"));
        assert!(svc.return_type.is_none());
    }

    #[test]
    fn test_vars_and_consts() {
        let out = extract_go(
            r#"
package main

const Version = "1.0.0"

const (
    MaxRetries = 3
    Timeout = 30
)

var debug bool
"#,
        );

        let consts: Vec<_> = out
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Constant)
            .collect();
        assert_eq!(consts.len(), 3);

        let vars: Vec<_> = out
            .entities
            .iter()
            .filter(|e| e.kind == EntityKind::Variable)
            .collect();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "debug");
        assert_eq!(
            vars[0].metadata.get("value_type").map(String::as_str),
            Some("bool")
        );
    }

    #[test]
    fn test_visibility_from_casing() {
        let out = extract_go(
            r#"
package main

func Exported() {}

func internal() {}
"#,
        );

        let exported = out.entities.iter().find(|e| e.name == "Exported").unwrap();
        let internal = out.entities.iter().find(|e| e.name == "internal").unwrap();
        assert_eq!(exported.visibility, Visibility::Public);
        assert_eq!(internal.visibility, Visibility::Private);
    }

    #[test]
    fn test_doc_comment() {
        let out = extract_go(
            r#"
package main

// Run starts the server.
// It blocks until shutdown.
func Run() {}
"#,
        );

        let run = out.entities.iter().find(|e| e.name == "Run").unwrap();
        assert_eq!(
            run.doc.as_deref(),
            Some("Run starts the server.\nIt blocks until shutdown.")
        );
    }

    #[test]
    fn test_call_relationships() {
        let out = extract_go(
            r#"
package main

func work(s *Server) {
    helper()
    s.Start()
    fmt.Println("done")
    panic("boom")
}
"#,
        );

        let calls: Vec<_> = out.relationships.iter().collect();
        assert_eq!(calls.len(), 4);

        let helper = calls.iter().find(|r| r.target_name == "helper").unwrap();
        assert_eq!(helper.kind, RelationKind::Calls);
        assert_eq!(helper.source_name, "work");

        let start = calls.iter().find(|r| r.target_name == "s.Start").unwrap();
        assert_eq!(start.kind, RelationKind::MethodCall);

        let println = calls
            .iter()
            .find(|r| r.target_name == "fmt.Println")
            .unwrap();
        assert_eq!(println.kind, RelationKind::MethodCall);

        let builtin = calls.iter().find(|r| r.target_name == "panic").unwrap();
        assert_eq!(builtin.kind, RelationKind::Calls);
        assert_eq!(
            builtin.metadata.get("builtin").map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn test_flow_facts_top_level_only() {
        let out = extract_go(
            r#"
package main

func branchy(items []int) int {
    total := 0
    for _, item := range items {
        if item > 0 {
            total += item
        }
    }
    if total > 100 {
        return total
    }
    return 0
}
"#,
        );

        let flow = &out.flows[0];
        // Top-level: assignment, range loop, if, return. The nested if is
        // summarized into the loop, not its own statement.
        assert_eq!(flow.facts.statements.len(), 4);
        assert_eq!(flow.facts.statements[1].kind, FlowKind::Range);
        assert_eq!(flow.facts.statements[2].kind, FlowKind::If);
        assert_eq!(flow.facts.statements[3].kind, FlowKind::Return);
        // Decisions include the nested if: range + if + if.
        assert_eq!(flow.facts.decision_points, 3);
        assert_eq!(flow.facts.branch_estimate, 6);
    }

    #[test]
    fn test_partial_source_still_emits() {
        // Syntax errors degrade to ERROR nodes; intact declarations are
        // still walked.
        let out = extract_go(
            r#"
package main

func ok() {}

func broken( {
"#,
        );

        assert!(out.entities.iter().any(|e| e.name == "ok"));
    }

    #[test]
    fn test_entity_order_is_top_to_bottom() {
        let out = extract_go(
            r#"
package main

func zeta() {}

type Alpha struct {}

func beta() {}
"#,
        );

        let names: Vec<_> = out.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "Alpha", "beta"]);
    }
}
