//! Python syntactic extractor using tree-sitter.
//!
//! Python has no explicit visibility modifiers; the leading-underscore
//! convention drives the visibility rule. Classes are recorded as `type`
//! entities, with their methods attributed to the class as receiver.

use std::collections::BTreeMap;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::extract::{ParsedUnit, UnitExtraction, UnitExtractor};
use crate::model::{
    Entity, EntityKind, FlowFacts, FlowKind, FlowStatement, FunctionFlow, IdAllocator,
    RelationKind, Relationship, Visibility,
};

/// Tree-sitter query for call expressions inside a function body.
const CALL_QUERY: &str = r#"
(call
  function: (identifier) @callee
) @call

(call
  function: (attribute
    object: (_) @call_object
    attribute: (identifier) @call_method
  )
) @method_call
"#;

/// Tree-sitter query for decision points.
const DECISION_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @loop
(while_statement) @loop
(match_statement) @switch
"#;

/// Python syntactic extractor.
pub struct PythonExtractor {
    language: Language,
}

impl PythonExtractor {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Walk the module's top-level statements, descending only into class
    /// bodies for methods.
    fn walk_module(
        &self,
        unit: &ParsedUnit,
        module: &str,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let root = unit.tree.root_node();
        for child in root.children(&mut root.walk()) {
            self.walk_statement(unit, module, child, None, ids, out)?;
        }
        Ok(())
    }

    fn walk_statement(
        &self,
        unit: &ParsedUnit,
        module: &str,
        node: Node,
        owner: Option<&str>,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let node = if node.kind() == "decorated_definition" {
            match node.child_by_field_name("definition") {
                Some(inner) => inner,
                None => return Ok(()),
            }
        } else {
            node
        };

        match node.kind() {
            "function_definition" => self.emit_callable(unit, module, node, owner, ids, out)?,
            "class_definition" => self.emit_class(unit, module, node, ids, out)?,
            "expression_statement" => {
                if owner.is_none() {
                    self.emit_module_assignment(unit, module, node, ids, out);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn emit_callable(
        &self,
        unit: &ParsedUnit,
        module: &str,
        node: Node,
        owner: Option<&str>,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let name = match node.child_by_field_name("name") {
            Some(n) => unit.node_text(n).to_string(),
            None => return Ok(()),
        };
        let kind = if owner.is_some() {
            EntityKind::Method
        } else {
            EntityKind::Function
        };

        let return_type = node
            .child_by_field_name("return_type")
            .map(|r| unit.node_text(r).to_string());
        let body = node.child_by_field_name("body");

        let mut metadata = BTreeMap::new();
        if let Some(params) = node.child_by_field_name("parameters") {
            let text = unit.node_text(params).trim().to_string();
            if text != "()" {
                metadata.insert("parameters".to_string(), text);
            }
        }

        let entity = Entity {
            id: ids.next_entity(kind),
            name: name.clone(),
            kind,
            package: module.to_string(),
            file: unit.path.clone(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            signature: self.def_signature(unit, node),
            return_type,
            receiver: owner.map(str::to_string),
            fields: Vec::new(),
            methods: Vec::new(),
            doc: body.and_then(|b| self.docstring(unit, b)),
            visibility: self.visibility_of(&name),
            metadata,
        };

        if let Some(body) = body {
            self.extract_calls(unit, &entity, body, ids, out)?;
            out.flows.push(FunctionFlow {
                function_id: entity.id.clone(),
                function_name: entity.name.clone(),
                start_line: entity.start_line,
                facts: self.extract_flow_facts(unit, body)?,
            });
        }

        out.entities.push(entity);
        Ok(())
    }

    fn emit_class(
        &self,
        unit: &ParsedUnit,
        module: &str,
        node: Node,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) -> anyhow::Result<()> {
        let name = match node.child_by_field_name("name") {
            Some(n) => unit.node_text(n).to_string(),
            None => return Ok(()),
        };
        let body = node.child_by_field_name("body");

        let mut metadata = BTreeMap::new();
        metadata.insert("kind".to_string(), "class".to_string());
        if let Some(bases) = node.child_by_field_name("superclasses") {
            metadata.insert(
                "bases".to_string(),
                unit.node_text(bases)
                    .trim_matches(|c| c == '(' || c == ')')
                    .to_string(),
            );
        }

        // Method names contribute to the class record the way interface
        // method sets do for Go.
        let mut methods = Vec::new();
        if let Some(body) = body {
            for stmt in body.children(&mut body.walk()) {
                let def = if stmt.kind() == "decorated_definition" {
                    stmt.child_by_field_name("definition").unwrap_or(stmt)
                } else {
                    stmt
                };
                if def.kind() == "function_definition" {
                    if let Some(n) = def.child_by_field_name("name") {
                        methods.push(unit.node_text(n).to_string());
                    }
                }
            }
        }

        out.entities.push(Entity {
            id: ids.next_entity(EntityKind::Type),
            name: name.clone(),
            kind: EntityKind::Type,
            package: module.to_string(),
            file: unit.path.clone(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            signature: None,
            return_type: None,
            receiver: None,
            fields: Vec::new(),
            methods,
            doc: body.and_then(|b| self.docstring(unit, b)),
            visibility: self.visibility_of(&name),
            metadata,
        });

        // Emit the class's methods as entities of their own.
        if let Some(body) = body {
            for stmt in body.children(&mut body.walk()) {
                self.walk_statement(unit, module, stmt, Some(&name), ids, out)?;
            }
        }
        Ok(())
    }

    /// Module-level `NAME = value` assignments become variable/constant
    /// entities; all-caps names follow the constant convention.
    fn emit_module_assignment(
        &self,
        unit: &ParsedUnit,
        module: &str,
        node: Node,
        ids: &mut IdAllocator,
        out: &mut UnitExtraction,
    ) {
        let assign = match node.child(0) {
            Some(a) if a.kind() == "assignment" => a,
            _ => return,
        };
        let left = match assign.child_by_field_name("left") {
            Some(l) if l.kind() == "identifier" => l,
            _ => return,
        };
        let name = unit.node_text(left).to_string();
        let is_const = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_uppercase() || c == '_' || c.is_ascii_digit());
        let kind = if is_const {
            EntityKind::Constant
        } else {
            EntityKind::Variable
        };

        let mut metadata = BTreeMap::new();
        if let Some(ty) = assign.child_by_field_name("type") {
            metadata.insert("value_type".to_string(), unit.node_text(ty).to_string());
        }

        out.entities.push(Entity {
            id: ids.next_entity(kind),
            name: name.clone(),
            kind,
            package: module.to_string(),
            file: unit.path.clone(),
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            signature: None,
            return_type: None,
            receiver: None,
            fields: Vec::new(),
            methods: Vec::new(),
            doc: None,
            visibility: self.visibility_of(&name),
            metadata,
        });
    }

    /// The `def` header up to the body, collapsed to one line.
    fn def_signature(&self, unit: &ParsedUnit, node: Node) -> Option<String> {
        let end = node
            .child_by_field_name("body")
            .map(|b| b.start_byte())
            .unwrap_or_else(|| node.end_byte());
        let text = std::str::from_utf8(&unit.source[node.start_byte()..end]).ok()?;
        let sig = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_end_matches(':')
            .trim()
            .to_string();
        if sig.is_empty() {
            None
        } else {
            Some(sig)
        }
    }

    /// A leading string expression in a body is its docstring.
    fn docstring(&self, unit: &ParsedUnit, body: Node) -> Option<String> {
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let text = unit
            .node_text(string)
            .trim_matches(|c| c == '"' || c == '\'')
            .trim()
            .to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

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
            let mut object = None;
            let mut method = None;
            let mut call_node = None;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "callee" => callee = Some(unit.node_text(capture.node).to_string()),
                    "call_object" => object = Some(capture.node),
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

            let (target_name, kind) = if let Some(callee) = callee {
                (callee, RelationKind::Calls)
            } else if let Some(method) = method {
                let target = match object {
                    Some(obj) if obj.kind() == "identifier" => {
                        format!("{}.{}", unit.node_text(obj), method)
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
                metadata: BTreeMap::new(),
            });
        }

        Ok(())
    }

    fn extract_flow_facts(&self, unit: &ParsedUnit, body: Node) -> anyhow::Result<FlowFacts> {
        let mut facts = FlowFacts {
            body_end_line: body.end_position().row + 1,
            ..Default::default()
        };

        for stmt in body.children(&mut body.walk()) {
            if stmt.kind() == "comment" || !stmt.is_named() {
                continue;
            }
            let kind = match stmt.kind() {
                "if_statement" => FlowKind::If,
                // Python `for` is a foreach construct.
                "for_statement" => FlowKind::Range,
                "while_statement" => FlowKind::For,
                "match_statement" => FlowKind::Switch,
                "return_statement" => FlowKind::Return,
                _ => FlowKind::Statement,
            };
            facts.statements.push(FlowStatement {
                kind,
                line: stmt.start_position().row + 1,
                summary: summarize(unit.node_text(stmt)),
            });
        }

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

/// First line of a statement, truncated for node summaries.
fn summarize(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    if first.len() > 80 {
        format!("{}...", &first[..77])
    } else {
        first.to_string()
    }
}

impl Default for PythonExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitExtractor for PythonExtractor {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedUnit> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("failed to parse Python source: {}", path.display()))?;

        Ok(ParsedUnit {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract(&self, unit: &ParsedUnit, ids: &mut IdAllocator) -> anyhow::Result<UnitExtraction> {
        let module = Path::new(&unit.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();

        let mut out = UnitExtraction {
            package: if module.is_empty() {
                None
            } else {
                Some(module.clone())
            },
            ..Default::default()
        };

        self.walk_module(unit, &module, ids, &mut out)?;
        Ok(out)
    }

    fn visibility_of(&self, name: &str) -> Visibility {
        // Python convention: a leading underscore marks internals.
        if name.starts_with('_') {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}
