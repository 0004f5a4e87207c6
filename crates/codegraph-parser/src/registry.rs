// ABOUTME: Function Registry (spec §4.2): walks every parsed file for function-like
// ABOUTME: declarations, assigns the physical/semantic/content id triple, and builds the
// ABOUTME: by-file, by-file-line and by-qualified-name lookup indexes.
use crate::metrics::compute_metrics;
use crate::project::Project;
use codegraph_core::{
    stable_hash, AccessModifier, CodeGraphError, ContentId, Function, FunctionId, FunctionKind,
    Parameter, Result, SemanticId, Signature,
};
use std::collections::HashMap;
use tree_sitter::Node;

const FUNCTION_LIKE_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "generator_function",
    "arrow_function",
    "method_definition",
];

/// The indexed set of every function extracted from a [`Project`] (spec §4.2's public
/// contract: `collect(project) -> map<FunctionId, Function>` plus lookup indexes).
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<FunctionId, Function>,
    /// Insertion order == source order, per file.
    by_file: HashMap<String, Vec<FunctionId>>,
    /// Filled for every line in a function's inclusive range; inner functions override
    /// outer ones because they're written after their enclosing function in the walk.
    by_file_line: HashMap<(String, u32), FunctionId>,
    by_qualified_name: HashMap<String, Vec<FunctionId>>,
    pub range_mismatches: Vec<CodeGraphError>,
}

impl FunctionRegistry {
    pub fn get(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn functions_in_file(&self, file_path: &str) -> &[FunctionId] {
        self.by_file.get(file_path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn function_at_line(&self, file_path: &str, line: u32) -> Option<FunctionId> {
        self.by_file_line.get(&(file_path.to_string(), line)).copied()
    }

    pub fn by_qualified_name(&self, name: &str) -> &[FunctionId] {
        self.by_qualified_name.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// Walks every file in `project` and assigns ids salted with `snapshot_salt`, so physical
/// ids are stable across runs over unchanged source (spec §3's identity invariants).
pub fn collect(project: &Project, snapshot_salt: &str) -> Result<FunctionRegistry> {
    let mut registry = FunctionRegistry::default();

    for file in project.files() {
        let mut order = Vec::new();
        walk(
            file.tree.root_node(),
            &file.path,
            &file.source,
            snapshot_salt,
            &mut Vec::new(),
            &mut order,
            &mut registry.range_mismatches,
        );

        for func in &order {
            let id = func.physical_id;
            for line in func.location.start_line..=func.location.end_line {
                registry
                    .by_file_line
                    .insert((file.path.clone(), line), id);
            }
            registry
                .by_qualified_name
                .entry(func.qualified_name())
                .or_default()
                .push(id);
        }

        let ids: Vec<FunctionId> = order.iter().map(|f| f.physical_id).collect();
        registry.by_file.insert(file.path.clone(), ids);
        for func in order {
            registry.functions.insert(func.physical_id, func);
        }
    }

    Ok(registry)
}

fn walk(
    node: Node,
    file_path: &str,
    source: &str,
    salt: &str,
    context_path: &mut Vec<String>,
    out: &mut Vec<Function>,
    mismatches: &mut Vec<CodeGraphError>,
) {
    let kind = node.kind();

    if matches!(kind, "class_declaration" | "abstract_class_declaration" | "interface_declaration") {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source.as_bytes()).ok())
            .unwrap_or("<anonymous>")
            .to_string();
        context_path.push(name);
        walk_children(node, file_path, source, salt, context_path, out, mismatches);
        context_path.pop();
        return;
    }

    if kind == "internal_module" || kind == "module" {
        let name = node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(source.as_bytes()).ok())
            .unwrap_or("<namespace>")
            .to_string();
        context_path.push(name);
        walk_children(node, file_path, source, salt, context_path, out, mismatches);
        context_path.pop();
        return;
    }

    if FUNCTION_LIKE_KINDS.contains(&kind) {
        match extract_function(node, file_path, source, salt, context_path) {
            Ok(func) => out.push(func),
            Err(e) => mismatches.push(e),
        }
        // Nested functions still need walking for their own extraction; they inherit the
        // same context path (a function body doesn't add to contextPath).
        walk_children(node, file_path, source, salt, context_path, out, mismatches);
        return;
    }

    walk_children(node, file_path, source, salt, context_path, out, mismatches);
}

fn walk_children(
    node: Node,
    file_path: &str,
    source: &str,
    salt: &str,
    context_path: &mut Vec<String>,
    out: &mut Vec<Function>,
    mismatches: &mut Vec<CodeGraphError>,
) {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            walk(cursor.node(), file_path, source, salt, context_path, out, mismatches);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn extract_function(
    node: Node,
    file_path: &str,
    source: &str,
    salt: &str,
    context_path: &[String],
) -> Result<Function> {
    let kind = classify_kind(node, source);
    let name = function_name(node, source, kind);

    let (start_line, start_col) = byte_pos_to_line_col(source, node.start_byte());
    let (end_line, end_col) = byte_pos_to_line_col(source, node.end_byte());

    if let Some(name_node) = node.child_by_field_name("name") {
        let name_start = name_node.start_byte();
        if name_start < node.start_byte() || name_start > node.end_byte() {
            return Err(CodeGraphError::RangeMismatch {
                file: file_path.to_string(),
                line: start_line,
                column: start_col,
                message: "declared range does not contain its own name token".to_string(),
            });
        }
    }

    let parameters = extract_parameters(node, source);
    let return_type = node
        .child_by_field_name("return_type")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .unwrap_or("")
        .trim_start_matches(':')
        .trim()
        .to_string();
    let is_async = has_child_token(node, "async");
    let is_generator = kind == FunctionKind::FreeFunction && node.kind().contains("generator")
        || has_child_token(node, "*");

    let signature = Signature {
        parameters,
        return_type,
        is_async,
        is_generator,
    };

    let location = codegraph_core::Location {
        file_path: file_path.to_string(),
        start_line,
        start_column: start_col,
        end_line,
        end_column: end_col,
    };

    let is_static = has_child_token(node, "static");
    let access_modifier = access_modifier(node, source);
    let is_exported = is_exported(node);

    let physical_id = FunctionId::from_parts(&[
        salt,
        file_path,
        &start_line.to_string(),
        &start_col.to_string(),
        kind_tag(kind),
    ]);

    let qualified = if context_path.is_empty() {
        name.clone()
    } else {
        format!("{}.{}", context_path.join("."), name)
    };
    let param_shape = signature
        .parameters
        .iter()
        .map(|p| {
            format!(
                "{}{}",
                if p.is_rest { "..." } else if p.is_optional { "?" } else { "" },
                p.position
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    let return_category = if signature.return_type.is_empty() || signature.return_type == "void" {
        "void"
    } else if signature.return_type.starts_with("Promise") {
        "promise"
    } else {
        "other"
    };
    let semantic_id = SemanticId::from_parts(&[&qualified, &name, &param_shape, return_category]);

    let normalized_body = normalize_body(
        node.utf8_text(source.as_bytes()).unwrap_or_default(),
    );
    let content_id = ContentId::from_parts(&[&normalized_body]);

    let metrics = compute_metrics(node, source, signature.parameters.len() as u32);

    Ok(Function {
        physical_id,
        semantic_id,
        content_id,
        name,
        location,
        signature,
        context_path: context_path.to_vec(),
        kind,
        access_modifier,
        is_static,
        is_exported,
        metrics,
    })
}

fn kind_tag(kind: FunctionKind) -> &'static str {
    match kind {
        FunctionKind::FreeFunction => "free-function",
        FunctionKind::Method => "method",
        FunctionKind::Arrow => "arrow",
        FunctionKind::FunctionExpression => "function-expression",
        FunctionKind::Constructor => "constructor",
        FunctionKind::Accessor => "accessor",
    }
}

fn classify_kind(node: Node, source: &str) -> FunctionKind {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => FunctionKind::FreeFunction,
        "function_expression" | "generator_function" => FunctionKind::FunctionExpression,
        "arrow_function" => FunctionKind::Arrow,
        "method_definition" => {
            let name = node
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .unwrap_or("");
            if name == "constructor" {
                FunctionKind::Constructor
            } else if has_child_token(node, "get") || has_child_token(node, "set") {
                FunctionKind::Accessor
            } else {
                FunctionKind::Method
            }
        }
        _ => FunctionKind::FreeFunction,
    }
}

/// Arrow functions and anonymous function expressions bound to a `const`/`let`
/// initializer inherit the binding's identifier, per spec §4.2's edge case.
fn function_name(node: Node, source: &str, kind: FunctionKind) -> String {
    if let Some(name_node) = node.child_by_field_name("name") {
        if let Ok(text) = name_node.utf8_text(source.as_bytes()) {
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }

    if matches!(kind, FunctionKind::Arrow | FunctionKind::FunctionExpression) {
        if let Some(parent) = node.parent() {
            if parent.kind() == "variable_declarator" {
                if let Some(name_node) = parent.child_by_field_name("name") {
                    if let Ok(text) = name_node.utf8_text(source.as_bytes()) {
                        return text.to_string();
                    }
                }
            }
            if parent.kind() == "public_field_definition" || parent.kind() == "property_definition" {
                if let Some(name_node) = parent.child_by_field_name("name") {
                    if let Ok(text) = name_node.utf8_text(source.as_bytes()) {
                        return text.to_string();
                    }
                }
            }
            if parent.kind() == "pair" {
                if let Some(key_node) = parent.child_by_field_name("key") {
                    if let Ok(text) = key_node.utf8_text(source.as_bytes()) {
                        return text.to_string();
                    }
                }
            }
        }
    }

    "<anonymous>".to_string()
}

fn extract_parameters(node: Node, source: &str) -> Vec<Parameter> {
    let Some(params_node) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    let mut parameters = Vec::new();
    let mut cursor = params_node.walk();
    let mut position = 0u32;
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if matches!(
                child.kind(),
                "required_parameter" | "optional_parameter" | "rest_pattern" | "identifier" | "object_pattern" | "array_pattern"
            ) {
                let is_rest = child.kind() == "rest_pattern";
                let is_optional = child.kind() == "optional_parameter";
                let pattern_node = child.child_by_field_name("pattern").unwrap_or(child);
                let name = pattern_node
                    .utf8_text(source.as_bytes())
                    .unwrap_or("_")
                    .trim_start_matches("...")
                    .to_string();
                let type_text = child
                    .child_by_field_name("type")
                    .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                    .unwrap_or("")
                    .trim_start_matches(':')
                    .trim()
                    .to_string();
                parameters.push(Parameter {
                    name,
                    type_text,
                    is_optional,
                    is_rest,
                    position,
                });
                position += 1;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    parameters
}

fn has_child_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == token {
                return true;
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    false
}

fn access_modifier(node: Node, source: &str) -> Option<AccessModifier> {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.kind() == "accessibility_modifier" {
                return match child.utf8_text(source.as_bytes()).ok()? {
                    "public" => Some(AccessModifier::Public),
                    "private" => Some(AccessModifier::Private),
                    "protected" => Some(AccessModifier::Protected),
                    _ => None,
                };
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    None
}

/// A function is exported when it (or its enclosing `export`/`export default` statement,
/// or the class it's a member of) is reachable from an `export_statement` ancestor.
fn is_exported(node: Node) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if let Some(parent) = n.parent() {
            if parent.kind() == "export_statement" {
                return true;
            }
        }
        current = n.parent();
    }
    false
}

fn byte_pos_to_line_col(source: &str, byte_offset: usize) -> (u32, u32) {
    let index = codegraph_core::LineIndex::new(source);
    index.line_column(byte_offset)
}

/// Strips comments and collapses whitespace so reformatting (not a behavioral edit)
/// doesn't perturb the content id (spec §3: "content id changes iff the body changes").
fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'/') {
            while let Some(&next) = chars.peek() {
                if next == '\n' {
                    break;
                }
                chars.next();
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(next) = chars.next() {
                if next == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn write_project(dir: &std::path::Path, files: &[(&str, &str)]) -> Project {
        for (name, content) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        Project::load(dir, &[], &[]).unwrap()
    }

    #[test]
    fn extracts_free_functions_in_source_order() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(
            dir.path(),
            &[("a.ts", "function a() { return b(); }\nfunction b() { return 1; }\n")],
        );
        let registry = collect(&project, "salt").unwrap();
        assert_eq!(registry.len(), 2);
        let ids = registry.functions_in_file("/a.ts");
        assert_eq!(ids.len(), 2);
        assert_eq!(registry.get(ids[0]).unwrap().name, "a");
        assert_eq!(registry.get(ids[1]).unwrap().name, "b");
    }

    #[test]
    fn arrow_bound_to_const_inherits_name() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), &[("a.ts", "const handler = (x) => x + 1;\n")]);
        let registry = collect(&project, "salt").unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.all().next().unwrap().name, "handler");
    }

    #[test]
    fn method_inside_class_gets_context_path() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(
            dir.path(),
            &[("a.ts", "class Widget {\n  render() { return 1; }\n}\n")],
        );
        let registry = collect(&project, "salt").unwrap();
        let func = registry.all().find(|f| f.name == "render").unwrap();
        assert_eq!(func.context_path, vec!["Widget".to_string()]);
        assert_eq!(func.qualified_name(), "Widget.render");
    }

    #[test]
    fn physical_ids_are_stable_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let project = write_project(dir.path(), &[("a.ts", "function a() { return 1; }\n")]);
        let first = collect(&project, "salt").unwrap();
        let second = collect(&project, "salt").unwrap();
        let a = first.all().next().unwrap();
        let b = second.all().next().unwrap();
        assert_eq!(a.physical_id, b.physical_id);
        assert_eq!(a.semantic_id, b.semantic_id);
        assert_eq!(a.content_id, b.content_id);
    }
}
