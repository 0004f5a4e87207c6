// ABOUTME: Symbol resolution (spec §4.1): chases `import`/re-export chains to the
// ABOUTME: declaration node, following relative specifiers and `tsconfig.json` path
// ABOUTME: aliases via `oxc_resolver`, layered under a per-file export table.
use crate::project::Project;
use codegraph_core::{FunctionId, SymbolResolver};
use oxc_resolver::{ResolveOptions, Resolver, TsconfigOptions};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;
use tree_sitter::Node;

/// One file's import and export surface, scanned once during `load` so resolution never
/// re-walks a file's top-level statements.
#[derive(Debug, Default, Clone)]
struct FileSymbols {
    /// local binding name -> (module specifier, imported name, is_namespace_import)
    imports: HashMap<String, (String, String, bool)>,
    /// exported name -> local declaration name in this file (usually identical, except
    /// `export { a as b }`)
    local_exports: HashMap<String, String>,
    /// exported name -> (module specifier, original name) for `export { x } from "./y"`
    reexports: HashMap<String, (String, String)>,
    /// `export * from "./y"` specifiers, consulted when a name isn't found directly.
    star_reexports: Vec<String>,
}

pub struct ModuleResolver {
    resolver: Resolver,
    project_root: std::path::PathBuf,
    symbols: HashMap<String, FileSymbols>,
}

impl ModuleResolver {
    pub fn build(project: &Project) -> Self {
        let options = ResolveOptions {
            extensions: vec![".ts".into(), ".tsx".into(), ".d.ts".into()],
            main_fields: vec!["module".into(), "main".into()],
            condition_names: vec!["import".into(), "types".into(), "default".into()],
            tsconfig: Some(TsconfigOptions {
                config_file: project.root.join("tsconfig.json"),
                references: oxc_resolver::TsconfigReferences::Auto,
            }),
            ..ResolveOptions::default()
        };
        let resolver = Resolver::new(options);

        let mut symbols = HashMap::new();
        for file in project.files() {
            symbols.insert(file.path.clone(), scan_file_symbols(file.tree.root_node(), &file.source));
        }

        Self {
            resolver,
            project_root: project.root.clone(),
            symbols,
        }
    }

    /// Resolves a relative or aliased specifier from `from_file` to a normalized project
    /// path, if it resolves inside the project (external packages return `None`).
    pub fn resolve_specifier(&self, from_file: &str, specifier: &str) -> Option<String> {
        let from_absolute = self.project_root.join(from_file.trim_start_matches('/'));
        let directory = from_absolute.parent().unwrap_or(&self.project_root);
        match self.resolver.resolve(directory, specifier) {
            Ok(resolution) => Some(codegraph_core::normalize_path(&self.project_root, resolution.path())),
            Err(e) => {
                debug!(from_file, specifier, error = %e, "module specifier did not resolve");
                None
            }
        }
    }

    /// Follows the import chain for `imported_name` in `from_file` to the file that
    /// actually declares it, returning `(declaring_file, declared_name)`. Cycles are
    /// broken by a visited-specifier set; a cycle returns the first-seen declaration.
    pub fn resolve_declaration(&self, from_file: &str, imported_name: &str) -> Option<(String, String)> {
        let mut visited = HashSet::new();
        self.resolve_declaration_inner(from_file, imported_name, &mut visited)
    }

    fn resolve_declaration_inner(
        &self,
        file: &str,
        name: &str,
        visited: &mut HashSet<(String, String)>,
    ) -> Option<(String, String)> {
        let key = (file.to_string(), name.to_string());
        if !visited.insert(key) {
            return Some((file.to_string(), name.to_string()));
        }

        let syms = self.symbols.get(file)?;

        if syms.local_exports.contains_key(name) || !syms.imports.contains_key(name) {
            // Either genuinely local, or not an import this file tracks: declared here.
            let local_name = syms.local_exports.get(name).cloned().unwrap_or_else(|| name.to_string());
            if let Some((specifier, original)) = syms.reexports.get(name) {
                let target = self.resolve_specifier(file, specifier)?;
                return self.resolve_declaration_inner(&target, original, visited);
            }
            return Some((file.to_string(), local_name));
        }

        if let Some((specifier, original, is_namespace)) = syms.imports.get(name) {
            let target = self.resolve_specifier(file, specifier)?;
            if *is_namespace {
                return Some((target, original.clone()));
            }
            return self.resolve_declaration_inner(&target, original, visited);
        }

        for specifier in &syms.star_reexports {
            if let Some(target) = self.resolve_specifier(file, specifier) {
                if let Some(found) = self.resolve_declaration_inner(&target, name, visited) {
                    return Some(found);
                }
            }
        }

        None
    }
}

/// Adapts [`ModuleResolver`] + a [`crate::registry::FunctionRegistry`] into the
/// `SymbolResolver` capability Stage 2 consumes.
pub struct ProjectSymbolResolver<'a> {
    pub module_resolver: &'a ModuleResolver,
    pub registry: &'a crate::registry::FunctionRegistry,
}

impl<'a> SymbolResolver for ProjectSymbolResolver<'a> {
    fn resolve_imported_function(&self, from_file: &str, imported_name: &str) -> Option<FunctionId> {
        let (declaring_file, local_name) = self.module_resolver.resolve_declaration(from_file, imported_name)?;
        self.registry
            .by_qualified_name(&local_name)
            .iter()
            .find(|id| {
                self.registry
                    .get(**id)
                    .map(|f| f.location.file_path == declaring_file)
                    .unwrap_or(false)
            })
            .copied()
    }
}

fn scan_file_symbols(root: Node, source: &str) -> FileSymbols {
    let mut symbols = FileSymbols::default();
    let mut cursor = root.walk();
    if cursor.goto_first_child() {
        loop {
            let node = cursor.node();
            match node.kind() {
                "import_statement" => scan_import(node, source, &mut symbols),
                "export_statement" => scan_export(node, source, &mut symbols),
                _ => {}
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    symbols
}

fn text(node: Node, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or_default().to_string()
}

fn scan_import(node: Node, source: &str, symbols: &mut FileSymbols) {
    let Some(source_node) = node.child_by_field_name("source") else { return };
    let specifier = text(source_node, source).trim_matches(|c| c == '"' || c == '\'').to_string();

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            match child.kind() {
                "import_clause" => scan_import_clause(child, source, &specifier, symbols),
                _ => {}
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn scan_import_clause(node: Node, source: &str, specifier: &str, symbols: &mut FileSymbols) {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            match child.kind() {
                "identifier" => {
                    // default import: `import Foo from "./foo"`
                    let local = text(child, source);
                    symbols
                        .imports
                        .insert(local, (specifier.to_string(), "default".to_string(), false));
                }
                "namespace_import" => {
                    if let Some(ident) = child.child(1) {
                        let local = text(ident, source);
                        symbols
                            .imports
                            .insert(local, (specifier.to_string(), "*".to_string(), true));
                    }
                }
                "named_imports" => scan_named_imports(child, source, specifier, symbols),
                _ => {}
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn scan_named_imports(node: Node, source: &str, specifier: &str, symbols: &mut FileSymbols) {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.kind() == "import_specifier" {
                let original = child
                    .child_by_field_name("name")
                    .map(|n| text(n, source))
                    .unwrap_or_default();
                let local = child
                    .child_by_field_name("alias")
                    .map(|n| text(n, source))
                    .unwrap_or_else(|| original.clone());
                symbols
                    .imports
                    .insert(local, (specifier.to_string(), original, false));
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn scan_export(node: Node, source: &str, symbols: &mut FileSymbols) {
    if let Some(source_node) = node.child_by_field_name("source") {
        let specifier = text(source_node, source).trim_matches(|c| c == '"' || c == '\'').to_string();
        // export * from "./mod" or export { a, b as c } from "./mod"
        let mut cursor = node.walk();
        let mut has_clause = false;
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                if child.kind() == "export_clause" {
                    has_clause = true;
                    let mut inner = child.walk();
                    if inner.goto_first_child() {
                        loop {
                            let spec = inner.node();
                            if spec.kind() == "export_specifier" {
                                let original = spec
                                    .child_by_field_name("name")
                                    .map(|n| text(n, source))
                                    .unwrap_or_default();
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .map(|n| text(n, source))
                                    .unwrap_or_else(|| original.clone());
                                symbols.reexports.insert(alias, (specifier.clone(), original));
                            }
                            if !inner.goto_next_sibling() {
                                break;
                            }
                        }
                    }
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
        if !has_clause {
            symbols.star_reexports.push(specifier);
        }
        return;
    }

    // `export function foo() {}`, `export const x = ...`, `export default ...`, or
    // `export { a, b as c }` (no source: local re-export).
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            match child.kind() {
                "function_declaration" | "class_declaration" | "abstract_class_declaration" => {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        let name = text(name_node, source);
                        symbols.local_exports.insert(name.clone(), name);
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    let mut decl_cursor = child.walk();
                    if decl_cursor.goto_first_child() {
                        loop {
                            let decl = decl_cursor.node();
                            if decl.kind() == "variable_declarator" {
                                if let Some(name_node) = decl.child_by_field_name("name") {
                                    let name = text(name_node, source);
                                    symbols.local_exports.insert(name.clone(), name);
                                }
                            }
                            if !decl_cursor.goto_next_sibling() {
                                break;
                            }
                        }
                    }
                }
                "export_clause" => {
                    let mut inner = child.walk();
                    if inner.goto_first_child() {
                        loop {
                            let spec = inner.node();
                            if spec.kind() == "export_specifier" {
                                let original = spec
                                    .child_by_field_name("name")
                                    .map(|n| text(n, source))
                                    .unwrap_or_default();
                                let alias = spec
                                    .child_by_field_name("alias")
                                    .map(|n| text(n, source))
                                    .unwrap_or_else(|| original.clone());
                                symbols.local_exports.insert(alias, original);
                            }
                            if !inner.goto_next_sibling() {
                                break;
                            }
                        }
                    }
                }
                "default" => {
                    symbols.local_exports.insert("default".to_string(), "default".to_string());
                }
                _ => {}
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    #[test]
    fn resolves_named_import_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("util.ts"), "export function f() { return 1; }\n").unwrap();
        std::fs::write(
            dir.path().join("main.ts"),
            "import { f } from \"./util\";\nfunction main() { return f(); }\n",
        )
        .unwrap();

        let project = Project::load(dir.path(), &[], &[]).unwrap();
        let resolver = ModuleResolver::build(&project);
        let resolved = resolver.resolve_declaration("/main.ts", "f");
        assert_eq!(resolved, Some(("/util.ts".to_string(), "f".to_string())));
    }

    #[test]
    fn renamed_reexport_follows_through() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("impl.ts"), "export function g() { return 1; }\n").unwrap();
        std::fs::write(
            dir.path().join("index.ts"),
            "export { g as h } from \"./impl\";\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("main.ts"),
            "import { h } from \"./index\";\nfunction main() { return h(); }\n",
        )
        .unwrap();

        let project = Project::load(dir.path(), &[], &[]).unwrap();
        let resolver = ModuleResolver::build(&project);
        let resolved = resolver.resolve_declaration("/main.ts", "h");
        assert_eq!(resolved, Some(("/impl.ts".to_string(), "g".to_string())));
    }
}
