// ABOUTME: Source Frontend: walks a project root, parses every TypeScript/TSX file with
// ABOUTME: tree-sitter, and keeps the resulting trees + line indexes in memory (spec §4.1).
use crate::language::dialect_for_path;
use codegraph_core::{normalize_path, LineIndex};
use globset::{Glob, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tree_sitter::{Parser, Tree};

/// One parsed source file: its tree, raw text and precomputed line index, keyed by the
/// normalized POSIX path every stage uses as the canonical file identity.
pub struct SourceFile {
    pub path: String,
    pub absolute_path: PathBuf,
    pub source: String,
    pub tree: Tree,
    pub line_index: LineIndex,
}

/// Files that were discovered but could not be parsed; recorded, never fatal (spec §4.1
/// failure semantics: "a source file that fails to parse contributes zero functions").
#[derive(Debug, Default, Clone)]
pub struct ScanDiagnostics {
    pub skipped_files: Vec<(String, String)>,
}

/// The in-memory project: every parsed file plus accumulated scan diagnostics. Read-only
/// once `load` returns (spec §5: "the AST project is read-only after load").
pub struct Project {
    pub root: PathBuf,
    files: HashMap<String, Arc<SourceFile>>,
    pub diagnostics: ScanDiagnostics,
}

impl Project {
    pub fn load(
        project_root: &Path,
        include_globs: &[String],
        exclude_globs: &[String],
    ) -> codegraph_core::Result<Self> {
        let include_set = build_globset(include_globs);
        let exclude_set = build_globset(exclude_globs);

        let mut walker_builder = WalkBuilder::new(project_root);
        walker_builder.hidden(false).git_ignore(true).git_exclude(true);
        let walker = walker_builder.build();

        let mut candidates = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() || dialect_for_path(path).is_none() {
                continue;
            }
            if let Some(set) = &exclude_set {
                if set.is_match(path) {
                    continue;
                }
            }
            if let Some(set) = &include_set {
                if !set.is_match(path) {
                    continue;
                }
            }
            candidates.push(path.to_path_buf());
        }

        // Each file's parse is fully independent (own Parser, own Tree), so the scan
        // fans out across rayon's global pool the same way the teacher's
        // `parallel_language_processor` processes a file batch.
        let loaded: Vec<FileLoadOutcome> = candidates
            .into_par_iter()
            .map(|absolute_path| load_one(project_root, absolute_path))
            .collect();

        let mut files = HashMap::new();
        let mut diagnostics = ScanDiagnostics::default();
        for outcome in loaded {
            match outcome {
                FileLoadOutcome::Loaded(file) => {
                    debug!(file = %file.path, "parsed source file");
                    files.insert(file.path.clone(), Arc::new(file));
                }
                FileLoadOutcome::Skipped(path, reason) => {
                    diagnostics.skipped_files.push((path, reason));
                }
            }
        }

        Ok(Self {
            root: project_root.to_path_buf(),
            files,
            diagnostics,
        })
    }

    pub fn file_of(&self, path: &str) -> Option<Arc<SourceFile>> {
        self.files.get(path).cloned()
    }

    pub fn files(&self) -> impl Iterator<Item = &Arc<SourceFile>> {
        self.files.values()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

enum FileLoadOutcome {
    Loaded(SourceFile),
    Skipped(String, String),
}

fn load_one(project_root: &Path, absolute_path: PathBuf) -> FileLoadOutcome {
    let normalized = normalize_path(project_root, &absolute_path);
    let dialect = match dialect_for_path(&absolute_path) {
        Some(d) => d,
        None => return FileLoadOutcome::Skipped(normalized, "unsupported extension".to_string()),
    };

    let source = match std::fs::read_to_string(&absolute_path) {
        Ok(s) => s,
        Err(e) => return FileLoadOutcome::Skipped(normalized, e.to_string()),
    };

    let mut parser = Parser::new();
    if parser.set_language(&dialect.grammar()).is_err() {
        return FileLoadOutcome::Skipped(normalized, "failed to load grammar".to_string());
    }

    let tree = match parser.parse(&source, None) {
        Some(t) => t,
        None => return FileLoadOutcome::Skipped(normalized, "parse failed".to_string()),
    };

    let line_index = LineIndex::new(&source);
    FileLoadOutcome::Loaded(SourceFile {
        path: normalized,
        absolute_path,
        source,
        tree,
        line_index,
    })
}

fn build_globset(patterns: &[String]) -> Option<globset::GlobSet> {
    if patterns.is_empty() {
        return None;
    }
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(e) => warn!("invalid glob pattern '{pattern}': {e}"),
        }
    }
    if added {
        builder.build().ok()
    } else {
        None
    }
}

/// Returns every descendant node of `node` whose kind matches `kind`, depth-first.
pub fn descendants_of_kind<'a>(node: tree_sitter::Node<'a>, kind: &str) -> Vec<tree_sitter::Node<'a>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    collect_descendants(&mut cursor, kind, &mut out);
    out
}

fn collect_descendants<'a>(
    cursor: &mut tree_sitter::TreeCursor<'a>,
    kind: &str,
    out: &mut Vec<tree_sitter::Node<'a>>,
) {
    let node = cursor.node();
    if node.kind() == kind {
        out.push(node);
    }
    if cursor.goto_first_child() {
        loop {
            collect_descendants(cursor, kind, out);
            if !cursor.goto_next_sibling() {
                break;
            }
        }
        cursor.goto_parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_ts_and_skips_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("src/a.ts")).unwrap();
        writeln!(f, "export function a() {{ return 1; }}").unwrap();
        std::fs::File::create(dir.path().join("src/README.md")).unwrap();

        let project = Project::load(dir.path(), &["src/**/*.ts".to_string()], &[]).unwrap();
        assert_eq!(project.file_count(), 1);
        assert!(project.file_of("/src/a.ts").is_some());
    }

    #[test]
    fn unreadable_extension_contributes_zero_functions() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(dir.path(), &[], &[]).unwrap();
        assert_eq!(project.file_count(), 0);
        assert!(project.diagnostics.skipped_files.is_empty());
    }
}
