// ABOUTME: Selects the tree-sitter grammar for a source file by extension: the
// ABOUTME: TypeScript grammar for `.ts`, the TSX grammar for `.tsx`.
use tree_sitter::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDialect {
    TypeScript,
    Tsx,
}

impl SourceDialect {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "ts" => Some(SourceDialect::TypeScript),
            "tsx" => Some(SourceDialect::Tsx),
            _ => None,
        }
    }

    pub fn grammar(self) -> Language {
        match self {
            SourceDialect::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceDialect::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

pub fn dialect_for_path(path: &std::path::Path) -> Option<SourceDialect> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceDialect::from_extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn tsx_files_get_the_tsx_grammar() {
        assert_eq!(dialect_for_path(Path::new("a/b.tsx")), Some(SourceDialect::Tsx));
    }

    #[test]
    fn non_typescript_extensions_are_unsupported() {
        assert_eq!(dialect_for_path(Path::new("a/b.rs")), None);
    }
}
