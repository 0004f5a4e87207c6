// ABOUTME: Source positions and the shared line-map utility every stage must use (§4.1).
use serde::{Deserialize, Serialize};

/// A POSIX-normalized (`/src/...`) file path plus an inclusive start/end range.
/// Columns are 0-based UTF-16 code units, matching the TypeScript compiler's line map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file_path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Location {
    pub fn point(file_path: impl Into<String>, line: u32, column: u32) -> Self {
        let file_path = file_path.into();
        Self {
            file_path,
            start_line: line,
            start_column: column,
            end_line: line,
            end_column: column,
        }
    }

    /// True if `self`'s inclusive line range strictly contains `other`'s (used to validate
    /// the "nested functions' ranges are strictly contained" invariant).
    pub fn strictly_contains(&self, other: &Location) -> bool {
        self.file_path == other.file_path
            && (self.start_line < other.start_line
                || (self.start_line == other.start_line && self.start_column < other.start_column))
            && (self.end_line > other.end_line
                || (self.end_line == other.end_line && self.end_column > other.end_column))
    }

    pub fn overlaps(&self, other: &Location) -> bool {
        if self.file_path != other.file_path {
            return false;
        }
        let self_start = (self.start_line, self.start_column);
        let self_end = (self.end_line, self.end_column);
        let other_start = (other.start_line, other.start_column);
        let other_end = (other.end_line, other.end_column);
        self_start <= other_end && other_start <= self_end
    }
}

/// Normalizes any path separator style and strips a leading project root into the POSIX
/// `/src/...` form the rest of the system assumes for `file_path`.
pub fn normalize_path(root: &std::path::Path, path: &std::path::Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let posix = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if posix.starts_with('/') {
        posix
    } else {
        format!("/{posix}")
    }
}

/// Precomputed byte-offset-of-line-start index for one file, used to translate a byte
/// offset (as tree-sitter reports) into a 1-based line and 0-based UTF-16 column without
/// rescanning the source text per query. Every stage shares one `LineIndex` per file so
/// line/column computation never drifts between stages.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the first byte of each line; `line_starts[0] == 0`.
    line_starts: Vec<usize>,
    source: String,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        Self {
            line_starts,
            source: source.to_string(),
        }
    }

    /// Returns the 1-based line and 0-based UTF-16 column for a byte offset.
    pub fn line_column(&self, byte_offset: usize) -> (u32, u32) {
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(exact) => exact,
            Err(insertion_point) => insertion_point.saturating_sub(1),
        };
        let line_start = self.line_starts[line_idx];
        let line_text = &self.source[line_start..byte_offset.min(self.source.len())];
        let column = line_text.encode_utf16().count() as u32;
        (line_idx as u32 + 1, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_first_column() {
        let idx = LineIndex::new("abc\ndef\n");
        assert_eq!(idx.line_column(0), (1, 0));
    }

    #[test]
    fn second_line() {
        let idx = LineIndex::new("abc\ndef\n");
        // byte offset 4 is 'd', the first byte of line 2
        assert_eq!(idx.line_column(4), (2, 0));
    }

    #[test]
    fn utf16_column_counts_surrogate_pairs() {
        // U+1F600 (grinning face) is 4 UTF-8 bytes but 2 UTF-16 code units.
        let src = "\u{1F600}x";
        let idx = LineIndex::new(src);
        let emoji_bytes = '\u{1F600}'.len_utf8();
        assert_eq!(idx.line_column(emoji_bytes), (1, 2));
    }

    #[test]
    fn strictly_contains_nested_range() {
        let outer = Location {
            file_path: "/src/a.ts".into(),
            start_line: 1,
            start_column: 0,
            end_line: 10,
            end_column: 1,
        };
        let inner = Location {
            file_path: "/src/a.ts".into(),
            start_line: 2,
            start_column: 0,
            end_line: 4,
            end_column: 1,
        };
        assert!(outer.strictly_contains(&inner));
        assert!(!inner.strictly_contains(&outer));
    }
}
