//! Source positions and line lookup
//!
//! The parser works on byte offsets. Diagnostics need 1-based line and
//! column numbers plus the text of nearby lines, so every source is wrapped
//! in a [`SourceText`] that keeps the line boundaries alongside the text.

use serde::Serialize;
use std::fmt;

/// 1-based line and column of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Line index for fast byte offset to line/column conversion
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets where each line starts
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { line_starts }
    }

    /// Convert a byte offset in `source`, the text this index was built
    /// from, to a 1-based location; columns count characters
    pub fn location(&self, source: &str, offset: usize) -> SourceLocation {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let start = self.line_starts.get(line).copied().unwrap_or(0);
        let column = source
            .get(start..offset)
            .map_or(offset.saturating_sub(start), |prefix| prefix.chars().count());
        SourceLocation::new(line + 1, column + 1)
    }

    /// Byte range of a 1-based line, excluding the newline
    fn line_range(&self, line: usize, len: usize) -> Option<(usize, usize)> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(len);
        Some((start, end))
    }
}

/// Source text with its name and line index
#[derive(Debug, Clone)]
pub struct SourceText {
    name: String,
    text: String,
    index: LineIndex,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let index = LineIndex::new(&text);
        Self {
            name: name.into(),
            text,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self, offset: usize) -> SourceLocation {
        self.index.location(&self.text, offset)
    }

    /// Number of lines; a trailing newline does not start another line
    pub fn line_count(&self) -> usize {
        let starts = self.index.line_starts.len();
        if self.text.ends_with('\n') {
            starts - 1
        } else {
            starts
        }
    }

    /// Text of a 1-based line without its line terminator
    pub fn line(&self, line: usize) -> Option<&str> {
        if line > self.line_count() {
            return None;
        }
        let (start, end) = self.index.line_range(line, self.text.len())?;
        let text = self.text.get(start..end)?;
        Some(text.strip_suffix('\r').unwrap_or(text))
    }

    /// Lines `line - radius ..= line + radius`, clipped to the source
    pub fn context(&self, line: usize, radius: usize) -> Vec<&str> {
        let first = line.saturating_sub(radius).max(1);
        let last = line.saturating_add(radius).min(self.line_count());
        (first..=last).filter_map(|n| self.line(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let text = "line1\nline2\nline3";
        let index = LineIndex::new(text);

        assert_eq!(index.location(text, 0), SourceLocation::new(1, 1));
        assert_eq!(index.location(text, 6), SourceLocation::new(2, 1));
        assert_eq!(index.location(text, 14), SourceLocation::new(3, 3));
    }

    #[test]
    fn test_column_counts_characters() {
        let source = SourceText::new("stdin", "a {\n  größe: @;\n}");
        let offset = source.text().find('@').unwrap();

        assert_eq!(offset, 15);
        assert_eq!(source.location(offset), SourceLocation::new(2, 10));
    }

    #[test]
    fn test_line_lookup() {
        let source = SourceText::new("stdin", "a {\r\n  b: c;\n}\n");

        assert_eq!(source.line_count(), 3);
        assert_eq!(source.line(1), Some("a {"));
        assert_eq!(source.line(2), Some("  b: c;"));
        assert_eq!(source.line(3), Some("}"));
        assert_eq!(source.line(4), None);
        assert_eq!(source.line(0), None);
    }

    #[test]
    fn test_context_is_clipped() {
        let source = SourceText::new("stdin", "one\ntwo\nthree\nfour");

        assert_eq!(source.context(1, 1), ["one", "two"]);
        assert_eq!(source.context(3, 1), ["two", "three", "four"]);
        assert_eq!(source.context(4, 1), ["three", "four"]);
        assert_eq!(source.context(2, 0), ["two"]);
        assert_eq!(source.context(2, 10).len(), 4);
    }

    proptest::proptest! {
        #[test]
        fn prop_location_counts_newlines(text in "[a-z \n]{0,64}", pick in 0usize..=64) {
            let offset = pick.min(text.len());
            let before = &text[..offset];
            let expected_line = before.matches('\n').count() + 1;
            let expected_column = offset - before.rfind('\n').map_or(0, |i| i + 1) + 1;

            let location = LineIndex::new(&text).location(&text, offset);
            proptest::prop_assert_eq!(location.line, expected_line);
            proptest::prop_assert_eq!(location.column, expected_column);
        }
    }
}
