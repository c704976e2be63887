//! Source file buffer
//!
//! A `SourceFile` owns the UTF-8 text of one queued file and maps byte
//! offsets back to (line, column) positions. The line-start table is built
//! once up front so diagnostics and token construction stay O(log n).

use crate::span::Position;
use std::io;
use std::path::{Path, PathBuf};

/// One queued source file: path, contents, and line index.
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: PathBuf,
    text: String,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Create a source buffer from in-memory text.
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    /// Read a source file from disk.
    pub fn read(path: &Path) -> io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(path, text))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Map a byte offset to a 1-indexed (line, column) position.
    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = offset - self.line_starts[line];
        Position::new(line as u32 + 1, column as u32 + 1)
    }

    /// Byte offset of a 1-indexed (line, column) position.
    pub fn offset_of(&self, line: u32, column: u32) -> usize {
        let i = (line as usize).saturating_sub(1);
        let start = self.line_starts.get(i).copied().unwrap_or(self.text.len());
        (start + column.saturating_sub(1) as usize).min(self.text.len())
    }

    /// The text of a 1-indexed line, without its trailing newline.
    pub fn line_text(&self, line: u32) -> &str {
        let i = (line as usize).saturating_sub(1);
        let start = self.line_starts.get(i).copied().unwrap_or(self.text.len());
        let end = self
            .line_starts
            .get(i + 1)
            .map(|s| s - 1)
            .unwrap_or(self.text.len());
        &self.text[start..end.max(start)]
    }

    /// Number of lines in the file.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_mapping() {
        let src = SourceFile::new("test.src", "let x = 1;\nlet y = 2;\n");
        assert_eq!(src.position(0), Position::new(1, 1));
        assert_eq!(src.position(4), Position::new(1, 5));
        assert_eq!(src.position(11), Position::new(2, 1));
        assert_eq!(src.position(15), Position::new(2, 5));
    }

    #[test]
    fn test_line_text() {
        let src = SourceFile::new("test.src", "first\nsecond\nthird");
        assert_eq!(src.line_text(1), "first");
        assert_eq!(src.line_text(2), "second");
        assert_eq!(src.line_text(3), "third");
    }

    #[test]
    fn test_empty_file() {
        let src = SourceFile::new("test.src", "");
        assert_eq!(src.position(0), Position::new(1, 1));
        assert_eq!(src.line_count(), 1);
    }
}
