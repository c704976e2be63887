//! Source locations
//!
//! Tokens carry two views of where they came from: the byte range they were
//! lexed from, and the 1-indexed (line, column) position diagnostics print.
//! `SourceFile` owns the mapping between the two; nothing here looks at the
//! text itself beyond slicing it.

/// A half-open byte range into one source file's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First byte of the range
    pub start: usize,
    /// One past the last byte
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The raw source text this span covers. Concatenating the text of every
    /// token in a stream reproduces the file byte-for-byte.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// A 1-indexed line and column, as printed in `file:line:column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}
