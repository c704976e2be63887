//! Diagnostics
//!
//! Every phase of the compiler accumulates `Diagnostic` values into a list;
//! no phase unwinds on the first error. A diagnostic records where it points
//! (byte offset, line, column) and how many tokens its caret underlines.

use crate::source::SourceFile;
use crate::token::Token;
use colored::Colorize;
use std::fmt::Write as _;
use thiserror::Error;

/// Everything that can go wrong between reading a file and emitting IL.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    // ============ Lexical ============
    #[error("unexpected character `{0}`")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated block comment")]
    UnterminatedBlockComment,

    #[error("invalid numeric suffix `{0}`")]
    InvalidNumericSuffix(String),

    #[error("invalid escape sequence `{0}`")]
    InvalidEscape(String),

    // ============ Syntactic ============
    #[error("unexpected token: expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of file")]
    UnexpectedEof,

    // ============ Name resolution ============
    #[error("undeclared symbol `{name}`")]
    UndeclaredSymbol { name: String },

    #[error("`{name}` is already declared in this scope")]
    Redeclaration { name: String },

    #[error("unresolved call to `{name}({})`", .arg_types.join(", "))]
    UnresolvedCall { name: String, arg_types: Vec<String> },

    #[error("ambiguous call to `{name}`: multiple overloads match")]
    AmbiguousCall { name: String },

    #[error("no operator `{op}` for operand types ({})", .operand_types.join(", "))]
    UnresolvedOperator { op: String, operand_types: Vec<String> },

    // ============ Types ============
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("`if` condition must be boolean, found {found}")]
    NonBooleanCondition { found: String },

    #[error("loop condition must be boolean, found {found}")]
    NonBooleanLoopCondition { found: String },

    #[error("index must be an integer, found {found}")]
    NonIntegerIndex { found: String },

    #[error("value of type {found} cannot be indexed")]
    NotIndexable { found: String },

    #[error("cannot iterate over value of type {found}")]
    NonIterableLoop { found: String },

    #[error("return type mismatch: expected {expected}, found {found}")]
    ReturnTypeMismatch { expected: String, found: String },

    #[error("cannot assign to immutable binding `{name}`")]
    AssignToImmutable { name: String },

    #[error("expression cannot be assigned to")]
    InvalidAssignmentTarget,

    #[error("`{name}` has no type annotation and no initializer")]
    MissingInitializer { name: String },

    // ============ Structural ============
    #[error("`break` outside of a loop")]
    BreakOutsideLoop,

    #[error("`continue` outside of a loop")]
    ContinueOutsideLoop,

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error("extern function `{name}` must not have a body")]
    ExternWithBody { name: String },

    #[error("attribute `{name}` cannot be applied here")]
    InvalidAttribute { name: String },
}

/// A located diagnostic. `count` is the number of tokens the caret covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
    pub count: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, line: u32, column: u32, offset: usize) -> Self {
        Self { kind, line, column, offset, count: 1 }
    }

    /// Point the diagnostic at an existing token.
    pub fn at_token(kind: DiagnosticKind, token: &Token) -> Self {
        Self {
            kind,
            line: token.line,
            column: token.column,
            offset: token.span.start,
            count: 1,
        }
    }

    /// Widen the caret to cover `count` tokens from the offset.
    pub fn spanning(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Format one diagnostic with its source snippet and caret span.
pub fn render(diag: &Diagnostic, source: &SourceFile, tokens: &[Token]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}: {}",
        "error".red().bold(),
        diag.message().yellow()
    );
    let _ = writeln!(
        out,
        "  --> {}:{}:{}",
        source.path().display(),
        diag.line.to_string().blue(),
        diag.column.to_string().blue()
    );

    let line_text = source.line_text(diag.line);
    let _ = writeln!(out, "   | {}", line_text);

    let width = caret_width(diag, tokens);
    let pad = " ".repeat(diag.column.saturating_sub(1) as usize);
    let _ = writeln!(out, "   | {}{}", pad, "^".repeat(width).red().bold());
    out
}

/// Render every diagnostic for one file to stderr, in order.
pub fn render_all(diags: &[Diagnostic], source: &SourceFile, tokens: &[Token]) {
    for diag in diags {
        eprint!("{}", render(diag, source, tokens));
    }
}

/// Width in characters of the caret underline: the extent of `count` tokens
/// starting at the diagnostic's offset, clamped to the line.
fn caret_width(diag: &Diagnostic, tokens: &[Token]) -> usize {
    let start = match tokens.iter().position(|t| t.span.start >= diag.offset) {
        Some(i) => i,
        None => return 1,
    };
    let end_token = tokens
        .iter()
        .skip(start)
        .filter(|t| !t.kind.is_trivia())
        .take(diag.count)
        .last();
    match end_token {
        Some(t) if t.span.end > diag.offset && t.line == diag.line => t.span.end - diag.offset,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenStream;

    #[test]
    fn test_render_points_at_line() {
        let source = SourceFile::new("demo.src", "let x = 1;\nx = 2;\n");
        let stream = TokenStream::lex(&source);
        let diag = Diagnostic::new(
            DiagnosticKind::AssignToImmutable { name: "x".into() },
            2,
            1,
            11,
        );
        let rendered = render(&diag, &source, &stream.tokens);
        assert!(rendered.contains("demo.src"));
        assert!(rendered.contains("x = 2;"));
        assert!(rendered.contains('^'));
    }

    #[test]
    fn test_caret_covers_token_span() {
        let source = SourceFile::new("demo.src", "@inline use math;\n");
        let stream = TokenStream::lex(&source);
        let diag = Diagnostic::new(
            DiagnosticKind::InvalidAttribute {
                name: "inline".into(),
            },
            1,
            1,
            0,
        )
        .spanning(2);
        let rendered = render(&diag, &source, &stream.tokens);
        // `@inline` is seven columns wide
        assert!(rendered.contains(&"^".repeat(7)));
        assert!(!rendered.contains(&"^".repeat(8)));
    }

    #[test]
    fn test_kind_messages() {
        let kind = DiagnosticKind::UnresolvedCall {
            name: "foo".into(),
            arg_types: vec!["i64".into()],
        };
        assert_eq!(kind.to_string(), "unresolved call to `foo(i64)`");
    }
}
