//! Token definitions
//!
//! This module defines all the tokens the lexer can produce. Whitespace and
//! comments are real tokens rather than skipped input: the highlighter wants
//! them, and concatenating every token's text must reproduce the source
//! byte-for-byte.

use crate::span::Span;
use logos::Logos;
use std::fmt;

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// 1-indexed line of the first byte
    pub line: u32,
    /// 1-indexed column of the first byte
    pub column: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: u32, column: u32) -> Self {
        Self { kind, span, line, column }
    }

    /// Get the raw text of this token from source
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        self.span.text(source)
    }
}

/// All possible token types
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // ============ Trivia ============

    /// Whitespace run (kept for round-tripping and highlighting)
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    /// Line comment: `// ...`
    #[regex(r"//[^\n]*")]
    LineComment,

    /// Block comment: `/* ... */`
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
    BlockComment,

    // ============ Literals ============

    /// Integer literal with optional width suffix: 42, 255u8, 7i16.
    /// The trailing-identifier form also catches malformed suffixes so the
    /// lexer can report them instead of splitting the token.
    #[regex(r"[0-9][0-9_]*", priority = 3)]
    #[regex(r"[0-9][0-9_]*[A-Za-z][A-Za-z0-9_]*", priority = 2)]
    IntLiteral,

    /// Float literal: 3.14, 2.5e-3, 1.0f32
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9][0-9_]*)?([A-Za-z][A-Za-z0-9_]*)?")]
    FloatLiteral,

    /// String literal with escapes: "hello\n"
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,

    /// Boolean literals
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ============ Keywords ============

    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("loop")]
    Loop,
    #[token("in")]
    In,
    #[token("fn")]
    Fn,
    #[token("op")]
    Op,
    #[token("infix")]
    Infix,
    #[token("prefix")]
    Prefix,
    #[token("suffix")]
    Suffix,
    #[token("extern")]
    Extern,
    #[token("struct")]
    Struct,
    #[token("impl")]
    Impl,
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("return")]
    Return,
    #[token("continue")]
    Continue,
    #[token("break")]
    Break,
    #[token("use")]
    Use,
    #[token("namespace")]
    Namespace,

    // ============ Operators ============

    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Not,

    // ============ Punctuation ============

    #[token("->")]
    Arrow,
    #[token("::")]
    ColonColon,
    #[token("..")]
    DotDot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
    #[token("@")]
    At,

    // ============ Identifiers ============

    /// Identifier: foo, _bar, Vec3
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Symbol,

    // ============ Special ============

    /// End of file
    Eof,
}

impl TokenKind {
    /// Whitespace and comments: produced but semantically ignored.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    /// Check if this token is a keyword
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Else
                | TokenKind::Loop
                | TokenKind::In
                | TokenKind::Fn
                | TokenKind::Op
                | TokenKind::Infix
                | TokenKind::Prefix
                | TokenKind::Suffix
                | TokenKind::Extern
                | TokenKind::Struct
                | TokenKind::Impl
                | TokenKind::Var
                | TokenKind::Let
                | TokenKind::Return
                | TokenKind::Continue
                | TokenKind::Break
                | TokenKind::Use
                | TokenKind::Namespace
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Check if this token is a literal
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::StringLiteral
                | TokenKind::True
                | TokenKind::False
        )
    }

    /// Operator tokens: candidates for user-defined affixes.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::LtEq
                | TokenKind::GtEq
                | TokenKind::AndAnd
                | TokenKind::OrOr
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::Eq
                | TokenKind::Lt
                | TokenKind::Gt
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Not
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::LineComment => "comment",
            TokenKind::BlockComment => "comment",
            TokenKind::IntLiteral => "integer",
            TokenKind::FloatLiteral => "float",
            TokenKind::StringLiteral => "string",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Loop => "loop",
            TokenKind::In => "in",
            TokenKind::Fn => "fn",
            TokenKind::Op => "op",
            TokenKind::Infix => "infix",
            TokenKind::Prefix => "prefix",
            TokenKind::Suffix => "suffix",
            TokenKind::Extern => "extern",
            TokenKind::Struct => "struct",
            TokenKind::Impl => "impl",
            TokenKind::Var => "var",
            TokenKind::Let => "let",
            TokenKind::Return => "return",
            TokenKind::Continue => "continue",
            TokenKind::Break => "break",
            TokenKind::Use => "use",
            TokenKind::Namespace => "namespace",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::LtEq => "<=",
            TokenKind::GtEq => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::Eq => "=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Not => "!",
            TokenKind::Arrow => "->",
            TokenKind::ColonColon => "::",
            TokenKind::DotDot => "..",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Colon => ":",
            TokenKind::Dot => ".",
            TokenKind::At => "@",
            TokenKind::Symbol => "identifier",
            TokenKind::Eof => "end of file",
        };
        write!(f, "{}", s)
    }
}
