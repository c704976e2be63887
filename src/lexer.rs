//! Lexer
//!
//! The lexer converts source text into a `TokenStream`. It is built on the
//! `logos` crate; the wrapper layers in (line, column) bookkeeping, literal
//! validation, and error recovery. Lexing never stops at an error: the
//! offending input is reported and scanning continues.

use crate::ast::{Number, NumberValue};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::source::SourceFile;
use crate::span::Span;
use crate::token::{Token, TokenKind};
use logos::Logos;

/// The ordered token sequence of one source file, plus lexical errors.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    pub tokens: Vec<Token>,
    pub errors: Vec<Diagnostic>,
}

impl TokenStream {
    /// Lex a whole source file.
    pub fn lex(source: &SourceFile) -> Self {
        let mut stream = TokenStream::default();
        let mut inner = TokenKind::lexer(source.text());

        while let Some(result) = inner.next() {
            let range = inner.span();
            let span = Span::new(range.start, range.end);
            let pos = source.position(span.start);

            match result {
                Ok(kind) => {
                    let token = Token::new(kind, span, pos.line, pos.column);
                    stream.validate(&token, source);
                    stream.tokens.push(token);
                }
                Err(()) => {
                    let rest = &source.text()[span.start..];
                    let kind = if rest.starts_with('"') {
                        DiagnosticKind::UnterminatedString
                    } else if rest.starts_with("/*") {
                        DiagnosticKind::UnterminatedBlockComment
                    } else {
                        DiagnosticKind::UnexpectedChar(
                            rest.chars().next().unwrap_or('\0'),
                        )
                    };
                    stream.errors.push(Diagnostic::new(
                        kind,
                        pos.line,
                        pos.column,
                        span.start,
                    ));
                }
            }
        }

        let end = source.len();
        let pos = source.position(end);
        stream.tokens.push(Token::new(
            TokenKind::Eof,
            Span::new(end, end),
            pos.line,
            pos.column,
        ));
        stream
    }

    /// Literal well-formedness checks that the token grammar is too coarse
    /// to express: numeric suffixes and string escapes.
    fn validate(&mut self, token: &Token, source: &SourceFile) {
        let raw = token.text(source.text());
        match token.kind {
            TokenKind::IntLiteral => {
                let suffix = int_suffix(raw);
                if !matches!(
                    suffix,
                    "" | "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64"
                ) {
                    self.errors.push(Diagnostic::at_token(
                        DiagnosticKind::InvalidNumericSuffix(suffix.to_string()),
                        token,
                    ));
                }
            }
            TokenKind::FloatLiteral => {
                let suffix = float_suffix(raw);
                if !matches!(suffix, "" | "f32" | "f64") {
                    self.errors.push(Diagnostic::at_token(
                        DiagnosticKind::InvalidNumericSuffix(suffix.to_string()),
                        token,
                    ));
                }
            }
            TokenKind::StringLiteral => {
                if let Err(bad) = check_escapes(raw) {
                    self.errors.push(Diagnostic::at_token(
                        DiagnosticKind::InvalidEscape(bad),
                        token,
                    ));
                }
            }
            _ => {}
        }
    }
}

/// The alphabetic suffix of an integer literal, if any.
fn int_suffix(raw: &str) -> &str {
    match raw.find(|c: char| c.is_ascii_alphabetic()) {
        Some(i) => &raw[i..],
        None => "",
    }
}

/// The suffix of a float literal, skipping a well-formed exponent so its
/// `e` is not mistaken for a suffix.
fn float_suffix(raw: &str) -> &str {
    if let Some(i) = raw.find(['e', 'E']) {
        let after = &raw[i + 1..];
        let digits = after.strip_prefix(['+', '-']).unwrap_or(after);
        if !digits.starts_with(|c: char| c.is_ascii_digit()) {
            // `1.5e` has no exponent digits; everything from the marker on
            // is a (bad) suffix
            return &raw[i..];
        }
        return digits.trim_start_matches(|c: char| c.is_ascii_digit() || c == '_');
    }
    match raw.find(|c: char| c.is_ascii_alphabetic()) {
        Some(i) => &raw[i..],
        None => "",
    }
}

/// Validate the escape sequences of a quoted string literal.
fn check_escapes(raw: &str) -> Result<(), String> {
    let body = &raw[1..raw.len().saturating_sub(1)];
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            continue;
        }
        match chars.next() {
            Some('n' | 't' | 'r' | '\\' | '"' | '0') => {}
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                let ok = matches!((hi, lo), (Some(h), Some(l))
                    if h.is_ascii_hexdigit() && l.is_ascii_hexdigit());
                if !ok {
                    return Err("\\x".to_string());
                }
            }
            Some(other) => return Err(format!("\\{}", other)),
            None => return Err("\\".to_string()),
        }
    }
    Ok(())
}

/// Decode an integer literal (suffix already validated).
pub(crate) fn int_literal(raw: &str) -> Number {
    let digits_end = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let digits: String = raw[..digits_end].chars().filter(|c| *c != '_').collect();
    let magnitude = digits.parse::<u64>().unwrap_or(u64::MAX);

    let suffix = &raw[digits_end..];
    let (is_signed, bits) = match suffix {
        "i8" => (true, 8),
        "i16" => (true, 16),
        "i32" => (true, 32),
        "u8" => (false, 8),
        "u16" => (false, 16),
        "u32" => (false, 32),
        "u64" => (false, 64),
        _ => (true, 64),
    };

    Number {
        is_float: false,
        is_signed,
        bits,
        value: if is_signed {
            NumberValue::Signed(magnitude as i64)
        } else {
            NumberValue::Unsigned(magnitude)
        },
    }
}

/// Decode a float literal (suffix already validated).
pub(crate) fn float_literal(raw: &str) -> Number {
    let suffix = float_suffix(raw);
    let body: String = raw[..raw.len() - suffix.len()]
        .chars()
        .filter(|c| *c != '_')
        .collect();
    let bits = if suffix == "f32" { 32 } else { 64 };
    Number {
        is_float: true,
        is_signed: true,
        bits,
        value: NumberValue::Float(body.parse::<f64>().unwrap_or(0.0)),
    }
}

/// Decode a quoted string literal into its value. Escapes already validated;
/// anything unknown passes through unchanged.
pub(crate) fn string_literal(raw: &str) -> String {
    let body = &raw[1..raw.len().saturating_sub(1)];
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hi = chars.next().unwrap_or('0');
                let lo = chars.next().unwrap_or('0');
                let byte = (hi.to_digit(16).unwrap_or(0) * 16 + lo.to_digit(16).unwrap_or(0)) as u8;
                out.push(byte as char);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(text: &str) -> TokenStream {
        TokenStream::lex(&SourceFile::new("test.src", text))
    }

    fn kinds(text: &str) -> Vec<TokenKind> {
        lex(text)
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn test_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("fn op infix prefix suffix extern struct impl var let"),
            vec![
                TokenKind::Fn,
                TokenKind::Op,
                TokenKind::Infix,
                TokenKind::Prefix,
                TokenKind::Suffix,
                TokenKind::Extern,
                TokenKind::Struct,
                TokenKind::Impl,
                TokenKind::Var,
                TokenKind::Let,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_multi_char_operators_win() {
        assert_eq!(
            kinds("== != <= >= && || -> :: .. += "),
            vec![
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Arrow,
                TokenKind::ColonColon,
                TokenKind::DotDot,
                TokenKind::PlusEq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_int_suffixes() {
        let n = int_literal("255u8");
        assert!(!n.is_float);
        assert!(!n.is_signed);
        assert_eq!(n.bits, 8);
        assert_eq!(n.value, NumberValue::Unsigned(255));

        let n = int_literal("42");
        assert!(n.is_signed);
        assert_eq!(n.bits, 64);
        assert_eq!(n.value, NumberValue::Signed(42));
    }

    #[test]
    fn test_invalid_int_suffix() {
        let stream = lex("42u12");
        assert_eq!(stream.errors.len(), 1);
        assert!(matches!(
            stream.errors[0].kind,
            DiagnosticKind::InvalidNumericSuffix(_)
        ));
    }

    #[test]
    fn test_float_literals() {
        let n = float_literal("2.5e-3");
        assert!(n.is_float);
        assert_eq!(n.value, NumberValue::Float(2.5e-3));

        let n = float_literal("1.0f32");
        assert_eq!(n.bits, 32);
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(string_literal(r#""a\nb""#), "a\nb");
        assert_eq!(string_literal(r#""tab\there""#), "tab\there");
        assert_eq!(string_literal(r#""\x41""#), "A");

        let stream = lex(r#""bad \q escape""#);
        assert_eq!(stream.errors.len(), 1);
        assert!(matches!(
            stream.errors[0].kind,
            DiagnosticKind::InvalidEscape(_)
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let stream = lex("\"never closed");
        assert!(stream
            .errors
            .iter()
            .any(|e| e.kind == DiagnosticKind::UnterminatedString));
    }

    #[test]
    fn test_unknown_char_recovers() {
        let stream = lex("let # x");
        assert_eq!(stream.errors.len(), 1);
        let kinds: Vec<_> = stream
            .tokens
            .iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect();
        assert_eq!(
            kinds,
            vec![TokenKind::Let, TokenKind::Symbol, TokenKind::Eof]
        );
    }

    #[test]
    fn test_line_and_column_tracking() {
        let stream = lex("fn main\nreturn");
        let fn_tok = &stream.tokens[0];
        assert_eq!((fn_tok.line, fn_tok.column), (1, 1));
        let ret = stream
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::Return)
            .unwrap();
        assert_eq!((ret.line, ret.column), (2, 1));
    }

    #[test]
    fn test_round_trip() {
        let sources = [
            "fn main() -> i64 { return 42; }",
            "// comment\nlet x = 1; /* block */ var y: f64 = 2.5;\n",
            "infix op +(a: Vec, b: Vec) -> Vec { return a; }",
            "loop i in [1, 2, 3] { continue; }\n\t  \n",
            "\"string with \\n escape\" @attr(1)",
        ];
        for text in sources {
            let source = SourceFile::new("test.src", text);
            let stream = TokenStream::lex(&source);
            assert!(stream.errors.is_empty(), "unexpected errors for {:?}", text);
            let joined: String = stream
                .tokens
                .iter()
                .map(|t| t.text(text))
                .collect();
            assert_eq!(joined, text);
        }
    }
}
