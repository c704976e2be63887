//! Driver
//!
//! Queues source files, sequences the phases over the whole set, and writes
//! the IL stream. Phase gates follow the error list: lexical errors stop a
//! file before parsing, any accumulated diagnostic stops the set before the
//! next phase, and code generation runs only on a clean analysis.

use crate::ast::{Node, NodeKind};
use crate::codegen::Codegen;
use crate::diagnostics::{self, Diagnostic};
use crate::il::Emitter;
use crate::lexer::TokenStream;
use crate::parser;
use crate::sema::visitor::run_pass;
use crate::sema::{analyze, generate, SemaContext};
use crate::source::SourceFile;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Driver configuration from the CLI.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

/// Why a compilation produced no output.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("compilation failed with {0} error(s)")]
    Diagnostics(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One queued file moving through the pipeline.
struct Unit {
    source: SourceFile,
    tokens: TokenStream,
    ast: Node,
    diags: Vec<Diagnostic>,
}

/// The compiler driver: queue files, then compile the whole set.
pub struct Driver {
    queued: Vec<PathBuf>,
    options: Options,
}

impl Driver {
    pub fn new(options: Options) -> Self {
        Self {
            queued: Vec::new(),
            options,
        }
    }

    pub fn queue_file(&mut self, path: impl Into<PathBuf>) {
        self.queued.push(path.into());
    }

    /// Compile every queued file and write the IL stream to `out`.
    pub fn compile_write_binary(&mut self, out: &Path) -> Result<(), CompileError> {
        let bytes = self.compile()?;
        std::fs::write(out, bytes)?;
        Ok(())
    }

    /// Compile every queued file to an in-memory IL stream, rendering
    /// diagnostics to stderr on failure.
    pub fn compile(&mut self) -> Result<Vec<u8>, CompileError> {
        let mut units = Vec::with_capacity(self.queued.len());
        let mut next_id = 0;
        for path in &self.queued {
            let source = SourceFile::read(path)?;
            let (unit, next) = load_unit(source, &self.options, next_id);
            next_id = next;
            units.push(unit);
        }

        match pipeline(&mut units) {
            Some(bytes) => Ok(bytes),
            None => {
                let mut count = 0;
                for unit in &mut units {
                    for diag in &mut unit.diags {
                        if diag.offset == 0 {
                            diag.offset = unit.source.offset_of(diag.line, diag.column);
                        }
                    }
                    diagnostics::render_all(&unit.diags, &unit.source, &unit.tokens.tokens);
                    count += unit.diags.len();
                }
                Err(CompileError::Diagnostics(count))
            }
        }
    }
}

/// Compile in-memory source text. Diagnostics are returned, not rendered;
/// this is the embedding and test entry point.
pub fn compile_source(name: &str, text: &str) -> Result<Vec<u8>, Vec<Diagnostic>> {
    let source = SourceFile::new(name, text);
    let (unit, _) = load_unit(source, &Options::default(), 0);
    let mut units = vec![unit];
    match pipeline(&mut units) {
        Some(bytes) => Ok(bytes),
        None => Err(units.remove(0).diags),
    }
}

/// Lex and (when clean) parse one file. Node ids continue from `next_id` so
/// they stay unique across the file set; the next unused id is returned.
fn load_unit(
    source: SourceFile,
    options: &Options,
    next_id: crate::ast::NodeId,
) -> (Unit, crate::ast::NodeId) {
    let tokens = TokenStream::lex(&source);
    if options.dump_tokens {
        for token in &tokens.tokens {
            println!(
                "{:>4}..{:<4} {:16} {:?}",
                token.span.start,
                token.span.end,
                format!("{:?}", token.kind),
                token.text(source.text())
            );
        }
    }

    let mut diags = tokens.errors.clone();
    let (ast, next) = if diags.is_empty() {
        let (ast, parse_errors, next) = parser::parse_with_base(&source, &tokens, next_id);
        diags.extend(parse_errors);
        (ast, next)
    } else {
        // lexing failed; an empty root keeps the unit well-formed
        (Node::new(next_id, NodeKind::Block(Vec::new()), 1, 1), next_id + 1)
    };

    if options.dump_ast {
        println!("{:#?}", ast);
    }

    let unit = Unit {
        source,
        tokens,
        ast,
        diags,
    };
    (unit, next)
}

/// Run the semantic passes and code generation over the file set. Returns
/// `None` as soon as any phase gate finds accumulated diagnostics.
fn pipeline(units: &mut [Unit]) -> Option<Vec<u8>> {
    if units.iter().any(|unit| !unit.diags.is_empty()) {
        return None;
    }

    let mut cx = SemaContext::new();
    let gen_table = generate::handlers();
    let analyze_table = analyze::handlers();
    let passes = gen_table.max_pass().max(analyze_table.max_pass());

    for pass in 0..=passes {
        for unit in units.iter_mut() {
            cx.begin_file();
            run_pass(&gen_table, &mut cx, &mut unit.ast, pass);
            run_pass(&analyze_table, &mut cx, &mut unit.ast, pass);
            unit.diags.extend(cx.errors.drain(..));
        }
    }

    if units.iter().any(|unit| !unit.diags.is_empty()) {
        return None;
    }

    let mut emitter = Emitter::new();
    for unit in units.iter() {
        Codegen::new(&mut cx.scopes, &mut emitter).run(&unit.ast);
    }
    // module epilogue
    emitter.ret();
    Some(emitter.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticKind;

    #[test]
    fn test_empty_program_single_return_byte() {
        let bytes = compile_source("empty.src", "").unwrap();
        assert_eq!(bytes, vec![0x22]);
    }

    #[test]
    fn test_unresolved_call_produces_no_il() {
        let err = compile_source("bad.src", "fn main() { foo(1); }").unwrap_err();
        assert_eq!(err.len(), 1);
        assert!(matches!(
            &err[0].kind,
            DiagnosticKind::UnresolvedCall { name, arg_types }
                if name == "foo" && arg_types == &["i64".to_string()]
        ));
    }

    #[test]
    fn test_parse_errors_stop_before_analysis() {
        let err = compile_source("bad.src", "fn main( { }").unwrap_err();
        assert!(!err.is_empty());
        assert!(err
            .iter()
            .all(|d| matches!(
                d.kind,
                DiagnosticKind::UnexpectedToken { .. } | DiagnosticKind::UnexpectedEof
            )));
    }

    #[test]
    fn test_lex_errors_stop_before_parse() {
        let err = compile_source("bad.src", "let x = \"unterminated").unwrap_err();
        assert!(err
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnterminatedString));
    }

    #[test]
    fn test_byte_identical_recompilation() {
        let text = "struct Vec { var x: f64; }\n\
                    infix op +(a: Vec, b: Vec) -> Vec { return a; }\n\
                    fn f(a: Vec, b: Vec) -> Vec { return a + b; }\n\
                    fn main() -> i64 { return 42; }";
        let first = compile_source("pure.src", text).unwrap();
        let second = compile_source("pure.src", text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_multi_file_shared_global_scope() {
        // compile_source drives a single unit; the multi-unit path shares
        // SemaContext the same way, exercised here through the pipeline.
        let a = SourceFile::new("a.src", "fn helper() -> i64 { return 1; }");
        let b = SourceFile::new("b.src", "fn main() -> i64 { return helper(); }");
        let (unit_a, next) = load_unit(a, &Options::default(), 0);
        let (unit_b, _) = load_unit(b, &Options::default(), next);
        let mut units = vec![unit_a, unit_b];
        let bytes = pipeline(&mut units).expect("cross-file call resolves");
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_cross_file_redeclaration_detected() {
        let a = SourceFile::new("a.src", "fn main() { }");
        let b = SourceFile::new("b.src", "fn main() { }");
        let (unit_a, next) = load_unit(a, &Options::default(), 0);
        let (unit_b, _) = load_unit(b, &Options::default(), next);
        let mut units = vec![unit_a, unit_b];
        assert!(pipeline(&mut units).is_none());
        assert!(units[1]
            .diags
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::Redeclaration { .. })));
    }

    #[test]
    fn test_namespaced_cross_file_call() {
        let a = SourceFile::new(
            "math.src",
            "namespace math;\nfn abs(x: i64) -> i64 { return x; }",
        );
        let b = SourceFile::new(
            "main.src",
            "use math;\nfn main() -> i64 { return abs(3); }",
        );
        let (unit_a, next) = load_unit(a, &Options::default(), 0);
        let (unit_b, _) = load_unit(b, &Options::default(), next);
        let mut units = vec![unit_a, unit_b];
        assert!(pipeline(&mut units).is_some());
    }
}
