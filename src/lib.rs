//! Sable Compiler
//!
//! Bootstrap compiler for the Sable programming language: a statically
//! typed, block structured language with user-defined operators. The
//! frontend lowers source files to a flat intermediate-language byte
//! stream; the virtual machine consuming that stream lives elsewhere.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.src)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → Tokens
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → AST
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Semantic   │  → populated scopes, annotated AST
//! │  Passes     │
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Code Gen   │  → IL bytes
//! └─────────────┘
//! ```

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod driver;
pub mod il;
pub mod lexer;
pub mod parser;
pub mod sema;
pub mod source;
pub mod span;
pub mod token;

// Re-exports for convenience
pub use lexer::TokenStream;
pub use source::SourceFile;
pub use span::{Position, Span};
pub use token::{Token, TokenKind};

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for Sable source files
pub const FILE_EXTENSION: &str = "src";
