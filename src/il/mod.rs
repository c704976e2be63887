//! Intermediate language
//!
//! The backend-facing half of the compiler: the opcode inventory and the
//! byte-stream emitter the code generator targets. The virtual machine that
//! consumes the stream is an external project.

pub mod emitter;
pub mod opcode;

pub use emitter::{Emitter, Label};
pub use opcode::{BinOp, UnOp};
