//! IL opcodes
//!
//! Byte values of the IL instruction set. The stream is raw little-endian
//! opcodes with no header; operand widths are fixed per opcode and listed
//! next to each constant.

use std::fmt;

pub const PUSH_I64: u8 = 0x01; // + 8 bytes value
pub const PUSH_F64: u8 = 0x02; // + 8 bytes value
pub const PUSH_STR: u8 = 0x03; // + u32 length + bytes
pub const LOAD_LOCAL: u8 = 0x10; // + u16 slot
pub const STORE_LOCAL: u8 = 0x11; // + u16 slot
pub const CALL: u8 = 0x20; // + u32 fn-id
pub const EXTERN_CALL: u8 = 0x21; // + u32 fn-id
pub const RETURN: u8 = 0x22;
pub const BRANCH: u8 = 0x30; // + i32 rel
pub const BRANCH_IF_FALSE: u8 = 0x31; // + i32 rel
pub const BINOP: u8 = 0x40; // + u8 kind
pub const UNOP: u8 = 0x41; // + u8 kind
pub const ARRAY_NEW: u8 = 0x50; // + u32 length
pub const INDEX_LOAD: u8 = 0x51;
pub const INDEX_STORE: u8 = 0x52;
pub const STRUCT_ALLOC: u8 = 0x53; // + u16 field count
pub const FIELD_LOAD: u8 = 0x54; // + u16 field index
pub const FIELD_STORE: u8 = 0x55; // + u16 field index
pub const ITER_NEW: u8 = 0x56;
pub const ITER_NEXT: u8 = 0x57; // + i32 rel (branch-if-done)
pub const FN_HEADER: u8 = 0x60; // + u32 fn-id + u16 name len + name bytes

/// Binary operation kinds. Arithmetic is split by operand scalar class;
/// comparisons and logical operations leave the operand class to the
/// consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BinOp {
    AddI = 0x00,
    SubI = 0x01,
    MulI = 0x02,
    DivI = 0x03,
    RemI = 0x04,
    AddF = 0x05,
    SubF = 0x06,
    MulF = 0x07,
    DivF = 0x08,
    Eq = 0x09,
    Ne = 0x0A,
    Lt = 0x0B,
    Le = 0x0C,
    Gt = 0x0D,
    Ge = 0x0E,
    And = 0x0F,
    Or = 0x10,
}

impl BinOp {
    /// The opcode kind for a built-in operator over the given operand
    /// class. Returns `None` for operators that never emit a binop.
    pub fn for_op(op: &str, float_operands: bool) -> Option<BinOp> {
        let kind = match (op, float_operands) {
            ("+", false) => BinOp::AddI,
            ("-", false) => BinOp::SubI,
            ("*", false) => BinOp::MulI,
            ("/", false) => BinOp::DivI,
            ("%", false) => BinOp::RemI,
            ("+", true) => BinOp::AddF,
            ("-", true) => BinOp::SubF,
            ("*", true) => BinOp::MulF,
            ("/", true) => BinOp::DivF,
            ("==", _) => BinOp::Eq,
            ("!=", _) => BinOp::Ne,
            ("<", _) => BinOp::Lt,
            ("<=", _) => BinOp::Le,
            (">", _) => BinOp::Gt,
            (">=", _) => BinOp::Ge,
            ("&&", _) => BinOp::And,
            ("||", _) => BinOp::Or,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::AddI => "add.i",
            BinOp::SubI => "sub.i",
            BinOp::MulI => "mul.i",
            BinOp::DivI => "div.i",
            BinOp::RemI => "rem.i",
            BinOp::AddF => "add.f",
            BinOp::SubF => "sub.f",
            BinOp::MulF => "mul.f",
            BinOp::DivF => "div.f",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::And => "and",
            BinOp::Or => "or",
        };
        write!(f, "{}", s)
    }
}

/// Unary operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UnOp {
    NegI = 0x00,
    NegF = 0x01,
    Not = 0x02,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnOp::NegI => "neg.i",
            UnOp::NegF => "neg.f",
            UnOp::Not => "not",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binop_selection() {
        assert_eq!(BinOp::for_op("+", false), Some(BinOp::AddI));
        assert_eq!(BinOp::for_op("+", true), Some(BinOp::AddF));
        assert_eq!(BinOp::for_op("<=", false), Some(BinOp::Le));
        assert_eq!(BinOp::for_op("=", false), None);
    }
}
