//! IL emitter
//!
//! An append-only byte stream with labels. Branch targets are emitted as
//! i32 relatives measured from the end of the operand; branches against a
//! label that is not yet bound record a patch site, and `finish()` resolves
//! every site before the stream is handed back. An unbound label at finish
//! is a code generator bug.

use super::opcode::{self, BinOp, UnOp};

/// A branch target. Cheap to copy; create with [`Emitter::new_label`], pin
/// with [`Emitter::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(u32);

/// The growing IL byte stream.
#[derive(Debug, Default)]
pub struct Emitter {
    stream: Vec<u8>,
    labels: Vec<Option<usize>>,
    patches: Vec<(usize, Label)>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte offset.
    pub fn offset(&self) -> usize {
        self.stream.len()
    }

    // ============ Labels ============

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Bind a label to the current offset.
    pub fn bind(&mut self, label: Label) {
        debug_assert!(
            self.labels[label.0 as usize].is_none(),
            "label bound twice"
        );
        self.labels[label.0 as usize] = Some(self.stream.len());
    }

    /// Emit a 4-byte relative operand for `label`, patched later if the
    /// label is still unbound.
    fn rel_operand(&mut self, label: Label) {
        match self.labels[label.0 as usize] {
            Some(target) => {
                let rel = target as i64 - (self.stream.len() as i64 + 4);
                self.stream.extend_from_slice(&(rel as i32).to_le_bytes());
            }
            None => {
                self.patches.push((self.stream.len(), label));
                self.stream.extend_from_slice(&0i32.to_le_bytes());
            }
        }
    }

    // ============ Opcodes ============

    pub fn push_i64(&mut self, value: i64) {
        self.stream.push(opcode::PUSH_I64);
        self.stream.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_f64(&mut self, value: f64) {
        self.stream.push(opcode::PUSH_F64);
        self.stream.extend_from_slice(&value.to_le_bytes());
    }

    pub fn push_str(&mut self, value: &str) {
        self.stream.push(opcode::PUSH_STR);
        self.stream
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.stream.extend_from_slice(value.as_bytes());
    }

    pub fn load_local(&mut self, slot: u16) {
        self.stream.push(opcode::LOAD_LOCAL);
        self.stream.extend_from_slice(&slot.to_le_bytes());
    }

    pub fn store_local(&mut self, slot: u16) {
        self.stream.push(opcode::STORE_LOCAL);
        self.stream.extend_from_slice(&slot.to_le_bytes());
    }

    pub fn call(&mut self, fn_id: u32) {
        self.stream.push(opcode::CALL);
        self.stream.extend_from_slice(&fn_id.to_le_bytes());
    }

    pub fn extern_call(&mut self, fn_id: u32) {
        self.stream.push(opcode::EXTERN_CALL);
        self.stream.extend_from_slice(&fn_id.to_le_bytes());
    }

    pub fn ret(&mut self) {
        self.stream.push(opcode::RETURN);
    }

    pub fn branch(&mut self, label: Label) {
        self.stream.push(opcode::BRANCH);
        self.rel_operand(label);
    }

    pub fn branch_if_false(&mut self, label: Label) {
        self.stream.push(opcode::BRANCH_IF_FALSE);
        self.rel_operand(label);
    }

    pub fn binop(&mut self, kind: BinOp) {
        self.stream.push(opcode::BINOP);
        self.stream.push(kind as u8);
    }

    pub fn unop(&mut self, kind: UnOp) {
        self.stream.push(opcode::UNOP);
        self.stream.push(kind as u8);
    }

    pub fn array_new(&mut self, len: u32) {
        self.stream.push(opcode::ARRAY_NEW);
        self.stream.extend_from_slice(&len.to_le_bytes());
    }

    pub fn index_load(&mut self) {
        self.stream.push(opcode::INDEX_LOAD);
    }

    pub fn index_store(&mut self) {
        self.stream.push(opcode::INDEX_STORE);
    }

    pub fn struct_alloc(&mut self, field_count: u16) {
        self.stream.push(opcode::STRUCT_ALLOC);
        self.stream.extend_from_slice(&field_count.to_le_bytes());
    }

    pub fn field_load(&mut self, index: u16) {
        self.stream.push(opcode::FIELD_LOAD);
        self.stream.extend_from_slice(&index.to_le_bytes());
    }

    pub fn field_store(&mut self, index: u16) {
        self.stream.push(opcode::FIELD_STORE);
        self.stream.extend_from_slice(&index.to_le_bytes());
    }

    pub fn iter_new(&mut self) {
        self.stream.push(opcode::ITER_NEW);
    }

    /// Push the iterator's next element, or branch to `done` when it is
    /// exhausted.
    pub fn iter_next(&mut self, done: Label) {
        self.stream.push(opcode::ITER_NEXT);
        self.rel_operand(done);
    }

    /// Open a function record: id, then the mangled name.
    pub fn fn_header(&mut self, fn_id: u32, mangled: &str) {
        self.stream.push(opcode::FN_HEADER);
        self.stream.extend_from_slice(&fn_id.to_le_bytes());
        self.stream
            .extend_from_slice(&(mangled.len() as u16).to_le_bytes());
        self.stream.extend_from_slice(mangled.as_bytes());
    }

    /// Resolve every recorded patch site and hand back the stream.
    pub fn finish(mut self) -> Vec<u8> {
        for (site, label) in std::mem::take(&mut self.patches) {
            let target = self.labels[label.0 as usize]
                .unwrap_or_else(|| panic!("label {:?} never bound", label));
            let rel = (target as i64 - (site as i64 + 4)) as i32;
            self.stream[site..site + 4].copy_from_slice(&rel.to_le_bytes());
        }
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_i64_encoding() {
        let mut emitter = Emitter::new();
        emitter.push_i64(42);
        emitter.ret();
        assert_eq!(
            emitter.finish(),
            vec![0x01, 0x2A, 0, 0, 0, 0, 0, 0, 0, 0x22]
        );
    }

    #[test]
    fn test_push_str_encoding() {
        let mut emitter = Emitter::new();
        emitter.push_str("hi");
        assert_eq!(emitter.finish(), vec![0x03, 2, 0, 0, 0, b'h', b'i']);
    }

    #[test]
    fn test_forward_branch_backpatched() {
        let mut emitter = Emitter::new();
        let end = emitter.new_label();
        emitter.branch(end); // 5 bytes
        emitter.ret(); // 1 byte
        emitter.bind(end); // offset 6
        let bytes = emitter.finish();
        // rel measured from the end of the operand (offset 5) to 6
        assert_eq!(&bytes[1..5], &1i32.to_le_bytes());
    }

    #[test]
    fn test_backward_branch_immediate() {
        let mut emitter = Emitter::new();
        let top = emitter.new_label();
        emitter.bind(top); // offset 0
        emitter.ret(); // offset 1
        emitter.branch(top); // operand ends at 6; rel = 0 - 6
        let bytes = emitter.finish();
        assert_eq!(&bytes[2..6], &(-6i32).to_le_bytes());
    }

    #[test]
    fn test_iter_next_patches_done_label() {
        let mut emitter = Emitter::new();
        let done = emitter.new_label();
        emitter.iter_next(done); // 5 bytes
        emitter.bind(done);
        let bytes = emitter.finish();
        assert_eq!(bytes[0], 0x57);
        assert_eq!(&bytes[1..5], &0i32.to_le_bytes());
    }

    #[test]
    fn test_fn_header_layout() {
        let mut emitter = Emitter::new();
        emitter.fn_header(3, "main$");
        let bytes = emitter.finish();
        assert_eq!(bytes[0], 0x60);
        assert_eq!(&bytes[1..5], &3u32.to_le_bytes());
        assert_eq!(&bytes[5..7], &5u16.to_le_bytes());
        assert_eq!(&bytes[7..], b"main$");
    }

    #[test]
    #[should_panic(expected = "never bound")]
    fn test_unbound_label_panics() {
        let mut emitter = Emitter::new();
        let label = emitter.new_label();
        emitter.branch(label);
        emitter.finish();
    }
}
