//! Code generation
//!
//! The third visitor family: one traversal per file after analysis comes
//! back clean, emitting IL. Unlike the semantic families, handlers here
//! order their own recursion — control flow needs prologue and epilogue
//! bytes around the children — but scope entry and exit mirror the generic
//! walk exactly, which the balance tests rely on.
//!
//! Blocks open a local frame; slots are handed out in declaration order and
//! released when the frame closes. Nodes whose `emit` flag was cleared
//! during semantic generation are skipped wholesale.

use crate::ast::{Dec, Node, NodeKind, NumberValue};
use crate::il::{BinOp, Emitter, Label, UnOp};
use crate::sema::scope::{ScopeContext, ScopeKind};
use crate::sema::{infer_type, receiver_field};

/// One local-variable frame. Closing the frame returns its slots to the
/// allocator, matching the block-scoped lifetime of the locals.
struct Frame {
    slots: Vec<(String, u16)>,
    saved_next: u16,
}

/// The code generator for one compilation. Reuses the scope context the
/// semantic passes populated.
pub struct Codegen<'a> {
    scopes: &'a mut ScopeContext,
    emitter: &'a mut Emitter,
    frames: Vec<Frame>,
    next_slot: u16,
    /// (top, end) labels of the enclosing loops.
    loops: Vec<(Label, Label)>,
}

impl<'a> Codegen<'a> {
    pub fn new(scopes: &'a mut ScopeContext, emitter: &'a mut Emitter) -> Self {
        Self {
            scopes,
            emitter,
            frames: Vec::new(),
            next_slot: 0,
            loops: Vec::new(),
        }
    }

    /// Emit one file's tree. The root block shares the global scope, the
    /// same way the semantic walk treats it.
    pub fn run(&mut self, root: &Node) {
        if let NodeKind::Block(statements) = &root.kind {
            self.open_frame();
            for stmt in statements {
                self.gen(stmt);
            }
            self.close_frame();
        } else {
            self.gen(root);
        }
    }

    // ============ Frames ============

    fn open_frame(&mut self) {
        self.frames.push(Frame {
            slots: Vec::new(),
            saved_next: self.next_slot,
        });
    }

    fn close_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.next_slot = frame.saved_next;
        }
    }

    fn declare_slot(&mut self, name: &str) -> u16 {
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(frame) = self.frames.last_mut() {
            frame.slots.push((name.to_string(), slot));
        }
        slot
    }

    fn lookup_slot(&self, name: &str) -> Option<u16> {
        for frame in self.frames.iter().rev() {
            if let Some((_, slot)) = frame.slots.iter().rev().find(|(n, _)| n == name) {
                return Some(*slot);
            }
        }
        None
    }

    fn infer(&self, node: &Node) -> Option<crate::ast::TypeRef> {
        infer_type(self.scopes, &[], &[], node)
    }

    // ============ Dispatch ============

    fn gen(&mut self, node: &Node) {
        if !node.emit {
            return;
        }
        match &node.kind {
            NodeKind::Block(_) => self.gen_block(node),
            NodeKind::Str(value) => self.emitter.push_str(value),
            NodeKind::Number(number) => match &number.value {
                NumberValue::Float(f) => self.emitter.push_f64(*f),
                NumberValue::Signed(i) => self.emitter.push_i64(*i),
                NumberValue::Unsigned(u) => self.emitter.push_i64(*u as i64),
            },
            NodeKind::Boolean(value) => self.emitter.push_i64(*value as i64),
            NodeKind::Array { elements, .. } => {
                for element in elements {
                    self.gen(element);
                }
                self.emitter.array_new(elements.len() as u32);
            }
            NodeKind::Symbol(name) => self.gen_symbol_load(name),
            NodeKind::Dec(_) => self.gen_dec(node),
            NodeKind::If { .. } => self.gen_if(node),
            NodeKind::Fn(_) => self.gen_fn(node),
            NodeKind::FnCall { .. } => self.gen_call(node),
            NodeKind::Loop { .. } => self.gen_loop(node),
            NodeKind::Continue => {
                if let Some((top, _)) = self.loops.last().copied() {
                    self.emitter.branch(top);
                }
            }
            NodeKind::Break => {
                if let Some((_, end)) = self.loops.last().copied() {
                    self.emitter.branch(end);
                }
            }
            NodeKind::Impl { .. } => self.gen_impl(node),
            NodeKind::Affix(_) => self.gen_affix(node),
            NodeKind::Unary { .. } => self.gen_unary(node),
            NodeKind::Binary { .. } => self.gen_binary(node),
            NodeKind::Index { array, index } => {
                self.gen(array);
                self.gen(index);
                self.emitter.index_load();
            }
            NodeKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.gen(expr);
                }
                self.emitter.ret();
            }
            // Declarations with no runtime body; semantic generation clears
            // their emit flag, this arm covers hand-built trees.
            NodeKind::Struct { .. }
            | NodeKind::Extern(_)
            | NodeKind::Use(_)
            | NodeKind::Namespace(_) => {}
        }
    }

    // ============ Statements ============

    fn gen_block(&mut self, node: &Node) {
        let NodeKind::Block(statements) = &node.kind else {
            return;
        };
        self.scopes.enter(node.id, ScopeKind::Block, "block");
        self.open_frame();
        for stmt in statements {
            self.gen(stmt);
        }
        self.close_frame();
        self.scopes.leave();
    }

    fn gen_dec(&mut self, node: &Node) {
        let NodeKind::Dec(dec) = &node.kind else {
            return;
        };
        match &dec.value {
            Some(value) => {
                self.gen(value);
                let slot = self.declare_slot(&dec.name);
                self.emitter.store_local(slot);
            }
            None => {
                let slot = self.declare_slot(&dec.name);
                // Default-allocate structs so the local is usable.
                if let Some(ty) = &dec.ty {
                    if !ty.is_array && !ty.is_builtin_scalar() {
                        if let Some(info) = self.scopes.resolve_type(&ty.name) {
                            let fields = info.fields.len() as u16;
                            self.emitter.struct_alloc(fields);
                            self.emitter.store_local(slot);
                        }
                    }
                }
            }
        }
    }

    fn gen_if(&mut self, node: &Node) {
        let NodeKind::If {
            condition,
            true_block,
            false_block,
        } = &node.kind
        else {
            return;
        };

        self.gen(condition);
        let l_else = self.emitter.new_label();
        let l_end = self.emitter.new_label();
        self.emitter.branch_if_false(l_else);

        self.scopes.enter(node.id, ScopeKind::If, "if");
        self.gen(true_block);
        self.emitter.branch(l_end);
        self.emitter.bind(l_else);
        if let Some(block) = false_block {
            self.gen(block);
        }
        self.scopes.leave();
        self.emitter.bind(l_end);
    }

    fn gen_loop(&mut self, node: &Node) {
        let NodeKind::Loop {
            is_foreach,
            binder,
            expr,
            body,
        } = &node.kind
        else {
            return;
        };

        let l_top = self.emitter.new_label();
        let l_end = self.emitter.new_label();

        if *is_foreach {
            // materialize the iterator, then pull one element per round
            self.gen(expr);
            self.emitter.iter_new();

            self.scopes.enter(node.id, ScopeKind::Loop, "loop");
            self.open_frame();
            let iter_slot = self.declare_slot("(iter)");
            self.emitter.store_local(iter_slot);

            let binder_slot = match binder.as_deref().map(|b| &b.kind) {
                Some(NodeKind::Dec(Dec { name, .. })) => self.declare_slot(name),
                _ => self.declare_slot("(binder)"),
            };

            self.emitter.bind(l_top);
            self.emitter.load_local(iter_slot);
            self.emitter.iter_next(l_end);
            self.emitter.store_local(binder_slot);

            self.loops.push((l_top, l_end));
            self.gen(body);
            self.loops.pop();

            self.close_frame();
            self.scopes.leave();
            self.emitter.branch(l_top);
            self.emitter.bind(l_end);
        } else {
            self.emitter.bind(l_top);
            self.gen(expr);
            self.emitter.branch_if_false(l_end);

            self.scopes.enter(node.id, ScopeKind::Loop, "loop");
            self.loops.push((l_top, l_end));
            self.gen(body);
            self.loops.pop();
            self.scopes.leave();

            self.emitter.branch(l_top);
            self.emitter.bind(l_end);
        }
    }

    // ============ Callables ============

    fn gen_fn(&mut self, node: &Node) {
        let NodeKind::Fn(def) = &node.kind else {
            return;
        };
        let Some(body) = &def.body else {
            return;
        };
        let Some(mangled) = def.mangled.as_deref() else {
            return;
        };
        let Some(fn_id) = self.scopes.resolve_fn_mangled(mangled).map(|s| s.fn_id)
        else {
            return;
        };

        self.emitter.fn_header(fn_id, mangled);

        let saved_next = self.next_slot;
        self.next_slot = 0;
        let label = mangled.to_string();
        self.scopes.enter(node.id, ScopeKind::Fn, &label);
        self.open_frame();

        // receiver of impl methods occupies slot 0
        if def.self_type.is_some() {
            self.declare_slot("(self)");
        }
        for param in &def.params {
            if let NodeKind::Dec(dec) = &param.kind {
                self.declare_slot(&dec.name);
            }
        }

        self.gen(body);

        if def.return_type.is_none() && !ends_with_return(body) {
            self.emitter.ret();
        }

        self.close_frame();
        self.scopes.leave();
        self.next_slot = saved_next;
    }

    fn gen_affix(&mut self, node: &Node) {
        let NodeKind::Affix(def) = &node.kind else {
            return;
        };
        let Some(body) = &def.func.body else {
            return;
        };
        let Some(mangled) = def.func.mangled.as_deref() else {
            return;
        };
        let Some(fn_id) = self.scopes.resolve_fn_mangled(mangled).map(|s| s.fn_id)
        else {
            return;
        };

        self.emitter.fn_header(fn_id, mangled);

        let saved_next = self.next_slot;
        self.next_slot = 0;
        let label = mangled.to_string();
        self.scopes.enter(node.id, ScopeKind::Affix, &label);
        self.open_frame();

        for param in &def.func.params {
            if let NodeKind::Dec(dec) = &param.kind {
                self.declare_slot(&dec.name);
            }
        }

        self.gen(body);

        if def.func.return_type.is_none() && !ends_with_return(body) {
            self.emitter.ret();
        }

        self.close_frame();
        self.scopes.leave();
        self.next_slot = saved_next;
    }

    fn gen_impl(&mut self, node: &Node) {
        let NodeKind::Impl { target, block } = &node.kind else {
            return;
        };
        let label = target.clone();
        self.scopes.enter(node.id, ScopeKind::Impl, &label);
        self.gen(block);
        self.scopes.leave();
    }

    fn gen_call(&mut self, node: &Node) {
        let NodeKind::FnCall { name, args, .. } = &node.kind else {
            return;
        };
        for arg in args {
            self.gen(arg);
        }
        if let Some(sig) = self.scopes.resolve_fn_mangled(name) {
            if sig.is_extern {
                self.emitter.extern_call(sig.fn_id);
            } else {
                self.emitter.call(sig.fn_id);
            }
        }
    }

    // ============ Expressions ============

    fn gen_symbol_load(&mut self, name: &str) {
        if let Some(slot) = self.lookup_slot(name) {
            self.emitter.load_local(slot);
            return;
        }
        if let Some((index, _)) = receiver_field(self.scopes, name) {
            self.emitter.load_local(0);
            self.emitter.field_load(index as u16);
        }
    }

    fn gen_unary(&mut self, node: &Node) {
        let NodeKind::Unary { op, operand } = &node.kind else {
            return;
        };
        self.gen(operand);
        let float = self
            .infer(operand)
            .map(|ty| ty.is_float())
            .unwrap_or(false);
        match op.as_str() {
            "-" if float => self.emitter.unop(UnOp::NegF),
            "-" => self.emitter.unop(UnOp::NegI),
            "!" => self.emitter.unop(UnOp::Not),
            _ => {}
        }
    }

    fn gen_binary(&mut self, node: &Node) {
        let NodeKind::Binary { op, lhs, rhs } = &node.kind else {
            return;
        };

        if op == "=" {
            self.gen_assignment(lhs, rhs);
            return;
        }

        self.gen(lhs);
        self.gen(rhs);
        let float = self.infer(lhs).map(|ty| ty.is_float()).unwrap_or(false);
        if let Some(kind) = BinOp::for_op(op, float) {
            self.emitter.binop(kind);
        }
    }

    fn gen_assignment(&mut self, lhs: &Node, rhs: &Node) {
        match &lhs.kind {
            NodeKind::Symbol(name) => {
                if let Some(slot) = self.lookup_slot(name) {
                    self.gen(rhs);
                    self.emitter.store_local(slot);
                } else if let Some((index, _)) = receiver_field(self.scopes, name) {
                    self.emitter.load_local(0);
                    self.gen(rhs);
                    self.emitter.field_store(index as u16);
                }
            }
            NodeKind::Index { array, index } => {
                self.gen(array);
                self.gen(index);
                self.gen(rhs);
                self.emitter.index_store();
            }
            _ => {}
        }
    }
}

/// Does a block's last statement return?
fn ends_with_return(body: &Node) -> bool {
    match &body.kind {
        NodeKind::Block(statements) => {
            matches!(statements.last().map(|s| &s.kind), Some(NodeKind::Return(_)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::il::opcode;
    use crate::lexer::TokenStream;
    use crate::parser;
    use crate::sema::visitor::run_pass;
    use crate::sema::{analyze, generate, SemaContext};
    use crate::source::SourceFile;

    /// Run the full front half and return the emitted module bytes.
    fn compile(text: &str) -> Vec<u8> {
        let source = SourceFile::new("test.src", text);
        let stream = TokenStream::lex(&source);
        assert!(stream.errors.is_empty(), "{:?}", stream.errors);
        let (mut root, parse_errors) = parser::parse(&source, &stream);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);

        let mut cx = SemaContext::new();
        let gen = generate::handlers();
        let analyze = analyze::handlers();
        let passes = gen.max_pass().max(analyze.max_pass());
        for pass in 0..=passes {
            cx.begin_file();
            run_pass(&gen, &mut cx, &mut root, pass);
            run_pass(&analyze, &mut cx, &mut root, pass);
        }
        assert!(cx.errors.is_empty(), "{:?}", cx.errors);

        let mut emitter = Emitter::new();
        Codegen::new(&mut cx.scopes, &mut emitter).run(&root);
        assert_eq!(cx.scopes.depth(), 1, "codegen left scopes unbalanced");
        emitter.ret();
        emitter.finish()
    }

    fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|window| window == needle)
    }

    #[test]
    fn test_empty_program_is_single_return() {
        assert_eq!(compile(""), vec![opcode::RETURN]);
    }

    #[test]
    fn test_return_constant_function_record() {
        let bytes = compile("fn main() -> i64 { return 42; }");
        // function record: header + mangled name
        let header_at = find_subsequence(&bytes, b"main$").expect("fn record");
        assert_eq!(bytes[header_at - 7], opcode::FN_HEADER);
        // body: push-i64 42 then return
        let body = &bytes[header_at + 5..];
        assert_eq!(
            &body[..10],
            &[0x01, 0x2A, 0, 0, 0, 0, 0, 0, 0, 0x22]
        );
        // module epilogue
        assert_eq!(*bytes.last().unwrap(), opcode::RETURN);
    }

    #[test]
    fn test_operator_overload_emits_call_not_binop() {
        let bytes = compile(
            "struct Vec { var x: f64; }\n\
             infix op +(a: Vec, b: Vec) -> Vec { return a; }\n\
             fn f(a: Vec, b: Vec) -> Vec { return a + b; }",
        );
        // the affix record exists
        assert!(find_subsequence(&bytes, b"+$Vec_Vec").is_some());
        // f's body calls fn-id 0 (the affix was declared first)
        let f_at = find_subsequence(&bytes, b"f$Vec_Vec").unwrap();
        let f_body = &bytes[f_at + "f$Vec_Vec".len()..];
        let expected_call = [opcode::CALL, 0, 0, 0, 0];
        assert!(
            find_subsequence(f_body, &expected_call).is_some(),
            "no call to the affix in {:02x?}",
            f_body
        );
        assert!(
            !f_body.contains(&opcode::BINOP),
            "binop emitted instead of call: {:02x?}",
            f_body
        );
    }

    #[test]
    fn test_foreach_shape() {
        let bytes = compile("fn main() { loop i in [1, 2, 3] { continue; } }");
        // array-new 3
        let array_new = [opcode::ARRAY_NEW, 3, 0, 0, 0];
        let array_at = find_subsequence(&bytes, &array_new).expect("array-new 3");
        assert!(bytes[array_at..].contains(&opcode::ITER_NEW));
        let iter_next_at = array_at
            + bytes[array_at..]
                .iter()
                .position(|b| *b == opcode::ITER_NEXT)
                .expect("iter-next");

        // continue branches backwards to the loop header
        let branch_at = iter_next_at
            + bytes[iter_next_at..]
                .iter()
                .position(|b| *b == opcode::BRANCH)
                .expect("continue branch");
        let rel = i32::from_le_bytes(bytes[branch_at + 1..branch_at + 5].try_into().unwrap());
        assert!(rel < 0, "continue must branch backwards, got {}", rel);

        // iter-next's done-target lands past the loop's trailing branch
        let done_rel =
            i32::from_le_bytes(bytes[iter_next_at + 1..iter_next_at + 5].try_into().unwrap());
        let done_target = (iter_next_at as i64 + 5) + done_rel as i64;
        assert!(done_target > branch_at as i64, "done label inside loop");
    }

    #[test]
    fn test_if_else_branch_shape() {
        let bytes = compile("fn f(c: bool) { if c { let a = 1; } else { let b = 2; } }");
        assert!(bytes.contains(&opcode::BRANCH_IF_FALSE));
        assert!(bytes.contains(&opcode::BRANCH));
    }

    #[test]
    fn test_while_loop_condition_binop() {
        let bytes = compile("fn f() { var i = 0; loop i < 10 { i = i + 1; } }");
        let lt = [opcode::BINOP, BinOp::Lt as u8];
        assert!(find_subsequence(&bytes, &lt).is_some());
        let add = [opcode::BINOP, BinOp::AddI as u8];
        assert!(find_subsequence(&bytes, &add).is_some());
    }

    #[test]
    fn test_extern_call_opcode() {
        let bytes = compile(
            "extern { fn puts(s: str) -> i64; }\n\
             fn main() { puts(\"hi\"); }",
        );
        assert!(bytes.contains(&opcode::EXTERN_CALL));
    }

    #[test]
    fn test_float_arithmetic_selects_float_binop() {
        let bytes = compile("fn f() { let x = 1.5 + 2.5; }");
        let addf = [opcode::BINOP, BinOp::AddF as u8];
        assert!(find_subsequence(&bytes, &addf).is_some());
    }

    #[test]
    fn test_impl_method_field_access() {
        let bytes = compile(
            "struct Vec { var x: f64; var y: f64; }\n\
             impl Vec { fn get_y() -> f64 { return y; } }",
        );
        // receiver slot 0 then field 1
        let pattern = [
            opcode::LOAD_LOCAL,
            0,
            0,
            opcode::FIELD_LOAD,
            1,
            0,
        ];
        assert!(find_subsequence(&bytes, &pattern).is_some());
    }

    #[test]
    fn test_implicit_return_only_when_needed() {
        let with_ret = compile("fn f() -> i64 { return 1; }");
        let header = find_subsequence(&with_ret, b"f$").unwrap();
        let body = &with_ret[header + 2..];
        // exactly one return in the body (plus the module epilogue)
        assert_eq!(body.iter().filter(|b| **b == opcode::RETURN).count(), 2);

        let implicit = compile("fn g() { let x = 1; }");
        let header = find_subsequence(&implicit, b"g$").unwrap();
        let body = &implicit[header + 2..];
        assert_eq!(body.iter().filter(|b| **b == opcode::RETURN).count(), 2);
    }

    #[test]
    fn test_deterministic_output() {
        let text = "fn main() -> i64 { let x = 40 + 2; return x; }";
        assert_eq!(compile(text), compile(text));
    }
}
