//! Visitor framework
//!
//! A visitor family is a fixed table of handlers keyed by (pass, node kind),
//! constructed explicitly by the driver. The walk runs a node's handler,
//! then recurses into its children; nodes that introduce a scope get a
//! matching `enter`/`leave` pair around the recursion, identical in every
//! family and every pass. Handlers never see or move the pass cursor.

use crate::ast::{Node, NodeKind, NodeTag};
use crate::sema::scope::{ScopeContext, ScopeKind};

/// Contexts a visitor family runs against must expose the scope context so
/// the walk can keep entry and exit symmetric.
pub trait ScopeHost {
    fn scopes_mut(&mut self) -> &mut ScopeContext;
}

/// A per-node handler within one family.
pub type Handler<C> = fn(&mut C, &mut Node);

/// Handler table for one visitor family.
pub struct HandlerTable<C> {
    entries: Vec<((u32, NodeTag), Handler<C>)>,
}

impl<C> HandlerTable<C> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, pass: u32, tag: NodeTag, handler: Handler<C>) {
        debug_assert!(
            self.get(pass, tag).is_none(),
            "duplicate handler for pass {} {:?}",
            pass,
            tag
        );
        self.entries.push(((pass, tag), handler));
    }

    pub fn get(&self, pass: u32, tag: NodeTag) -> Option<Handler<C>> {
        self.entries
            .iter()
            .find(|((p, t), _)| *p == pass && *t == tag)
            .map(|(_, h)| *h)
    }

    /// Highest pass number any handler is registered for.
    pub fn max_pass(&self) -> u32 {
        self.entries
            .iter()
            .map(|((p, _), _)| *p)
            .max()
            .unwrap_or(0)
    }
}

impl<C> Default for HandlerTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one pass of one family over a file's tree. The root block shares the
/// global scope rather than opening its own, so top-level declarations from
/// every queued file land together.
pub fn run_pass<C: ScopeHost>(
    table: &HandlerTable<C>,
    cx: &mut C,
    root: &mut Node,
    pass: u32,
) {
    if let NodeKind::Block(statements) = &mut root.kind {
        for stmt in statements {
            visit(table, cx, stmt, pass);
        }
    } else {
        visit(table, cx, root, pass);
    }
}

fn visit<C: ScopeHost>(table: &HandlerTable<C>, cx: &mut C, node: &mut Node, pass: u32) {
    if let Some(handler) = table.get(pass, node.tag()) {
        handler(cx, node);
    }
    walk_children(table, cx, node, pass);
}

fn walk_children<C: ScopeHost>(
    table: &HandlerTable<C>,
    cx: &mut C,
    node: &mut Node,
    pass: u32,
) {
    let id = node.id;
    match &mut node.kind {
        NodeKind::Block(statements) => {
            cx.scopes_mut().enter(id, ScopeKind::Block, "block");
            for stmt in statements {
                visit(table, cx, stmt, pass);
            }
            cx.scopes_mut().leave();
        }

        NodeKind::If {
            condition,
            true_block,
            false_block,
        } => {
            // The condition is evaluated in the enclosing scope.
            visit(table, cx, condition, pass);
            cx.scopes_mut().enter(id, ScopeKind::If, "if");
            visit(table, cx, true_block, pass);
            if let Some(block) = false_block {
                visit(table, cx, block, pass);
            }
            cx.scopes_mut().leave();
        }

        NodeKind::Fn(def) => {
            let label = def.mangled.clone().unwrap_or_else(|| def.name.clone());
            cx.scopes_mut().enter(id, ScopeKind::Fn, &label);
            for param in &mut def.params {
                visit(table, cx, param, pass);
            }
            if let Some(body) = &mut def.body {
                visit(table, cx, body, pass);
            }
            cx.scopes_mut().leave();
        }

        NodeKind::Loop {
            binder, expr, body, ..
        } => {
            visit(table, cx, expr, pass);
            cx.scopes_mut().enter(id, ScopeKind::Loop, "loop");
            if let Some(binder) = binder {
                visit(table, cx, binder, pass);
            }
            visit(table, cx, body, pass);
            cx.scopes_mut().leave();
        }

        NodeKind::Impl { target, block } => {
            let label = target.clone();
            cx.scopes_mut().enter(id, ScopeKind::Impl, &label);
            visit(table, cx, block, pass);
            cx.scopes_mut().leave();
        }

        NodeKind::Affix(def) => {
            let label = def
                .func
                .mangled
                .clone()
                .unwrap_or_else(|| def.func.name.clone());
            cx.scopes_mut().enter(id, ScopeKind::Affix, &label);
            for param in &mut def.func.params {
                visit(table, cx, param, pass);
            }
            if let Some(body) = &mut def.func.body {
                visit(table, cx, body, pass);
            }
            cx.scopes_mut().leave();
        }

        NodeKind::Extern(decls) => {
            cx.scopes_mut().enter(id, ScopeKind::Extern, "extern");
            for decl in decls {
                visit(table, cx, decl, pass);
            }
            cx.scopes_mut().leave();
        }

        NodeKind::Struct { fields, .. } => visit(table, cx, fields, pass),

        NodeKind::Array { elements, .. } => {
            for element in elements {
                visit(table, cx, element, pass);
            }
        }

        NodeKind::Dec(dec) => {
            if let Some(value) = &mut dec.value {
                visit(table, cx, value, pass);
            }
        }

        NodeKind::FnCall { args, .. } => {
            for arg in args {
                visit(table, cx, arg, pass);
            }
        }

        NodeKind::Unary { operand, .. } => visit(table, cx, operand, pass),

        NodeKind::Binary { lhs, rhs, .. } => {
            visit(table, cx, lhs, pass);
            visit(table, cx, rhs, pass);
        }

        NodeKind::Index { array, index } => {
            visit(table, cx, array, pass);
            visit(table, cx, index, pass);
        }

        NodeKind::Return(Some(expr)) => visit(table, cx, expr, pass),

        NodeKind::Str(_)
        | NodeKind::Number(_)
        | NodeKind::Boolean(_)
        | NodeKind::Symbol(_)
        | NodeKind::Continue
        | NodeKind::Break
        | NodeKind::Return(None)
        | NodeKind::Use(_)
        | NodeKind::Namespace(_) => {}
    }
}
