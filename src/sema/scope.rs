//! Scope context
//!
//! A tree of scopes rooted at the shared global scope, plus the stack of
//! scopes that are active during a traversal. Child scopes are keyed by the
//! AST node that owns them, so re-entering the same node in a later pass or
//! a different visitor family lands in the same scope and sees everything
//! declared there earlier.
//!
//! Functions and operators are nameable from anywhere through their mangled
//! names, so their tables live on the global scope; symbols and types are
//! lexically scoped.

use crate::ast::{AffixKind, NodeId, TypeRef};
use std::collections::HashMap;

/// What kind of construct a scope belongs to. Structural checks (`break`
/// inside a loop, `return` inside a function, receiver lookup inside an
/// impl) walk the active stack and match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Block,
    If,
    Fn,
    Loop,
    Impl,
    Affix,
    Extern,
}

/// A declared variable or parameter.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub name: String,
    pub ty: Option<TypeRef>,
    pub immutable: bool,
    pub origin: NodeId,
}

/// A declared function, keyed by its mangled name.
#[derive(Debug, Clone)]
pub struct FnSig {
    pub unmangled: String,
    pub mangled: String,
    pub self_type: Option<String>,
    pub params: Vec<TypeRef>,
    pub return_type: Option<TypeRef>,
    pub is_extern: bool,
    pub fn_id: u32,
    pub origin: NodeId,
}

/// A declared user operator.
#[derive(Debug, Clone)]
pub struct AffixSig {
    pub kind: AffixKind,
    pub op: String,
    pub mangled: String,
    pub params: Vec<TypeRef>,
    pub return_type: Option<TypeRef>,
    pub fn_id: u32,
    pub origin: NodeId,
}

/// A declared struct type.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub fields: Vec<(String, TypeRef)>,
    pub origin: NodeId,
}

/// Operator table key: fixity, operator text, operand type codes.
pub type AffixKey = (AffixKind, String, Vec<String>);

/// Outcome of a declaration. Re-declaring from the same origin node is a
/// no-op so that re-running a pass stays error-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    New,
    Existing,
}

pub type ScopeId = usize;

#[derive(Debug, Default)]
pub struct Scope {
    pub kind: ScopeKind,
    pub label: String,
    parent: Option<ScopeId>,
    children: Vec<(NodeId, ScopeId)>,
    symbols: HashMap<String, SymbolInfo>,
    functions: HashMap<String, FnSig>,
    affixes: HashMap<AffixKey, AffixSig>,
    types: HashMap<String, TypeInfo>,
}

impl Default for ScopeKind {
    fn default() -> Self {
        ScopeKind::Block
    }
}

/// The arena of scopes plus the active stack. Index 0 is always the global
/// scope, shared by every queued file.
#[derive(Debug)]
pub struct ScopeContext {
    arena: Vec<Scope>,
    stack: Vec<ScopeId>,
    enters: usize,
    leaves: usize,
}

impl ScopeContext {
    pub fn new() -> Self {
        let global = Scope {
            kind: ScopeKind::Global,
            label: "global".to_string(),
            ..Scope::default()
        };
        Self {
            arena: vec![global],
            stack: vec![0],
            enters: 0,
            leaves: 0,
        }
    }

    fn top(&self) -> ScopeId {
        *self.stack.last().expect("scope stack never empties")
    }

    pub fn current(&self) -> &Scope {
        &self.arena[self.top()]
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.current().kind
    }

    /// Depth of the active stack; 1 means only the global scope is active.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn enter_count(&self) -> usize {
        self.enters
    }

    pub fn leave_count(&self) -> usize {
        self.leaves
    }

    /// Push the scope owned by `owner`, creating it on first entry. The
    /// label and kind are refreshed on re-entry: a function scope is first
    /// entered before its name is mangled.
    pub fn enter(&mut self, owner: NodeId, kind: ScopeKind, label: &str) {
        let top = self.top();
        let existing = self.arena[top]
            .children
            .iter()
            .find(|(id, _)| *id == owner)
            .map(|(_, scope)| *scope);

        let id = match existing {
            Some(id) => {
                let scope = &mut self.arena[id];
                scope.kind = kind;
                scope.label = label.to_string();
                id
            }
            None => {
                let id = self.arena.len();
                self.arena.push(Scope {
                    kind,
                    label: label.to_string(),
                    parent: Some(top),
                    ..Scope::default()
                });
                self.arena[top].children.push((owner, id));
                id
            }
        };

        self.stack.push(id);
        self.enters += 1;
    }

    /// Pop the active scope. Popping the global scope is a framework bug.
    pub fn leave(&mut self) {
        assert!(self.stack.len() > 1, "scope stack underflow");
        self.stack.pop();
        self.leaves += 1;
    }

    // ============ Symbols ============

    pub fn declare_symbol(&mut self, info: SymbolInfo) -> Result<Declared, ()> {
        let top = self.top();
        match self.arena[top].symbols.get(&info.name) {
            Some(existing) if existing.origin == info.origin => Ok(Declared::Existing),
            Some(_) => Err(()),
            None => {
                self.arena[top].symbols.insert(info.name.clone(), info);
                Ok(Declared::New)
            }
        }
    }

    /// Innermost declaration visible from the active scope.
    pub fn resolve_symbol(&self, name: &str) -> Option<&SymbolInfo> {
        let mut scope = Some(self.top());
        while let Some(id) = scope {
            if let Some(info) = self.arena[id].symbols.get(name) {
                return Some(info);
            }
            scope = self.arena[id].parent;
        }
        None
    }

    /// Update the recorded type of a visible symbol (foreach binders get
    /// their type from the loop analysis).
    pub fn set_symbol_type(&mut self, name: &str, ty: TypeRef) {
        let mut scope = Some(self.top());
        while let Some(id) = scope {
            if let Some(info) = self.arena[id].symbols.get_mut(name) {
                info.ty = Some(ty);
                return;
            }
            scope = self.arena[id].parent;
        }
    }

    // ============ Functions ============

    pub fn declare_fn(&mut self, sig: FnSig) -> Result<Declared, ()> {
        match self.arena[0].functions.get(&sig.mangled) {
            Some(existing) if existing.origin == sig.origin => Ok(Declared::Existing),
            Some(_) => Err(()),
            None => {
                self.arena[0].functions.insert(sig.mangled.clone(), sig);
                Ok(Declared::New)
            }
        }
    }

    pub fn resolve_fn_mangled(&self, mangled: &str) -> Option<&FnSig> {
        let mut scope = Some(self.top());
        while let Some(id) = scope {
            if let Some(sig) = self.arena[id].functions.get(mangled) {
                return Some(sig);
            }
            scope = self.arena[id].parent;
        }
        None
    }

    /// All functions sharing an unmangled name, for the overload fallback.
    pub fn fns_by_unmangled(&self, name: &str) -> Vec<&FnSig> {
        self.arena[0]
            .functions
            .values()
            .filter(|sig| sig.unmangled == name)
            .collect()
    }

    /// Fix the return type of a declared function (a function without a
    /// declared return type takes the type of its first `return`).
    pub fn set_fn_return_type(&mut self, mangled: &str, ty: TypeRef) {
        if let Some(sig) = self.arena[0].functions.get_mut(mangled) {
            sig.return_type = Some(ty);
        }
    }

    // ============ Affixes ============

    pub fn declare_affix(&mut self, sig: AffixSig) -> Result<Declared, ()> {
        let key: AffixKey = (
            sig.kind,
            sig.op.clone(),
            sig.params.iter().map(super::mangle::type_code).collect(),
        );
        match self.arena[0].affixes.get(&key) {
            Some(existing) if existing.origin == sig.origin => Ok(Declared::Existing),
            Some(_) => Err(()),
            None => {
                self.arena[0].affixes.insert(key, sig);
                Ok(Declared::New)
            }
        }
    }

    pub fn resolve_affix(
        &self,
        kind: AffixKind,
        op: &str,
        operand_codes: &[String],
    ) -> Option<&AffixSig> {
        let key: AffixKey = (kind, op.to_string(), operand_codes.to_vec());
        self.arena[0].affixes.get(&key)
    }

    // ============ Types ============

    pub fn declare_type(&mut self, info: TypeInfo) -> Result<Declared, ()> {
        let top = self.top();
        match self.arena[top].types.get(&info.name) {
            Some(existing) if existing.origin == info.origin => Ok(Declared::Existing),
            Some(_) => Err(()),
            None => {
                self.arena[top].types.insert(info.name.clone(), info);
                Ok(Declared::New)
            }
        }
    }

    pub fn resolve_type(&self, name: &str) -> Option<&TypeInfo> {
        let mut scope = Some(self.top());
        while let Some(id) = scope {
            if let Some(info) = self.arena[id].types.get(name) {
                return Some(info);
            }
            scope = self.arena[id].parent;
        }
        None
    }

    // ============ Structural queries ============

    /// Is the active scope inside a loop, without crossing a function
    /// boundary?
    pub fn in_loop(&self) -> bool {
        for id in self.stack.iter().rev() {
            match self.arena[*id].kind {
                ScopeKind::Loop => return true,
                ScopeKind::Fn | ScopeKind::Affix | ScopeKind::Global => return false,
                _ => {}
            }
        }
        false
    }

    /// The mangled label of the enclosing function or affix scope.
    pub fn enclosing_fn_label(&self) -> Option<&str> {
        for id in self.stack.iter().rev() {
            match self.arena[*id].kind {
                ScopeKind::Fn | ScopeKind::Affix => {
                    return Some(self.arena[*id].label.as_str())
                }
                _ => {}
            }
        }
        None
    }

    /// The target type name of the innermost enclosing impl scope.
    pub fn innermost_impl(&self) -> Option<&str> {
        for id in self.stack.iter().rev() {
            if self.arena[*id].kind == ScopeKind::Impl {
                return Some(self.arena[*id].label.as_str());
            }
        }
        None
    }
}

impl Default for ScopeContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(name: &str, origin: NodeId) -> SymbolInfo {
        SymbolInfo {
            name: name.to_string(),
            ty: Some(TypeRef::scalar("i64")),
            immutable: false,
            origin,
        }
    }

    #[test]
    fn test_enter_leave_balance() {
        let mut scopes = ScopeContext::new();
        assert_eq!(scopes.depth(), 1);
        scopes.enter(1, ScopeKind::Fn, "main$");
        scopes.enter(2, ScopeKind::Block, "block");
        assert_eq!(scopes.depth(), 3);
        scopes.leave();
        scopes.leave();
        assert_eq!(scopes.depth(), 1);
        assert_eq!(scopes.enter_count(), scopes.leave_count());
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_leave_global_panics() {
        let mut scopes = ScopeContext::new();
        scopes.leave();
    }

    #[test]
    fn test_reentry_preserves_declarations() {
        let mut scopes = ScopeContext::new();
        scopes.enter(1, ScopeKind::Fn, "f$");
        scopes.declare_symbol(symbol("x", 10)).unwrap();
        scopes.leave();

        // second pass, same owning node
        scopes.enter(1, ScopeKind::Fn, "f$");
        assert!(scopes.resolve_symbol("x").is_some());
        scopes.leave();
    }

    #[test]
    fn test_shadowing_and_parent_walk() {
        let mut scopes = ScopeContext::new();
        scopes.declare_symbol(symbol("x", 1)).unwrap();
        scopes.enter(2, ScopeKind::Block, "block");
        assert!(scopes.resolve_symbol("x").is_some());
        scopes.declare_symbol(symbol("x", 3)).unwrap();
        assert_eq!(scopes.resolve_symbol("x").unwrap().origin, 3);
        scopes.leave();
        assert_eq!(scopes.resolve_symbol("x").unwrap().origin, 1);
    }

    #[test]
    fn test_redeclaration_same_scope() {
        let mut scopes = ScopeContext::new();
        assert_eq!(scopes.declare_symbol(symbol("x", 1)), Ok(Declared::New));
        // same origin: idempotent re-run
        assert_eq!(
            scopes.declare_symbol(symbol("x", 1)),
            Ok(Declared::Existing)
        );
        // different origin: conflict
        assert!(scopes.declare_symbol(symbol("x", 2)).is_err());
    }

    #[test]
    fn test_structural_queries() {
        let mut scopes = ScopeContext::new();
        scopes.enter(1, ScopeKind::Fn, "f$");
        assert!(!scopes.in_loop());
        scopes.enter(2, ScopeKind::Loop, "loop");
        scopes.enter(3, ScopeKind::Block, "block");
        assert!(scopes.in_loop());
        assert_eq!(scopes.enclosing_fn_label(), Some("f$"));
        scopes.leave();
        scopes.leave();
        scopes.leave();
        assert!(!scopes.in_loop());
    }
}
