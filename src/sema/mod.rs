//! Semantic passes
//!
//! Two visitor families run over every queued file, pass by pass: the
//! generators populate the scope context (types, callables, locals), the
//! analyzers validate usage and types against it. Both share one
//! `SemaContext` whose global scope persists across files.

pub mod analyze;
pub mod generate;
pub mod mangle;
pub mod scope;
pub mod visitor;

pub use scope::{
    AffixSig, Declared, FnSig, ScopeContext, ScopeKind, SymbolInfo, TypeInfo,
};
pub use visitor::{HandlerTable, ScopeHost};

use crate::ast::{AffixKind, Node, NodeKind, TypeRef};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::sema::mangle::{mangle, type_code};

/// Shared state of the semantic families: the scope tree, the accumulated
/// diagnostics, and the namespace view of the file currently being walked.
pub struct SemaContext {
    pub scopes: ScopeContext,
    pub errors: Vec<Diagnostic>,
    /// Namespace prefix declared by the current file.
    pub namespace: Vec<String>,
    /// Namespaces the current file imports with `use`.
    pub uses: Vec<String>,
    /// Next dense function id, allocated in declaration order.
    pub(crate) next_fn_id: u32,
}

impl SemaContext {
    pub fn new() -> Self {
        Self {
            scopes: ScopeContext::new(),
            errors: Vec::new(),
            namespace: Vec::new(),
            uses: Vec::new(),
            next_fn_id: 0,
        }
    }

    /// Reset per-file namespace state before walking a file.
    pub fn begin_file(&mut self) {
        self.namespace.clear();
        self.uses.clear();
    }

    /// Record a diagnostic at a node's position.
    pub(crate) fn error(&mut self, kind: DiagnosticKind, node: &Node) {
        self.errors
            .push(Diagnostic::new(kind, node.line, node.column, 0));
    }

    /// Type of an expression under the current scopes.
    pub fn infer(&self, node: &Node) -> Option<TypeRef> {
        infer_type(&self.scopes, &self.namespace, &self.uses, node)
    }
}

impl Default for SemaContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeHost for SemaContext {
    fn scopes_mut(&mut self) -> &mut ScopeContext {
        &mut self.scopes
    }
}

/// Outcome of overload resolution at a call site.
pub enum CallResolution<'a> {
    Found(&'a FnSig),
    NotFound,
    Ambiguous,
}

/// Resolve a call site to a declared function.
///
/// Already-mangled names look up directly. Otherwise candidate mangled names
/// are built from the argument types under each visible prefix (enclosing
/// impl, file namespace, no namespace, imported namespaces); if none hits,
/// the unmangled name resolves when it names exactly one function.
pub fn resolve_call<'a>(
    scopes: &'a ScopeContext,
    namespace: &[String],
    uses: &[String],
    name: &str,
    args: &[TypeRef],
    already_mangled: bool,
) -> CallResolution<'a> {
    if already_mangled {
        return match scopes.resolve_fn_mangled(name) {
            Some(sig) => CallResolution::Found(sig),
            None => CallResolution::NotFound,
        };
    }

    let mut candidates = Vec::new();
    if let Some(target) = scopes.innermost_impl() {
        candidates.push(mangle(namespace, Some(target), name, args));
        candidates.push(mangle(&[], Some(target), name, args));
    }
    candidates.push(mangle(namespace, None, name, args));
    candidates.push(mangle(&[], None, name, args));
    for used in uses {
        candidates.push(mangle(std::slice::from_ref(used), None, name, args));
    }

    for candidate in &candidates {
        if let Some(sig) = scopes.resolve_fn_mangled(candidate) {
            return CallResolution::Found(sig);
        }
    }

    let matches = scopes.fns_by_unmangled(name);
    match matches.len() {
        1 => CallResolution::Found(matches[0]),
        0 => CallResolution::NotFound,
        _ => CallResolution::Ambiguous,
    }
}

/// Field of the enclosing impl's receiver type, by name.
pub fn receiver_field(scopes: &ScopeContext, name: &str) -> Option<(usize, TypeRef)> {
    let target = scopes.innermost_impl()?;
    let info = scopes.resolve_type(target)?;
    info.fields
        .iter()
        .position(|(field, _)| field == name)
        .map(|index| (index, info.fields[index].1.clone()))
}

/// Compute the type of an expression from the populated scopes. Returns
/// `None` when a child is unresolved; callers treat that as "already
/// reported elsewhere" and stay quiet.
pub fn infer_type(
    scopes: &ScopeContext,
    namespace: &[String],
    uses: &[String],
    node: &Node,
) -> Option<TypeRef> {
    match &node.kind {
        NodeKind::Number(number) => Some(TypeRef::scalar(number.type_name())),
        NodeKind::Str(_) => Some(TypeRef::scalar("str")),
        NodeKind::Boolean(_) => Some(TypeRef::scalar("bool")),

        NodeKind::Array {
            elements,
            element_type,
        } => {
            let element = match element_type {
                Some(ty) => ty.clone(),
                None => infer_type(scopes, namespace, uses, elements.first()?)?,
            };
            Some(TypeRef::array(element))
        }

        NodeKind::Symbol(name) => {
            if let Some(info) = scopes.resolve_symbol(name) {
                return info.ty.clone();
            }
            receiver_field(scopes, name).map(|(_, ty)| ty)
        }

        NodeKind::Binary { op, lhs, rhs } => {
            let lt = infer_type(scopes, namespace, uses, lhs)?;
            match op.as_str() {
                "==" | "!=" | "<" | "<=" | ">" | ">=" => {
                    if lt.is_builtin_scalar() {
                        return Some(TypeRef::scalar("bool"));
                    }
                    affix_return(
                        scopes,
                        namespace,
                        uses,
                        AffixKind::Infix,
                        op,
                        lhs,
                        Some(rhs.as_ref()),
                    )
                }
                "&&" | "||" => Some(TypeRef::scalar("bool")),
                "=" => Some(lt),
                _ => {
                    if lt.is_numeric() {
                        return Some(lt);
                    }
                    affix_return(
                        scopes,
                        namespace,
                        uses,
                        AffixKind::Infix,
                        op,
                        lhs,
                        Some(rhs.as_ref()),
                    )
                }
            }
        }

        NodeKind::Unary { op, operand } => {
            let ot = infer_type(scopes, namespace, uses, operand)?;
            match op.as_str() {
                "-" if ot.is_numeric() => Some(ot),
                "!" if ot.is_bool() => Some(ot),
                _ => affix_return(
                    scopes,
                    namespace,
                    uses,
                    AffixKind::Prefix,
                    op,
                    operand,
                    None,
                )
                .or_else(|| {
                    affix_return(
                        scopes,
                        namespace,
                        uses,
                        AffixKind::Suffix,
                        op,
                        operand,
                        None,
                    )
                }),
            }
        }

        NodeKind::FnCall {
            name,
            args,
            mangled,
        } => {
            let mut arg_types = Vec::with_capacity(args.len());
            for arg in args {
                arg_types.push(infer_type(scopes, namespace, uses, arg)?);
            }
            match resolve_call(scopes, namespace, uses, name, &arg_types, *mangled) {
                CallResolution::Found(sig) => sig.return_type.clone(),
                _ => None,
            }
        }

        NodeKind::Index { array, .. } => {
            let at = infer_type(scopes, namespace, uses, array)?;
            at.element().cloned()
        }

        _ => None,
    }
}

fn affix_return(
    scopes: &ScopeContext,
    namespace: &[String],
    uses: &[String],
    kind: AffixKind,
    op: &str,
    first: &Node,
    second: Option<&Node>,
) -> Option<TypeRef> {
    let mut codes = vec![type_code(&infer_type(scopes, namespace, uses, first)?)];
    if let Some(second) = second {
        codes.push(type_code(&infer_type(scopes, namespace, uses, second)?));
    }
    scopes
        .resolve_affix(kind, op, &codes)
        .and_then(|sig| sig.return_type.clone())
}

/// Does a type reference name a known type?
pub fn type_exists(scopes: &ScopeContext, ty: &TypeRef) -> bool {
    if ty.is_array {
        return ty.element().map(|e| type_exists(scopes, e)).unwrap_or(false);
    }
    ty.is_builtin_scalar() || scopes.resolve_type(&ty.name).is_some()
}
