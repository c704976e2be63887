//! Semantic generation
//!
//! The generator family populates the scope context:
//!
//! - pass 0: struct types, namespace and use declarations
//! - pass 1: functions, operators, and extern declarations (mangled, with
//!   dense fn-ids in declaration order)
//! - pass 2: local symbols, inferred declaration types, array element types
//!
//! The namespace handlers run in every pass so the file's prefix is live
//! whenever a later-pass handler mangles a name.

use crate::ast::{Node, NodeKind, NodeTag, TypeRef};
use crate::diagnostics::DiagnosticKind;
use crate::sema::mangle::mangle;
use crate::sema::scope::{AffixSig, Declared, FnSig, ScopeKind, SymbolInfo, TypeInfo};
use crate::sema::visitor::HandlerTable;
use crate::sema::SemaContext;

/// Attribute that keeps a declaration out of the emitted IL.
const ATTR_NO_EMIT: &str = "no_emit";

/// Number of generator passes.
pub const PASS_COUNT: u32 = 3;

/// Build the generator dispatch table.
pub fn handlers() -> HandlerTable<SemaContext> {
    let mut table = HandlerTable::new();

    table.register(0, NodeTag::Struct, struct_decl);
    for pass in 0..PASS_COUNT {
        table.register(pass, NodeTag::Namespace, namespace_decl);
        table.register(pass, NodeTag::Use, use_decl);
    }

    table.register(1, NodeTag::Fn, fn_decl);
    table.register(1, NodeTag::Affix, affix_decl);
    table.register(1, NodeTag::Extern, extern_decl);

    table.register(2, NodeTag::Dec, dec_decl);
    table.register(2, NodeTag::Array, array_element_type);
    table.register(2, NodeTag::Loop, loop_binder_type);

    table
}

fn namespace_decl(cx: &mut SemaContext, node: &mut Node) {
    node.emit = false;
    if let NodeKind::Namespace(name) = &node.kind {
        cx.namespace = vec![name.clone()];
    }
}

fn use_decl(cx: &mut SemaContext, node: &mut Node) {
    node.emit = false;
    if let NodeKind::Use(name) = &node.kind {
        if !cx.uses.contains(name) {
            cx.uses.push(name.clone());
        }
    }
}

fn struct_decl(cx: &mut SemaContext, node: &mut Node) {
    node.emit = false;
    let origin = node.id;
    let NodeKind::Struct { name, fields } = &node.kind else {
        return;
    };

    let mut field_list = Vec::new();
    if let NodeKind::Block(decs) = &fields.kind {
        for dec_node in decs {
            if let NodeKind::Dec(dec) = &dec_node.kind {
                let ty = dec.ty.clone().unwrap_or_else(|| TypeRef::scalar("i64"));
                field_list.push((dec.name.clone(), ty));
            }
        }
    }

    let info = TypeInfo {
        name: name.clone(),
        fields: field_list,
        origin,
    };
    if cx.scopes.declare_type(info).is_err() {
        let name = name.clone();
        cx.error(DiagnosticKind::Redeclaration { name }, node);
    }
}

fn fn_decl(cx: &mut SemaContext, node: &mut Node) {
    // Extern members are declared by the extern handler, outward-facing.
    if cx.scopes.current_kind() == ScopeKind::Extern {
        return;
    }
    if node.has_attribute(ATTR_NO_EMIT) {
        node.emit = false;
    }

    let origin = node.id;
    let impl_target = cx.scopes.innermost_impl().map(str::to_string);
    let NodeKind::Fn(def) = &mut node.kind else {
        return;
    };

    let params = param_types(&def.params);
    let mangled = mangle(&cx.namespace, impl_target.as_deref(), &def.name, &params);
    def.mangled = Some(mangled.clone());
    def.self_type = impl_target.clone();

    let sig = FnSig {
        unmangled: def.name.clone(),
        mangled: mangled.clone(),
        self_type: impl_target,
        params,
        return_type: def.return_type.clone(),
        is_extern: false,
        fn_id: cx.next_fn_id,
        origin,
    };
    match cx.scopes.declare_fn(sig) {
        Ok(Declared::New) => cx.next_fn_id += 1,
        Ok(Declared::Existing) => {}
        Err(()) => cx.error(DiagnosticKind::Redeclaration { name: mangled }, node),
    }
}

fn affix_decl(cx: &mut SemaContext, node: &mut Node) {
    let origin = node.id;
    let impl_target = cx.scopes.innermost_impl().map(str::to_string);
    let NodeKind::Affix(def) = &mut node.kind else {
        return;
    };

    let params = param_types(&def.func.params);
    let mangled = mangle(
        &cx.namespace,
        impl_target.as_deref(),
        &def.func.name,
        &params,
    );
    def.func.mangled = Some(mangled.clone());
    def.func.self_type = impl_target.clone();

    let fn_id = cx.next_fn_id;
    let sig = FnSig {
        unmangled: def.func.name.clone(),
        mangled: mangled.clone(),
        self_type: impl_target,
        params: params.clone(),
        return_type: def.func.return_type.clone(),
        is_extern: false,
        fn_id,
        origin,
    };
    let affix = AffixSig {
        kind: def.kind,
        op: def.func.name.clone(),
        mangled: mangled.clone(),
        params,
        return_type: def.func.return_type.clone(),
        fn_id,
        origin,
    };

    match cx.scopes.declare_fn(sig) {
        Ok(Declared::New) => cx.next_fn_id += 1,
        Ok(Declared::Existing) => {}
        Err(()) => {
            cx.error(DiagnosticKind::Redeclaration { name: mangled }, node);
            return;
        }
    }
    let _ = cx.scopes.declare_affix(affix);
}

fn extern_decl(cx: &mut SemaContext, node: &mut Node) {
    node.emit = false;
    let NodeKind::Extern(decls) = &mut node.kind else {
        return;
    };

    for decl in decls {
        let origin = decl.id;
        let NodeKind::Fn(def) = &mut decl.kind else {
            continue;
        };
        let params = param_types(&def.params);
        let mangled = mangle(&cx.namespace, None, &def.name, &params);
        def.mangled = Some(mangled.clone());

        let sig = FnSig {
            unmangled: def.name.clone(),
            mangled: mangled.clone(),
            self_type: None,
            params,
            return_type: def.return_type.clone(),
            is_extern: true,
            fn_id: cx.next_fn_id,
            origin,
        };
        match cx.scopes.declare_fn(sig) {
            Ok(Declared::New) => cx.next_fn_id += 1,
            Ok(Declared::Existing) => {}
            Err(()) => {
                cx.error(DiagnosticKind::Redeclaration { name: mangled }, decl)
            }
        }
    }
}

fn dec_decl(cx: &mut SemaContext, node: &mut Node) {
    if node.has_attribute(ATTR_NO_EMIT) {
        node.emit = false;
    }

    let origin = node.id;
    let inferred = {
        let NodeKind::Dec(dec) = &node.kind else {
            return;
        };
        match (&dec.ty, &dec.value) {
            (Some(ty), _) => Some(ty.clone()),
            (None, Some(value)) => cx.infer(value),
            (None, None) => None,
        }
    };

    let NodeKind::Dec(dec) = &mut node.kind else {
        return;
    };
    if dec.ty.is_none() {
        dec.ty = inferred.clone();
    }

    let info = SymbolInfo {
        name: dec.name.clone(),
        ty: inferred,
        immutable: dec.immutable,
        origin,
    };
    let name = dec.name.clone();
    if cx.scopes.declare_symbol(info).is_err() {
        cx.error(DiagnosticKind::Redeclaration { name }, node);
    }
}

fn array_element_type(cx: &mut SemaContext, node: &mut Node) {
    let element = {
        let NodeKind::Array {
            elements,
            element_type,
        } = &node.kind
        else {
            return;
        };
        if element_type.is_some() {
            return;
        }
        elements.first().and_then(|first| cx.infer(first))
    };
    if let NodeKind::Array { element_type, .. } = &mut node.kind {
        *element_type = element;
    }
}

/// Fill in the foreach binder's type from the iterated expression before the
/// walk descends and declares it inside the loop scope.
fn loop_binder_type(cx: &mut SemaContext, node: &mut Node) {
    let element = {
        let NodeKind::Loop {
            is_foreach: true,
            expr,
            ..
        } = &node.kind
        else {
            return;
        };
        iterated_element(cx, expr)
    };
    let Some(element) = element else { return };

    if let NodeKind::Loop {
        binder: Some(binder),
        ..
    } = &mut node.kind
    {
        if let NodeKind::Dec(dec) = &mut binder.kind {
            if dec.ty.is_none() {
                dec.ty = Some(element);
            }
        }
    }
}

/// The element type a foreach yields: the subtype of an array, or the
/// return type of a `next` method on an iterator impl.
pub(crate) fn iterated_element(cx: &SemaContext, expr: &Node) -> Option<TypeRef> {
    let ty = cx.infer(expr)?;
    if ty.is_array {
        return ty.element().cloned();
    }
    let next = cx
        .scopes
        .fns_by_unmangled("next")
        .into_iter()
        .find(|sig| sig.self_type.as_deref() == Some(ty.name.as_str()))?;
    next.return_type.clone()
}

fn param_types(params: &[Node]) -> Vec<TypeRef> {
    params
        .iter()
        .map(|param| match &param.kind {
            NodeKind::Dec(dec) => dec
                .ty
                .clone()
                .unwrap_or_else(|| TypeRef::scalar("unknown")),
            _ => TypeRef::scalar("unknown"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::TokenStream;
    use crate::parser;
    use crate::sema::visitor::run_pass;
    use crate::source::SourceFile;

    fn run_generation(text: &str) -> (Node, SemaContext) {
        let source = SourceFile::new("test.src", text);
        let stream = TokenStream::lex(&source);
        let (mut root, errors) = parser::parse(&source, &stream);
        assert!(errors.is_empty(), "{:?}", errors);

        let mut cx = SemaContext::new();
        let table = handlers();
        for pass in 0..PASS_COUNT {
            cx.begin_file();
            run_pass(&table, &mut cx, &mut root, pass);
            assert_eq!(cx.scopes.depth(), 1);
        }
        (root, cx)
    }

    #[test]
    fn test_struct_registered() {
        let (_, cx) = run_generation("struct Vec { var x: f64; var y: f64; }");
        let info = cx.scopes.resolve_type("Vec").unwrap();
        assert_eq!(info.fields.len(), 2);
        assert_eq!(info.fields[0].0, "x");
    }

    #[test]
    fn test_fn_mangled_and_dense_ids() {
        let (root, cx) = run_generation(
            "fn first() { }\nfn second(a: i64) -> i64 { return a; }",
        );
        let first = cx.scopes.resolve_fn_mangled("first$").unwrap();
        let second = cx.scopes.resolve_fn_mangled("second$i64").unwrap();
        assert_eq!(first.fn_id, 0);
        assert_eq!(second.fn_id, 1);

        let NodeKind::Block(stmts) = &root.kind else { panic!() };
        let NodeKind::Fn(def) = &stmts[0].kind else { panic!() };
        assert_eq!(def.mangled.as_deref(), Some("first$"));
    }

    #[test]
    fn test_namespace_prefixes_mangling() {
        let (_, cx) =
            run_generation("namespace math;\nfn abs(x: i64) -> i64 { return x; }");
        assert!(cx.scopes.resolve_fn_mangled("math::abs$i64").is_some());
    }

    #[test]
    fn test_affix_registered() {
        let (_, cx) = run_generation(
            "struct Vec { var x: f64; }\n\
             infix op +(a: Vec, b: Vec) -> Vec { return a; }",
        );
        let sig = cx
            .scopes
            .resolve_affix(
                crate::ast::AffixKind::Infix,
                "+",
                &["Vec".to_string(), "Vec".to_string()],
            )
            .unwrap();
        assert_eq!(sig.mangled, "+$Vec_Vec");
        // affixes are callable through the function table too
        assert!(cx.scopes.resolve_fn_mangled("+$Vec_Vec").is_some());
    }

    #[test]
    fn test_extern_declared_and_skipped_by_codegen() {
        let (root, cx) = run_generation("extern { fn puts(s: str) -> i64; }");
        let sig = cx.scopes.resolve_fn_mangled("puts$str").unwrap();
        assert!(sig.is_extern);
        let NodeKind::Block(stmts) = &root.kind else { panic!() };
        assert!(!stmts[0].emit);
    }

    #[test]
    fn test_dec_type_inference() {
        let (root, cx) = run_generation("fn f() { let x = 1; let s = \"hi\"; }");
        assert!(cx.errors.is_empty());
        let NodeKind::Block(stmts) = &root.kind else { panic!() };
        let NodeKind::Fn(def) = &stmts[0].kind else { panic!() };
        let NodeKind::Block(body) = &def.body.as_ref().unwrap().kind else {
            panic!()
        };
        let NodeKind::Dec(x) = &body[0].kind else { panic!() };
        assert_eq!(x.ty, Some(TypeRef::scalar("i64")));
        let NodeKind::Dec(s) = &body[1].kind else { panic!() };
        assert_eq!(s.ty, Some(TypeRef::scalar("str")));
    }

    #[test]
    fn test_generation_is_idempotent() {
        let source = SourceFile::new(
            "test.src",
            "struct V { var x: f64; }\nfn f(a: i64) -> i64 { let b = a; return b; }",
        );
        let stream = TokenStream::lex(&source);
        let (mut root, _) = parser::parse(&source, &stream);

        let mut cx = SemaContext::new();
        let table = handlers();
        for _ in 0..2 {
            for pass in 0..PASS_COUNT {
                cx.begin_file();
                run_pass(&table, &mut cx, &mut root, pass);
            }
        }
        assert!(cx.errors.is_empty(), "{:?}", cx.errors);
        // ids were not re-allocated on the second run
        assert_eq!(cx.scopes.resolve_fn_mangled("f$i64").unwrap().fn_id, 0);
        assert_eq!(cx.next_fn_id, 1);
    }

    #[test]
    fn test_foreach_binder_typed() {
        let (root, cx) = run_generation("fn f() { loop i in [1, 2, 3] { } }");
        assert!(cx.errors.is_empty());
        let NodeKind::Block(stmts) = &root.kind else { panic!() };
        let NodeKind::Fn(def) = &stmts[0].kind else { panic!() };
        let NodeKind::Block(body) = &def.body.as_ref().unwrap().kind else {
            panic!()
        };
        let NodeKind::Loop { binder, .. } = &body[0].kind else { panic!() };
        let NodeKind::Dec(dec) = &binder.as_ref().unwrap().kind else {
            panic!()
        };
        assert_eq!(dec.ty, Some(TypeRef::scalar("i64")));
    }
}
