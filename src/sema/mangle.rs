//! Name mangling
//!
//! Every function and operator has the name it was written with and a
//! mangled name that encodes its enclosing namespaces, impl receiver, and
//! parameter signature:
//!
//! ```text
//! mangled  := [namespace '::']* [impl_type '.'] unmangled '$' sig
//! sig      := code(param1) '_' code(param2) ...
//! code(T)  := T.name          for scalars
//!           | 'A' code(elem)  for arrays
//! ```
//!
//! Mangling is a pure function of those inputs; call sites reconstruct
//! candidate names from argument types during overload resolution.

use crate::ast::TypeRef;

/// The signature code of a single type.
pub fn type_code(ty: &TypeRef) -> String {
    if ty.is_array {
        match ty.element() {
            Some(element) => format!("A{}", type_code(element)),
            None => "A".to_string(),
        }
    } else {
        ty.name.clone()
    }
}

/// The signature segment for a parameter list.
pub fn param_sig(params: &[TypeRef]) -> String {
    params
        .iter()
        .map(type_code)
        .collect::<Vec<_>>()
        .join("_")
}

/// Compute the mangled name of a function or operator.
pub fn mangle(
    namespaces: &[String],
    impl_type: Option<&str>,
    name: &str,
    params: &[TypeRef],
) -> String {
    let mut out = String::new();
    for ns in namespaces {
        out.push_str(ns);
        out.push_str("::");
    }
    if let Some(target) = impl_type {
        out.push_str(target);
        out.push('.');
    }
    out.push_str(name);
    out.push('$');
    out.push_str(&param_sig(params));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_params() {
        assert_eq!(mangle(&[], None, "main", &[]), "main$");
    }

    #[test]
    fn test_operator_signature() {
        let vec = TypeRef::scalar("Vec");
        assert_eq!(
            mangle(&[], None, "+", &[vec.clone(), vec]),
            "+$Vec_Vec"
        );
    }

    #[test]
    fn test_namespace_and_impl() {
        let f = TypeRef::scalar("f64");
        assert_eq!(
            mangle(&["math".to_string()], Some("Vec"), "length", &[f]),
            "math::Vec.length$f64"
        );
    }

    #[test]
    fn test_array_codes() {
        let ints = TypeRef::array(TypeRef::scalar("i64"));
        assert_eq!(type_code(&ints), "Ai64");
        let nested = TypeRef::array(ints.clone());
        assert_eq!(type_code(&nested), "AAi64");
        assert_eq!(mangle(&[], None, "sum", &[ints]), "sum$Ai64");
    }

    #[test]
    fn test_determinism() {
        let params = vec![TypeRef::scalar("i64"), TypeRef::array(TypeRef::scalar("str"))];
        let a = mangle(&["m".to_string()], Some("T"), "f", &params);
        let b = mangle(&["m".to_string()], Some("T"), "f", &params);
        assert_eq!(a, b);
    }
}
