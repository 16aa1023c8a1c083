use std::sync::Arc;

use super::*;
use crate::field::Field;
use crate::types::{EnumDefinition, TypeDefinition};

fn resolve(text: &str, ns: &Namespace) -> Result<ConcreteType, AnnotationError> {
    TypeAnnotation::with_namespace(TypeExpr::forward(text), ns).resolve()
}

#[test]
fn test_forward_reference_declared_later() {
    let ns = Namespace::new("later");
    let annotation = TypeAnnotation::with_namespace(TypeExpr::forward("User"), &ns);
    assert_eq!(
        annotation.resolve().unwrap_err(),
        AnnotationError::UnknownName {
            name: "User".into()
        }
    );

    let user = TypeDefinition::object("User")
        .field(Field::new("name").ty(TypeExpr::string()))
        .declare(&ns)
        .unwrap();

    let resolved = annotation.resolve().unwrap();
    assert_eq!(resolved, ConcreteType::Object(Arc::clone(&user)));
    assert_eq!(
        resolved,
        TypeAnnotation::new(&user).resolve().unwrap(),
        "forward and direct references resolve identically"
    );
}

#[test]
fn test_resolution_is_idempotent() {
    let ns = Namespace::new("idempotent");
    EnumDefinition::new("Color").value("RED", "red").declare(&ns);

    let first = resolve("Optional[List[Color]]", &ns).unwrap();
    let second = TypeAnnotation::new(first.clone()).resolve().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_string(), "Optional[List[Color]]");
}

#[test]
fn test_optional_collapses_to_single_member() {
    let ns = Namespace::new("optional");
    let resolved = resolve("Optional[int]", &ns).unwrap();
    let ConcreteType::Optional(inner) = &resolved else {
        panic!("expected optional, got {resolved}");
    };
    assert!(matches!(**inner, ConcreteType::Scalar(ScalarType::Native(ref n)) if *n == NativeType::INT));

    let piped = resolve("None | int", &ns).unwrap();
    assert_eq!(piped, resolved);

    let nested = resolve("Optional[Optional[int]]", &ns).unwrap();
    assert_eq!(nested, resolved);
}

#[test]
fn test_union_with_null_keeps_remaining_members() {
    let ns = Namespace::new("unions");
    let a = TypeDefinition::object("A")
        .field(Field::new("a").ty(TypeExpr::int()))
        .declare(&ns)
        .unwrap();
    let b = TypeDefinition::object("B")
        .field(Field::new("b").ty(TypeExpr::int()))
        .declare(&ns)
        .unwrap();

    let resolved = resolve("Union[A, B, None]", &ns).unwrap();
    let ConcreteType::Optional(inner) = resolved else {
        panic!("expected optional");
    };
    let ConcreteType::Union(union) = *inner else {
        panic!("expected union");
    };
    assert_eq!(union.name(), None);
    assert_eq!(
        union.resolved_members().unwrap(),
        vec![ConcreteType::Object(a), ConcreteType::Object(b)]
    );
}

#[test]
fn test_duplicate_union_members_collapse() {
    let ns = Namespace::new("dedup");
    TypeDefinition::object("A")
        .field(Field::new("a").ty(TypeExpr::int()))
        .declare(&ns)
        .unwrap();
    let resolved = resolve("A | A", &ns).unwrap();
    assert!(matches!(resolved, ConcreteType::Object(_)));
}

#[test]
fn test_generic_specializations_are_distinct_and_cached() {
    let ns = Namespace::new("generics");
    let t = ns.type_var("T");
    TypeDefinition::object("Box")
        .field(Field::new("value").ty(&t))
        .declare(&ns)
        .unwrap();

    let int_box = resolve("Box[int]", &ns).unwrap();
    let str_box = resolve("Box[str]", &ns).unwrap();
    assert_ne!(int_box, str_box);
    assert_eq!(int_box, resolve("Box[int]", &ns).unwrap());
    assert!(!int_box.is_generic());
    assert_eq!(int_box.to_string(), "Box[int]");

    let unbound = resolve("Box", &ns).unwrap();
    assert!(unbound.is_generic());
}

#[test]
fn test_generic_arity_mismatch() {
    let ns = Namespace::new("arity");
    let t = ns.type_var("T");
    TypeDefinition::object("Box")
        .field(Field::new("value").ty(&t))
        .declare(&ns)
        .unwrap();

    assert_eq!(
        resolve("Box[int, str]", &ns).unwrap_err(),
        AnnotationError::GenericArity {
            name: "Box".into(),
            expected: 1,
            found: 2
        }
    );
    assert!(matches!(
        resolve("int[str]", &ns),
        Err(AnnotationError::UnknownName { .. })
    ));
}

#[test]
fn test_lazy_reference_resolves_in_target_namespace() {
    let home = Namespace::new("home");
    let other = Namespace::new("other");

    let expr = TypeExpr::annotated(TypeExpr::forward("Remote"), [Metadata::Lazy(other.clone())]);
    let resolved = TypeAnnotation::with_namespace(expr, &home).resolve().unwrap();
    let ConcreteType::LazyRef(lazy) = &resolved else {
        panic!("expected lazy reference, got {resolved}");
    };
    assert_eq!(lazy.type_name(), "Remote");
    assert!(lazy.resolve_type().is_err());

    let remote = TypeDefinition::object("Remote")
        .field(Field::new("id").ty(TypeExpr::id()))
        .declare(&other)
        .unwrap();
    assert_eq!(lazy.resolve_type().unwrap(), ConcreteType::Object(remote));
}

#[test]
fn test_annotated_metadata_is_preserved() {
    let ns = Namespace::new("annotated");
    let expr = TypeExpr::annotated(TypeExpr::int(), [Metadata::Private]);
    let resolved = TypeAnnotation::with_namespace(expr, &ns).resolve().unwrap();

    assert!(matches!(resolved, ConcreteType::Annotated(_, _)));
    assert!(matches!(resolved.strip_annotated(), ConcreteType::Scalar(_)));
    assert_eq!(resolved.metadata().collect::<Vec<_>>(), vec![&Metadata::Private]);
}

#[test]
fn test_forward_reference_without_namespace() {
    let annotation = TypeAnnotation::new(TypeExpr::forward("User"));
    assert_eq!(
        annotation.resolve().unwrap_err(),
        AnnotationError::NoNamespace {
            reference: "User".into()
        }
    );
}

#[test]
fn test_bare_none_is_unsupported() {
    let ns = Namespace::new("none");
    assert!(matches!(
        resolve("None", &ns),
        Err(AnnotationError::Unsupported { .. })
    ));
}
