//! Type annotations and their resolution.
//!
//! A [`TypeAnnotation`] wraps a raw [`TypeExpr`] together with the
//! [`Namespace`] forward references are evaluated in. Nothing is evaluated
//! when the annotation is created: [`TypeAnnotation::resolve`] turns it into
//! a [`ConcreteType`] on demand, so a type may reference another type that
//! is declared later in the same namespace.

mod namespace;
mod parser;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

pub use namespace::{LazyType, Namespace};

use crate::error::AnnotationError;
use crate::field::ArgumentOverride;
use crate::permission::PermissionClass;
use crate::types::{
    ConcreteType, EnumDefinition, ScalarDefinition, ScalarType, TypeDefinition, TypeVarMap,
    UnionDefinition,
};

/// A type variable used by generic type definitions.
///
/// Identity is per `TypeVar::new` call; two variables named `T` are distinct.
#[derive(Clone)]
pub struct TypeVar {
    id: u64,
    name: Arc<str>,
}

impl TypeVar {
    pub fn new(name: &str) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeVar {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeVar {}

impl Hash for TypeVar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "~{}", self.name)
    }
}

/// A language-level type without a schema definition of its own, such as
/// `int` or `datetime`. The scalar registry decides what it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeType(Cow<'static, str>);

impl NativeType {
    pub const INT: Self = Self(Cow::Borrowed("int"));
    pub const FLOAT: Self = Self(Cow::Borrowed("float"));
    pub const STR: Self = Self(Cow::Borrowed("str"));
    pub const BOOL: Self = Self(Cow::Borrowed("bool"));
    pub const ID: Self = Self(Cow::Borrowed("ID"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Something declared in a namespace.
#[derive(Debug, Clone)]
pub enum Declared {
    Type(Arc<TypeDefinition>),
    Enum(Arc<EnumDefinition>),
    Scalar(Arc<ScalarDefinition>),
    Union(Arc<UnionDefinition>),
    Var(TypeVar),
}

impl Declared {
    /// The name the item is declared under.
    pub fn name(&self) -> &str {
        match self {
            Self::Type(def) => def.name(),
            Self::Enum(def) => def.name(),
            Self::Scalar(def) => def.name(),
            Self::Union(def) => def.name().unwrap_or_default(),
            Self::Var(var) => var.name(),
        }
    }

    fn to_concrete(&self) -> ConcreteType {
        match self {
            Self::Type(def) => ConcreteType::from_definition(Arc::clone(def)),
            Self::Enum(def) => ConcreteType::Enum(Arc::clone(def)),
            Self::Scalar(def) => ConcreteType::Scalar(ScalarType::Defined(Arc::clone(def))),
            Self::Union(def) => ConcreteType::Union(Arc::clone(def)),
            Self::Var(var) => ConcreteType::TypeVar(var.clone()),
        }
    }
}

impl From<Arc<TypeDefinition>> for Declared {
    fn from(def: Arc<TypeDefinition>) -> Self {
        Self::Type(def)
    }
}

impl From<&Arc<TypeDefinition>> for Declared {
    fn from(def: &Arc<TypeDefinition>) -> Self {
        Self::Type(Arc::clone(def))
    }
}

impl From<Arc<EnumDefinition>> for Declared {
    fn from(def: Arc<EnumDefinition>) -> Self {
        Self::Enum(def)
    }
}

impl From<&Arc<EnumDefinition>> for Declared {
    fn from(def: &Arc<EnumDefinition>) -> Self {
        Self::Enum(Arc::clone(def))
    }
}

impl From<Arc<ScalarDefinition>> for Declared {
    fn from(def: Arc<ScalarDefinition>) -> Self {
        Self::Scalar(def)
    }
}

impl From<Arc<UnionDefinition>> for Declared {
    fn from(def: Arc<UnionDefinition>) -> Self {
        Self::Union(def)
    }
}

impl From<&Arc<UnionDefinition>> for Declared {
    fn from(def: &Arc<UnionDefinition>) -> Self {
        Self::Union(Arc::clone(def))
    }
}

impl From<TypeVar> for Declared {
    fn from(var: TypeVar) -> Self {
        Self::Var(var)
    }
}

/// Side-channel values attached to an annotation with
/// [`TypeExpr::annotated`]. They do not change the wire type.
#[derive(Clone)]
pub enum Metadata {
    /// A permission requirement for the field.
    Permission(PermissionClass),
    /// Overrides for a resolver argument.
    Argument(ArgumentOverride),
    /// The forward reference names a type in another namespace and must be
    /// resolved lazily.
    Lazy(Namespace),
    /// The field is kept on the definition but omitted from the schema.
    Private,
    /// Application defined metadata, ignored by the converter.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission(class) => f.debug_tuple("Permission").field(class).finish(),
            Self::Argument(arg) => f.debug_tuple("Argument").field(arg).finish(),
            Self::Lazy(ns) => f.debug_tuple("Lazy").field(&ns.name()).finish(),
            Self::Private => f.write_str("Private"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Permission(a), Self::Permission(b)) => a == b,
            (Self::Argument(a), Self::Argument(b)) => a == b,
            (Self::Lazy(a), Self::Lazy(b)) => a.ptr_eq(b),
            (Self::Private, Self::Private) => true,
            (Self::Custom(a), Self::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A raw, possibly unevaluated type expression.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// Textual reference evaluated against the annotation's namespace.
    Forward(String),
    Native(NativeType),
    /// The null type; only meaningful as a union member.
    Null,
    /// Marker for a resolver parameter receiving the request [`Info`](crate::Info).
    Info,
    Declared(Declared),
    List(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    /// A generic type applied to type arguments.
    Generic(Box<TypeExpr>, Vec<TypeExpr>),
    Var(TypeVar),
    /// An asynchronous stream of the inner type.
    Async(Box<TypeExpr>),
    Annotated(Box<TypeExpr>, Vec<Metadata>),
    /// An already resolved type.
    Resolved(ConcreteType),
}

impl TypeExpr {
    pub fn forward(text: impl Into<String>) -> Self {
        Self::Forward(text.into())
    }

    pub fn int() -> Self {
        Self::Native(NativeType::INT)
    }

    pub fn float() -> Self {
        Self::Native(NativeType::FLOAT)
    }

    pub fn string() -> Self {
        Self::Native(NativeType::STR)
    }

    pub fn boolean() -> Self {
        Self::Native(NativeType::BOOL)
    }

    pub fn id() -> Self {
        Self::Native(NativeType::ID)
    }

    pub fn native(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Native(NativeType::new(name))
    }

    pub fn named(item: impl Into<Declared>) -> Self {
        Self::Declared(item.into())
    }

    pub fn list(of: impl Into<TypeExpr>) -> Self {
        Self::List(Box::new(of.into()))
    }

    pub fn optional(of: impl Into<TypeExpr>) -> Self {
        Self::Union(vec![of.into(), Self::Null])
    }

    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Union(members.into_iter().collect())
    }

    pub fn generic(base: impl Into<TypeExpr>, args: impl IntoIterator<Item = TypeExpr>) -> Self {
        Self::Generic(Box::new(base.into()), args.into_iter().collect())
    }

    pub fn stream(of: impl Into<TypeExpr>) -> Self {
        Self::Async(Box::new(of.into()))
    }

    pub fn annotated(base: impl Into<TypeExpr>, metadata: impl IntoIterator<Item = Metadata>) -> Self {
        Self::Annotated(Box::new(base.into()), metadata.into_iter().collect())
    }

    /// Splits off any `Annotated` wrappers, innermost metadata first.
    pub(crate) fn strip_annotated(&self) -> (&TypeExpr, Vec<Metadata>) {
        match self {
            Self::Annotated(inner, extra) => {
                let (base, mut metadata) = inner.strip_annotated();
                metadata.extend(extra.iter().cloned());
                (base, metadata)
            }
            other => (other, Vec::new()),
        }
    }

    /// Collects type variables by walking the expression without resolving
    /// declared types, in first-occurrence order.
    ///
    /// Forward references to names not declared yet are fine; malformed ones
    /// are an error. Without a namespace a forward reference cannot name a
    /// type variable.
    pub(crate) fn collect_type_vars(
        &self,
        namespace: Option<&Namespace>,
        out: &mut Vec<TypeVar>,
    ) -> Result<(), AnnotationError> {
        match self {
            Self::Forward(text) => {
                if let Some(ns) = namespace {
                    parser::parse_lenient(text, ns)?.collect_type_vars(namespace, out)?;
                }
            }
            Self::Var(var) | Self::Declared(Declared::Var(var)) => {
                if !out.contains(var) {
                    out.push(var.clone());
                }
            }
            Self::List(inner) | Self::Async(inner) | Self::Annotated(inner, _) => {
                inner.collect_type_vars(namespace, out)?;
            }
            Self::Union(members) | Self::Generic(_, members) => {
                for member in members {
                    member.collect_type_vars(namespace, out)?;
                }
            }
            Self::Resolved(ty) => ty.collect_type_vars(out),
            Self::Declared(_) | Self::Native(_) | Self::Null | Self::Info => {}
        }
        Ok(())
    }
}

impl From<Declared> for TypeExpr {
    fn from(item: Declared) -> Self {
        Self::Declared(item)
    }
}

impl From<Arc<TypeDefinition>> for TypeExpr {
    fn from(def: Arc<TypeDefinition>) -> Self {
        Self::Declared(Declared::Type(def))
    }
}

impl From<&Arc<TypeDefinition>> for TypeExpr {
    fn from(def: &Arc<TypeDefinition>) -> Self {
        Self::Declared(Declared::Type(Arc::clone(def)))
    }
}

impl From<&Arc<EnumDefinition>> for TypeExpr {
    fn from(def: &Arc<EnumDefinition>) -> Self {
        Self::Declared(Declared::Enum(Arc::clone(def)))
    }
}

impl From<&Arc<UnionDefinition>> for TypeExpr {
    fn from(def: &Arc<UnionDefinition>) -> Self {
        Self::Declared(Declared::Union(Arc::clone(def)))
    }
}

impl From<&Arc<ScalarDefinition>> for TypeExpr {
    fn from(def: &Arc<ScalarDefinition>) -> Self {
        Self::Declared(Declared::Scalar(Arc::clone(def)))
    }
}

impl From<TypeVar> for TypeExpr {
    fn from(var: TypeVar) -> Self {
        Self::Var(var)
    }
}

impl From<&TypeVar> for TypeExpr {
    fn from(var: &TypeVar) -> Self {
        Self::Var(var.clone())
    }
}

impl From<ConcreteType> for TypeExpr {
    fn from(ty: ConcreteType) -> Self {
        Self::Resolved(ty)
    }
}

impl From<&str> for TypeExpr {
    fn from(text: &str) -> Self {
        Self::Forward(text.to_owned())
    }
}

/// A type expression plus the namespace it was written in.
#[derive(Debug, Clone)]
pub struct TypeAnnotation {
    expr: TypeExpr,
    namespace: Option<Namespace>,
    /// Applied in order after resolution.
    substitutions: Vec<TypeVarMap>,
}

impl TypeAnnotation {
    pub fn new(expr: impl Into<TypeExpr>) -> Self {
        Self {
            expr: expr.into(),
            namespace: None,
            substitutions: Vec::new(),
        }
    }

    pub fn with_namespace(expr: impl Into<TypeExpr>, namespace: &Namespace) -> Self {
        Self {
            expr: expr.into(),
            namespace: Some(namespace.clone()),
            substitutions: Vec::new(),
        }
    }

    /// The annotation with type variables replaced per `map` once it
    /// resolves.
    pub(crate) fn substituted(&self, map: &TypeVarMap) -> Self {
        let mut copy = self.clone();
        copy.substitutions.push(map.clone());
        copy
    }

    pub fn expr(&self) -> &TypeExpr {
        &self.expr
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub(crate) fn capture_namespace(&mut self, namespace: &Namespace) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.clone());
        }
    }

    /// Resolves the annotation into a concrete type.
    ///
    /// Pure given the namespace contents: calling it again after more types
    /// were declared may succeed where an earlier call failed, and resolving
    /// an already resolved type returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns an [`AnnotationError`] when a forward reference names an
    /// unknown type, a generic is applied incorrectly or the expression has
    /// no schema representation.
    pub fn resolve(&self) -> Result<ConcreteType, AnnotationError> {
        let mut ty = resolve_expr(&self.expr, self.namespace.as_ref())?;
        for map in &self.substitutions {
            if ty.is_generic() {
                ty = ty.substitute(map)?;
            }
        }
        Ok(ty)
    }

    pub(crate) fn collect_type_vars(&self, out: &mut Vec<TypeVar>) -> Result<(), AnnotationError> {
        if self.substitutions.is_empty() {
            self.expr.collect_type_vars(self.namespace.as_ref(), out)
        } else {
            self.resolve()?.collect_type_vars(out);
            Ok(())
        }
    }

    /// Whether the annotation is a lone type variable, metadata aside.
    pub(crate) fn is_type_var(&self) -> bool {
        fn bare(expr: &TypeExpr, namespace: Option<&Namespace>) -> bool {
            match expr.strip_annotated().0 {
                TypeExpr::Var(_) | TypeExpr::Declared(Declared::Var(_)) => true,
                TypeExpr::Forward(text) => namespace
                    .and_then(|ns| parser::parse(text, ns).ok())
                    .is_some_and(|parsed| bare(&parsed, namespace)),
                _ => false,
            }
        }
        bare(&self.expr, self.namespace.as_ref())
    }
}

impl PartialEq for TypeAnnotation {
    fn eq(&self, other: &Self) -> bool {
        match (self.resolve(), other.resolve()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Hash for TypeAnnotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Ok(ty) = self.resolve() {
            ty.hash(state);
        }
    }
}

pub(crate) fn resolve_expr(
    expr: &TypeExpr,
    namespace: Option<&Namespace>,
) -> Result<ConcreteType, AnnotationError> {
    let (base, mut metadata) = expr.strip_annotated();

    // A lazy marker turns a forward reference into a deferred reference to
    // a type in another namespace.
    if let TypeExpr::Forward(text) = base {
        if let Some(pos) = metadata.iter().position(|m| matches!(m, Metadata::Lazy(_))) {
            if let Metadata::Lazy(target) = metadata.remove(pos) {
                let lazy = LazyType::new(text.trim(), target);
                return Ok(wrap(ConcreteType::LazyRef(lazy), metadata));
            }
        }
    }

    let resolved = resolve_base(base, namespace)?;
    Ok(wrap(resolved, metadata))
}

fn wrap(ty: ConcreteType, metadata: Vec<Metadata>) -> ConcreteType {
    if metadata.is_empty() {
        ty
    } else {
        ConcreteType::Annotated(Box::new(ty), metadata)
    }
}

fn resolve_base(
    expr: &TypeExpr,
    namespace: Option<&Namespace>,
) -> Result<ConcreteType, AnnotationError> {
    match expr {
        TypeExpr::Forward(text) => {
            let ns = namespace.ok_or_else(|| AnnotationError::NoNamespace {
                reference: text.clone(),
            })?;
            let parsed = parser::parse(text, ns)?;
            trace!(reference = %text, namespace = ns.name(), "Evaluated forward reference");
            resolve_expr(&parsed, Some(ns))
        }
        TypeExpr::Annotated(..) => resolve_expr(expr, namespace),
        TypeExpr::Async(inner) => resolve_expr(inner, namespace),
        TypeExpr::Resolved(ty) => Ok(ty.clone()),
        TypeExpr::Generic(base, args) => resolve_generic(base, args, namespace),
        TypeExpr::Declared(item) => Ok(item.to_concrete()),
        TypeExpr::List(inner) => Ok(ConcreteType::List(Box::new(resolve_expr(inner, namespace)?))),
        TypeExpr::Union(members) => resolve_union(members, namespace),
        TypeExpr::Var(var) => Ok(ConcreteType::TypeVar(var.clone())),
        TypeExpr::Native(native) => Ok(ConcreteType::Scalar(ScalarType::Native(native.clone()))),
        TypeExpr::Null => Err(AnnotationError::Unsupported {
            description: "None".into(),
        }),
        TypeExpr::Info => Err(AnnotationError::Unsupported {
            description: "Info".into(),
        }),
    }
}

fn resolve_generic(
    base: &TypeExpr,
    args: &[TypeExpr],
    namespace: Option<&Namespace>,
) -> Result<ConcreteType, AnnotationError> {
    let definition = match resolve_expr(base, namespace)? {
        ConcreteType::Object(def) | ConcreteType::Input(def) | ConcreteType::Interface(def) => def,
        other => {
            return Err(AnnotationError::NotGeneric {
                name: other.to_string(),
            });
        }
    };
    let args = args
        .iter()
        .map(|arg| resolve_expr(arg, namespace))
        .collect::<Result<Vec<_>, _>>()?;

    let specialized = definition.specialize(args)?;
    Ok(ConcreteType::from_definition(specialized))
}

fn resolve_union(
    members: &[TypeExpr],
    namespace: Option<&Namespace>,
) -> Result<ConcreteType, AnnotationError> {
    let mut flat = Vec::with_capacity(members.len());
    flatten_union(members, &mut flat);

    let mut nullable = false;
    let mut resolved = Vec::with_capacity(flat.len());
    for member in flat {
        if matches!(member, TypeExpr::Null) {
            nullable = true;
            continue;
        }
        match resolve_expr(member, namespace)? {
            ConcreteType::Optional(inner) => {
                nullable = true;
                push_unique(&mut resolved, *inner);
            }
            ConcreteType::Union(union) if union.name().is_none() => {
                for inner in union.resolved_members()? {
                    push_unique(&mut resolved, inner);
                }
            }
            other => push_unique(&mut resolved, other),
        }
    }

    let inner = match resolved.len() {
        0 => {
            return Err(AnnotationError::Unsupported {
                description: "None".into(),
            });
        }
        1 => resolved.remove(0),
        _ => ConcreteType::Union(Arc::new(UnionDefinition::anonymous(resolved))),
    };

    Ok(if nullable {
        ConcreteType::Optional(Box::new(inner))
    } else {
        inner
    })
}

fn flatten_union<'e>(members: &'e [TypeExpr], out: &mut Vec<&'e TypeExpr>) {
    for member in members {
        match member {
            TypeExpr::Union(inner) => flatten_union(inner, out),
            other => out.push(other),
        }
    }
}

fn push_unique(out: &mut Vec<ConcreteType>, ty: ConcreteType) {
    if !out.contains(&ty) {
        out.push(ty);
    }
}

#[cfg(test)]
mod tests;
