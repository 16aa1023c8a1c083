//! Resolved types and declared definitions.
//!
//! [`ConcreteType`] is the closed set of shapes an annotation resolves to.
//! Everything downstream of resolution dispatches on it with exhaustive
//! matches.

mod definition;
mod enums;
mod scalar;
mod union;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::IndexMap;

pub use definition::{TypeDefinition, TypeDefinitionBuilder, TypeKind};
pub use enums::{EnumDefinition, EnumDefinitionBuilder, EnumValueDefinition};
pub use scalar::{ScalarDefinition, ScalarRegistry};
pub use union::{Candidate, DefaultTypeResolution, TypeResolution, UnionDefinition};

use crate::annotation::{LazyType, Metadata, NativeType, TypeVar};
use crate::error::AnnotationError;

/// Substitution applied when specializing a generic definition.
pub type TypeVarMap = IndexMap<TypeVar, ConcreteType>;

/// A scalar position: either a native type the registry maps, or an
/// explicitly declared scalar definition.
#[derive(Debug, Clone)]
pub enum ScalarType {
    Native(NativeType),
    Defined(Arc<ScalarDefinition>),
}

impl PartialEq for ScalarType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => a == b,
            (Self::Defined(a), Self::Defined(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Hash for ScalarType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Native(native) => native.hash(state),
            Self::Defined(def) => def.name().hash(state),
        }
    }
}

/// A fully resolved type.
#[derive(Debug, Clone)]
pub enum ConcreteType {
    Scalar(ScalarType),
    Enum(Arc<EnumDefinition>),
    List(Box<ConcreteType>),
    Optional(Box<ConcreteType>),
    Object(Arc<TypeDefinition>),
    Input(Arc<TypeDefinition>),
    Interface(Arc<TypeDefinition>),
    Union(Arc<UnionDefinition>),
    TypeVar(TypeVar),
    LazyRef(LazyType),
    Annotated(Box<ConcreteType>, Vec<Metadata>),
}

impl ConcreteType {
    /// Picks the object, input or interface variant from the definition kind.
    pub fn from_definition(definition: Arc<TypeDefinition>) -> Self {
        match definition.kind() {
            TypeKind::Object => Self::Object(definition),
            TypeKind::Input => Self::Input(definition),
            TypeKind::Interface => Self::Interface(definition),
        }
    }

    /// Removes `Annotated` wrappers.
    pub fn strip_annotated(&self) -> &ConcreteType {
        match self {
            Self::Annotated(inner, _) => inner.strip_annotated(),
            other => other,
        }
    }

    /// Metadata attached at the top level.
    pub fn metadata(&self) -> impl Iterator<Item = &Metadata> {
        let mut all = Vec::new();
        let mut current = self;
        while let Self::Annotated(inner, metadata) = current {
            all.extend(metadata.iter());
            current = inner;
        }
        all.into_iter()
    }

    /// The definition behind an object, input or interface type.
    pub fn definition(&self) -> Option<&Arc<TypeDefinition>> {
        match self.strip_annotated() {
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => Some(def),
            _ => None,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.strip_annotated(), Self::Optional(_))
    }

    /// True when a type variable is reachable without crossing a
    /// specialized definition.
    pub fn is_generic(&self) -> bool {
        match self {
            Self::TypeVar(_) => true,
            Self::List(inner) | Self::Optional(inner) | Self::Annotated(inner, _) => {
                inner.is_generic()
            }
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => def.is_generic(),
            Self::Union(union) => union
                .resolved_members()
                .map(|members| members.iter().any(ConcreteType::is_generic))
                .unwrap_or(false),
            Self::Scalar(_) | Self::Enum(_) | Self::LazyRef(_) => false,
        }
    }

    pub(crate) fn collect_type_vars(&self, out: &mut Vec<TypeVar>) {
        match self {
            Self::TypeVar(var) => {
                if !out.contains(var) {
                    out.push(var.clone());
                }
            }
            Self::List(inner) | Self::Optional(inner) | Self::Annotated(inner, _) => {
                inner.collect_type_vars(out);
            }
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => {
                for var in def.type_params() {
                    if !out.contains(var) {
                        out.push(var.clone());
                    }
                }
            }
            Self::Union(union) => {
                if let Ok(members) = union.resolved_members() {
                    for member in &members {
                        member.collect_type_vars(out);
                    }
                }
            }
            Self::Scalar(_) | Self::Enum(_) | Self::LazyRef(_) => {}
        }
    }

    /// Replaces type variables according to `map`, specializing generic
    /// definitions along the way.
    ///
    /// # Errors
    ///
    /// Propagates a failed specialization.
    pub fn substitute(&self, map: &TypeVarMap) -> Result<ConcreteType, AnnotationError> {
        Ok(match self {
            Self::TypeVar(var) => map.get(var).cloned().unwrap_or_else(|| self.clone()),
            Self::List(inner) => Self::List(Box::new(inner.substitute(map)?)),
            Self::Optional(inner) => Self::Optional(Box::new(inner.substitute(map)?)),
            Self::Annotated(inner, metadata) => {
                Self::Annotated(Box::new(inner.substitute(map)?), metadata.clone())
            }
            Self::Object(def) | Self::Input(def) | Self::Interface(def) if def.is_generic() => {
                Self::from_definition(def.copy_with(map)?)
            }
            Self::Union(union) if self.is_generic() => Self::Union(Arc::new(union.copy_with(map))),
            other => other.clone(),
        })
    }
}

impl PartialEq for ConcreteType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => a.origin() == b.origin(),
            (Self::List(a), Self::List(b)) | (Self::Optional(a), Self::Optional(b)) => a == b,
            (Self::Object(a), Self::Object(b))
            | (Self::Input(a), Self::Input(b))
            | (Self::Interface(a), Self::Interface(b)) => a.origin() == b.origin(),
            (Self::Union(a), Self::Union(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::TypeVar(a), Self::TypeVar(b)) => a == b,
            (Self::LazyRef(a), Self::LazyRef(b)) => a == b,
            (Self::Annotated(a, ma), Self::Annotated(b, mb)) => a == b && ma == mb,
            _ => false,
        }
    }
}

impl Eq for ConcreteType {}

impl Hash for ConcreteType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Scalar(scalar) => scalar.hash(state),
            Self::Enum(def) => def.origin().hash(state),
            Self::List(inner) | Self::Optional(inner) | Self::Annotated(inner, _) => {
                inner.hash(state);
            }
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => def.origin().hash(state),
            Self::Union(union) => union.name().hash(state),
            Self::TypeVar(var) => var.hash(state),
            Self::LazyRef(lazy) => lazy.type_name().hash(state),
        }
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ScalarType::Native(native)) => f.write_str(native.name()),
            Self::Scalar(ScalarType::Defined(def)) => f.write_str(def.name()),
            Self::Enum(def) => f.write_str(def.name()),
            Self::List(inner) => write!(f, "List[{inner}]"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => {
                f.write_str(def.name())?;
                if let Some(args) = def.specialized_args() {
                    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                    write!(f, "[{}]", args.join(", "))?;
                }
                Ok(())
            }
            Self::Union(union) => match union.name() {
                Some(name) => f.write_str(name),
                None => {
                    let members: Vec<String> = union
                        .resolved_members()
                        .unwrap_or_default()
                        .iter()
                        .map(ToString::to_string)
                        .collect();
                    write!(f, "Union[{}]", members.join(", "))
                }
            },
            Self::TypeVar(var) => write!(f, "~{}", var.name()),
            Self::LazyRef(lazy) => write!(f, "Lazy['{}']", lazy.type_name()),
            Self::Annotated(inner, _) => write!(f, "Annotated[{inner}]"),
        }
    }
}
