use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::{Declared, TypeAnnotation, TypeExpr, TypeVar};
use crate::error::AnnotationError;
use crate::types::ConcreteType;

/// The lexical scope forward references are evaluated in.
///
/// Cloning is cheap and clones share contents, so a namespace captured by an
/// annotation sees items declared after the annotation was written.
#[derive(Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

struct NamespaceInner {
    name: String,
    items: DashMap<String, Declared>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                name: name.into(),
                items: DashMap::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Declares an item under its own name, replacing any previous item.
    pub fn declare(&self, item: impl Into<Declared>) {
        let item = item.into();
        self.inner.items.insert(item.name().to_owned(), item);
    }

    /// Declares an item under an alias.
    pub fn insert(&self, name: impl Into<String>, item: impl Into<Declared>) {
        self.inner.items.insert(name.into(), item.into());
    }

    /// Creates a type variable and declares it.
    pub fn type_var(&self, name: &str) -> TypeVar {
        let var = TypeVar::new(name);
        self.declare(var.clone());
        var
    }

    pub fn get(&self, name: &str) -> Option<Declared> {
        self.inner.items.get(name).map(|item| item.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.items.contains_key(name)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.inner.items.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("Namespace")
            .field("name", &self.inner.name)
            .field("items", &names)
            .finish()
    }
}

/// A deferred reference to a type declared in another namespace.
///
/// Created from a forward reference marked with
/// [`Metadata::Lazy`](super::Metadata::Lazy); the target is looked up only
/// when the converter needs it, which lets two namespaces reference each
/// other.
#[derive(Debug, Clone)]
pub struct LazyType {
    type_name: String,
    namespace: Namespace,
}

impl LazyType {
    pub fn new(type_name: impl Into<String>, namespace: Namespace) -> Self {
        Self {
            type_name: type_name.into(),
            namespace,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Resolves the target type.
    ///
    /// # Errors
    ///
    /// Fails if the target namespace does not (yet) declare the type.
    pub fn resolve_type(&self) -> Result<ConcreteType, AnnotationError> {
        TypeAnnotation::with_namespace(TypeExpr::Forward(self.type_name.clone()), &self.namespace)
            .resolve()
    }
}

impl PartialEq for LazyType {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.namespace.ptr_eq(&other.namespace)
    }
}
