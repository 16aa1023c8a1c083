use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;

use super::DefaultValue;
use crate::annotation::{Namespace, TypeAnnotation, TypeExpr};
use crate::docstring::Docstring;
use crate::error::ResolveError;
use crate::info::Info;
use crate::value::Data;

/// What a resolver produces for one call.
pub type ResolveResult = Result<Data, ResolveError>;

type SyncFn = Arc<dyn for<'a> Fn(ResolverCall<'a>) -> ResolveResult + Send + Sync>;
type FutureFn = Arc<dyn for<'a> Fn(ResolverCall<'a>) -> BoxFuture<'a, ResolveResult> + Send + Sync>;
type StreamFn = Arc<
    dyn for<'a> Fn(ResolverCall<'a>) -> Result<BoxStream<'static, ResolveResult>, ResolveError>
        + Send
        + Sync,
>;

/// How the resolver body runs.
#[derive(Clone)]
pub enum ResolverKind {
    Sync(SyncFn),
    Future(FutureFn),
    /// Produces a stream of values; used by subscription fields.
    Stream(StreamFn),
}

/// How a declared parameter is bound at call time. Computed once when the
/// resolver is attached to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRole {
    /// `self`: the parent value.
    Receiver,
    /// `root`: the parent value, by keyword.
    Root,
    /// The request [`Info`].
    Info,
    /// A GraphQL argument, by index into the field's arguments.
    Argument(usize),
}

/// A declared resolver parameter.
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    annotation: TypeAnnotation,
    default: DefaultValue,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeExpr>, default: DefaultValue) -> Self {
        Self {
            name: name.into(),
            annotation: TypeAnnotation::new(ty),
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> &TypeAnnotation {
        &self.annotation
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }
}

/// The arguments a resolver body is called with.
pub struct ResolverCall<'a> {
    receiver: Option<&'a Data>,
    kwargs: IndexMap<String, Data>,
    info: Option<&'a Info<'a>>,
}

impl<'a> ResolverCall<'a> {
    /// Binds converted argument values according to `signature`.
    ///
    /// `arguments` is indexed like the field's argument list.
    pub(crate) fn bind(
        signature: &[ParamRole],
        names: &[&str],
        source: &'a Data,
        mut arguments: Vec<Data>,
        info: Option<&'a Info<'a>>,
    ) -> Self {
        let mut call = Self {
            receiver: None,
            kwargs: IndexMap::with_capacity(arguments.len()),
            info: None,
        };
        for role in signature {
            match *role {
                ParamRole::Receiver | ParamRole::Root => call.receiver = Some(source),
                ParamRole::Info => call.info = info,
                ParamRole::Argument(index) => {
                    if let (Some(name), Some(slot)) = (names.get(index), arguments.get_mut(index)) {
                        call.kwargs.insert((*name).to_owned(), std::mem::take(slot));
                    }
                }
            }
        }
        call
    }

    /// A call for tests and direct invocation.
    pub fn new(receiver: Option<&'a Data>, kwargs: IndexMap<String, Data>) -> Self {
        Self {
            receiver,
            kwargs,
            info: None,
        }
    }

    /// The parent value, when the resolver declared `self` or `root`.
    pub fn receiver(&self) -> Option<&'a Data> {
        self.receiver
    }

    /// Attribute of the parent value.
    pub fn attribute(&self, name: &str) -> Option<&'a Data> {
        self.receiver.and_then(|source| source.attribute(name))
    }

    /// Argument value by parameter name. Omitted arguments are
    /// [`Data::Unset`] when declared with that default.
    pub fn get(&self, name: &str) -> Option<&Data> {
        self.kwargs.get(name)
    }

    pub fn take(&mut self, name: &str) -> Data {
        self.kwargs.shift_remove(name).unwrap_or_default()
    }

    pub fn kwargs(&self) -> &IndexMap<String, Data> {
        &self.kwargs
    }

    /// The request info, when the resolver declared an info parameter.
    pub fn info(&self) -> Option<&'a Info<'a>> {
        self.info
    }
}

/// A resolver function with its declared signature.
#[derive(Clone)]
pub struct Resolver {
    name: String,
    params: Vec<Param>,
    returns: Option<TypeAnnotation>,
    docstring: Option<Docstring>,
    kind: ResolverKind,
}

impl Resolver {
    pub fn new(name: impl Into<String>) -> ResolverBuilder {
        ResolverBuilder {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            docstring: None,
            namespace: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn returns(&self) -> Option<&TypeAnnotation> {
        self.returns.as_ref()
    }

    pub fn docstring(&self) -> Option<&Docstring> {
        self.docstring.as_ref()
    }

    pub fn kind(&self) -> &ResolverKind {
        &self.kind
    }

    /// True when calling the resolver suspends.
    pub fn is_async(&self) -> bool {
        !matches!(self.kind, ResolverKind::Sync(_))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ResolverKind::Sync(_) => "sync",
            ResolverKind::Future(_) => "future",
            ResolverKind::Stream(_) => "stream",
        };
        f.debug_struct("Resolver")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}

/// Declares a resolver's signature before its body is supplied.
pub struct ResolverBuilder {
    name: String,
    params: Vec<Param>,
    returns: Option<TypeExpr>,
    docstring: Option<Docstring>,
    namespace: Option<Namespace>,
}

impl ResolverBuilder {
    /// Adds a parameter. Names `self` and `root` and an info-typed
    /// annotation bind to the call context; anything else is a GraphQL
    /// argument.
    #[must_use]
    pub fn param(self, name: impl Into<String>, ty: impl Into<TypeExpr>) -> Self {
        self.param_with_default(name, ty, DefaultValue::Missing)
    }

    #[must_use]
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<TypeExpr>,
        default: DefaultValue,
    ) -> Self {
        self.params.push(Param::new(name, ty, default));
        self
    }

    /// Declares `self` as the first parameter.
    #[must_use]
    pub fn receiver(self) -> Self {
        self.param("self", TypeExpr::Null)
    }

    /// Declares an info parameter.
    #[must_use]
    pub fn info(self, name: impl Into<String>) -> Self {
        self.param(name, TypeExpr::Info)
    }

    #[must_use]
    pub fn returns(mut self, ty: impl Into<TypeExpr>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    #[must_use]
    pub fn docstring(mut self, docstring: impl Into<Docstring>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    /// Namespace for forward references in the signature. Defaults to the
    /// namespace of the type the field is declared on.
    #[must_use]
    pub fn namespace(mut self, namespace: &Namespace) -> Self {
        self.namespace = Some(namespace.clone());
        self
    }

    pub fn sync<F>(self, body: F) -> Resolver
    where
        F: for<'a> Fn(ResolverCall<'a>) -> ResolveResult + Send + Sync + 'static,
    {
        self.finish(ResolverKind::Sync(Arc::new(body)))
    }

    pub fn future<F>(self, body: F) -> Resolver
    where
        F: for<'a> Fn(ResolverCall<'a>) -> BoxFuture<'a, ResolveResult> + Send + Sync + 'static,
    {
        self.finish(ResolverKind::Future(Arc::new(body)))
    }

    /// Subscription resolver. [`current_field`](crate::current_field) is set
    /// while the stream is created and again on every poll of it.
    pub fn stream<F>(self, body: F) -> Resolver
    where
        F: for<'a> Fn(ResolverCall<'a>) -> Result<BoxStream<'static, ResolveResult>, ResolveError>
            + Send
            + Sync
            + 'static,
    {
        self.finish(ResolverKind::Stream(Arc::new(body)))
    }

    fn finish(self, kind: ResolverKind) -> Resolver {
        let namespace = self.namespace;
        let annotate = |expr: TypeExpr| match &namespace {
            Some(ns) => TypeAnnotation::with_namespace(expr, ns),
            None => TypeAnnotation::new(expr),
        };
        let params = self
            .params
            .into_iter()
            .map(|param| Param {
                annotation: annotate(param.annotation.expr().clone()),
                ..param
            })
            .collect();
        Resolver {
            name: self.name,
            params,
            returns: self.returns.map(annotate),
            docstring: self.docstring,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_by_role() {
        let source = Data::from("parent");
        let call = ResolverCall::bind(
            &[ParamRole::Receiver, ParamRole::Argument(1), ParamRole::Argument(0)],
            &["first", "second"],
            &source,
            vec![Data::Int(1), Data::Unset],
            None,
        );
        assert_eq!(call.receiver(), Some(&source));
        assert_eq!(call.get("first"), Some(&Data::Int(1)));
        assert_eq!(call.get("second"), Some(&Data::Unset));
        let keys: Vec<&String> = call.kwargs().keys().collect();
        assert_eq!(keys, vec!["second", "first"]);
        assert!(call.info().is_none());
    }

    #[test]
    fn test_receiver_absent_unless_declared() {
        let source = Data::from("parent");
        let call = ResolverCall::bind(&[], &[], &source, Vec::new(), None);
        assert!(call.receiver().is_none());
    }

    #[test]
    fn test_builder_captures_namespace() {
        let ns = Namespace::new("resolvers");
        let resolver = Resolver::new("items")
            .param("limit", TypeExpr::forward("int"))
            .returns(TypeExpr::forward("List[str]"))
            .namespace(&ns)
            .sync(|_| Ok(Data::List(Vec::new())));

        assert!(!resolver.is_async());
        assert!(resolver.params()[0].annotation().resolve().is_ok());
        assert!(resolver.returns().unwrap().resolve().is_ok());
    }
}
