//! Fields, resolver arguments and resolvers.
//!
//! A [`Field`] starts out detached: its declared name may still be
//! unknown and forward references in its annotations are not evaluated.
//! Attaching it to a type definition fills in the name, captures the
//! definition's namespace and validates the declaration. After that the
//! field is immutable; specialization produces a substituted copy.

mod argument;
mod resolver;

use std::sync::Arc;

pub use argument::{Argument, ArgumentOverride};
pub use resolver::{
    Param, ParamRole, ResolveResult, Resolver, ResolverBuilder, ResolverCall, ResolverKind,
};

use crate::annotation::{Metadata, Namespace, TypeAnnotation, TypeExpr, TypeVar};
use crate::description::DescriptionSources;
use crate::directive::SchemaDirective;
use crate::error::{AnnotationError, SchemaError};
use crate::permission::PermissionClass;
use crate::types::{ConcreteType, TypeVarMap};
use crate::value::Data;

/// Three-valued default of a field or argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DefaultValue {
    /// No default: the value is required.
    #[default]
    Missing,
    /// Omitted values are passed on as [`Data::Unset`], not as null.
    Unset,
    Value(Data),
}

impl From<Data> for DefaultValue {
    fn from(value: Data) -> Self {
        Self::Value(value)
    }
}

/// A field of an object, input or interface type.
#[derive(Debug, Clone)]
pub struct Field {
    declared_name: Option<String>,
    graphql_name: Option<String>,
    owner: Option<String>,
    annotation: Option<TypeAnnotation>,
    returns: Option<TypeAnnotation>,
    default: DefaultValue,
    resolver: Option<Arc<Resolver>>,
    arguments: Vec<Argument>,
    signature: Vec<ParamRole>,
    permission_classes: Vec<PermissionClass>,
    directives: Vec<SchemaDirective>,
    is_subscription: bool,
    description: Option<String>,
    description_sources: Option<DescriptionSources>,
    deprecation_reason: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            declared_name: Some(name.into()),
            ..Self::unnamed()
        }
    }

    /// A computed field named after its resolver.
    ///
    /// # Errors
    ///
    /// See [`Field::resolver`].
    pub fn from_resolver(resolver: Resolver) -> Result<Self, SchemaError> {
        Self::unnamed().resolver(resolver)
    }

    fn unnamed() -> Self {
        Self {
            declared_name: None,
            graphql_name: None,
            owner: None,
            annotation: None,
            returns: None,
            default: DefaultValue::Missing,
            resolver: None,
            arguments: Vec::new(),
            signature: Vec::new(),
            permission_classes: Vec::new(),
            directives: Vec::new(),
            is_subscription: false,
            description: None,
            description_sources: None,
            deprecation_reason: None,
        }
    }

    #[must_use]
    pub fn ty(mut self, ty: impl Into<TypeExpr>) -> Self {
        self.annotation = Some(TypeAnnotation::new(ty));
        self
    }

    /// Public name, bypassing the name converter.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.graphql_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Description sources for this field and its arguments, replacing the
    /// ones of the owning type.
    #[must_use]
    pub fn description_sources(mut self, sources: DescriptionSources) -> Self {
        self.description_sources = Some(sources);
        self
    }

    #[must_use]
    pub fn deprecation(mut self, reason: impl Into<String>) -> Self {
        self.deprecation_reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Data>) -> Self {
        self.default = DefaultValue::Value(value.into());
        self
    }

    /// Omitted values are passed on as [`Data::Unset`].
    #[must_use]
    pub fn unset_default(mut self) -> Self {
        self.default = DefaultValue::Unset;
        self
    }

    /// Computes the default now.
    ///
    /// # Errors
    ///
    /// A failing factory is a declaration error,
    /// [`SchemaError::InvalidDefaultFactory`].
    pub fn default_factory<F>(mut self, factory: F) -> Result<Self, SchemaError>
    where
        F: FnOnce() -> Result<Data, String>,
    {
        let value = factory().map_err(|reason| SchemaError::InvalidDefaultFactory {
            field: self.declared_name.clone().unwrap_or_default(),
            reason,
        })?;
        self.default = DefaultValue::Value(value);
        Ok(self)
    }

    #[must_use]
    pub fn permission(mut self, permission: PermissionClass) -> Self {
        self.permission_classes.push(permission);
        self
    }

    #[must_use]
    pub fn directive(mut self, directive: SchemaDirective) -> Self {
        self.directives.push(directive);
        self
    }

    /// Marks the field as a subscription; its resolver yields a stream.
    #[must_use]
    pub fn subscription(mut self) -> Self {
        self.is_subscription = true;
        self
    }

    /// Attaches a resolver, turning the field into a computed field.
    ///
    /// The resolver's parameters are classified once here: `self` (only as
    /// the first parameter), `root`, an info-typed parameter, and GraphQL
    /// arguments for everything else.
    ///
    /// # Errors
    ///
    /// Fails for a misplaced `self`, for more than one
    /// [`ArgumentOverride`] on a parameter, and for union or interface
    /// typed arguments.
    pub fn resolver(mut self, resolver: Resolver) -> Result<Self, SchemaError> {
        let mut signature = Vec::with_capacity(resolver.params().len());
        let mut arguments = Vec::new();

        for (index, param) in resolver.params().iter().enumerate() {
            let role = match param.name() {
                "self" if index == 0 => ParamRole::Receiver,
                "self" => {
                    return Err(SchemaError::InvalidResolverSignature {
                        resolver: resolver.name().to_owned(),
                        reason: "'self' must be the first parameter".into(),
                    });
                }
                "root" => ParamRole::Root,
                _ if matches!(param.annotation().expr().strip_annotated().0, TypeExpr::Info) => {
                    ParamRole::Info
                }
                _ => {
                    arguments.push(Argument::from_param(resolver.name(), param)?);
                    ParamRole::Argument(arguments.len() - 1)
                }
            };
            signature.push(role);
        }

        self.returns = resolver.returns().cloned();
        self.arguments = arguments;
        self.signature = signature;
        self.resolver = Some(Arc::new(resolver));
        Ok(self)
    }

    /// Fills in the declared name, captures the owner's namespace and checks
    /// that the field's type can be determined.
    pub(crate) fn attach(
        &mut self,
        owner: &str,
        namespace: Option<&Namespace>,
    ) -> Result<(), SchemaError> {
        if self.declared_name.is_none() {
            self.declared_name = self.resolver.as_ref().map(|r| r.name().to_owned());
        }
        let Some(name) = self.declared_name.clone() else {
            return Err(SchemaError::MissingFieldName {
                type_name: owner.to_owned(),
            });
        };

        if let Some(ns) = namespace {
            for annotation in [self.annotation.as_mut(), self.returns.as_mut()]
                .into_iter()
                .flatten()
            {
                annotation.capture_namespace(ns);
            }
            for argument in &mut self.arguments {
                argument.capture_namespace(ns);
            }
        }

        match &self.resolver {
            Some(_) if self.default != DefaultValue::Missing => {
                return Err(SchemaError::FieldWithResolverAndDefault {
                    type_name: owner.to_owned(),
                    field: name,
                });
            }
            Some(resolver) if self.annotation.is_none() && self.returns.is_none() => {
                return Err(SchemaError::MissingReturnAnnotation {
                    type_name: owner.to_owned(),
                    field: name,
                    resolver: resolver.name().to_owned(),
                });
            }
            None if self.annotation.is_none() => {
                return Err(SchemaError::MissingFieldAnnotation {
                    type_name: owner.to_owned(),
                    field: name,
                });
            }
            _ => {}
        }

        self.owner = Some(owner.to_owned());
        Ok(())
    }

    /// Declared name. Empty only for a detached field built from nothing.
    pub fn declared_name(&self) -> &str {
        self.declared_name.as_deref().unwrap_or_default()
    }

    /// Explicit public name, if one was given.
    pub fn graphql_name(&self) -> Option<&str> {
        self.graphql_name.as_deref()
    }

    /// Name of the type the field was declared on.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The resolver's return annotation wins unless it is a bare type
    /// variable; then the field's own annotation is used.
    fn chosen_annotation(&self) -> Option<&TypeAnnotation> {
        match (&self.returns, &self.annotation) {
            (Some(returns), Some(own)) if returns.is_type_var() => Some(own),
            (Some(returns), _) => Some(returns),
            (None, own) => own.as_ref(),
        }
    }

    /// The field's type, taken from the resolver's return annotation when
    /// there is one.
    ///
    /// # Errors
    ///
    /// Fails when neither annotation exists or the chosen one does not
    /// resolve yet.
    pub fn field_type(&self) -> Result<ConcreteType, AnnotationError> {
        self.chosen_annotation()
            .ok_or(AnnotationError::Missing)?
            .resolve()
    }

    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    pub fn resolver_ref(&self) -> Option<&Arc<Resolver>> {
        self.resolver.as_ref()
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Parameter roles in declaration order.
    pub fn signature(&self) -> &[ParamRole] {
        &self.signature
    }

    /// Explicit permission classes followed by those found in the type's
    /// annotation metadata, without duplicates.
    pub fn permission_classes(&self) -> Vec<PermissionClass> {
        let mut classes = self.permission_classes.clone();
        if let Ok(ty) = self.field_type() {
            for metadata in ty.metadata() {
                if let Metadata::Permission(class) = metadata {
                    if !classes.contains(class) {
                        classes.push(class.clone());
                    }
                }
            }
        }
        classes
    }

    pub fn directives(&self) -> &[SchemaDirective] {
        &self.directives
    }

    pub fn is_subscription(&self) -> bool {
        self.is_subscription
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn description_source_override(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }

    pub fn deprecation_reason(&self) -> Option<&str> {
        self.deprecation_reason.as_deref()
    }

    /// A field read straight from the parent value, with no resolver and no
    /// permission checks.
    pub fn is_basic_field(&self) -> bool {
        self.resolver.is_none() && self.permission_classes().is_empty()
    }

    /// Kept on the definition but left out of the schema.
    pub fn is_private(&self) -> bool {
        self.field_type()
            .is_ok_and(|ty| ty.metadata().any(|m| matches!(m, Metadata::Private)))
    }

    /// Whether the generated constructor takes this field.
    pub(crate) fn participates_in_init(&self) -> bool {
        self.resolver.is_none()
    }

    pub(crate) fn collect_type_vars(&self, out: &mut Vec<TypeVar>) -> Result<(), SchemaError> {
        match self.chosen_annotation() {
            Some(annotation) => annotation.collect_type_vars(out).map_err(|source| {
                SchemaError::UnresolvedFieldType {
                    type_name: self.owner.clone().unwrap_or_default(),
                    field: self.declared_name().to_owned(),
                    source,
                }
            }),
            None => Ok(()),
        }
    }

    /// Copy with type variables substituted per `map`. Substitution happens
    /// when the type resolves, so failures surface from
    /// [`Field::field_type`].
    pub(crate) fn copy_with(&self, map: &TypeVarMap) -> Field {
        let mut field = self.clone();
        for annotation in [field.annotation.as_mut(), field.returns.as_mut()]
            .into_iter()
            .flatten()
        {
            *annotation = annotation.substituted(map);
        }
        field.arguments = self.arguments.iter().map(|a| a.copy_with(map)).collect();
        field
    }
}
