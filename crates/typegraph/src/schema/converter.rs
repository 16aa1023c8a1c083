//! Declared definitions to engine types.
//!
//! The converter walks the definitions reachable from the roots and emits one
//! engine type per schema name. A name is claimed before the type's fields
//! are converted, so recursive and mutually recursive types terminate; asking
//! for a claimed name again returns it without rebuilding, unless the second
//! request comes from a different definition.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    self, Directive, Enum, EnumItem, InputObject, InputValue, Interface, InterfaceField, Object,
    Scalar, Subscription, SubscriptionField, TypeRef, Union,
};
use indexmap::IndexMap;
use tracing::trace;

use super::arguments::{ArgumentPlan, InputFieldPlan, InputObjectPlan, InputShape};
use super::invoke::FieldPlan;
use super::output::{AbstractShape, EnumShape, OutputShape, PossibleTypes};
use crate::config::SchemaConfig;
use crate::description::{DescriptionLookup, DescriptionSources};
use crate::directive::{DirectiveDefinition, DirectiveLocation, SchemaDirective};
use crate::error::{AnnotationError, SchemaError};
use crate::field::{Argument, DefaultValue, Field, ResolverKind};
use crate::info::{FieldMeta, ResolverStats};
use crate::naming::NameConverter;
use crate::types::{
    Candidate, ConcreteType, DefaultTypeResolution, EnumDefinition, ScalarDefinition, ScalarRegistry,
    ScalarType, TypeDefinition, UnionDefinition,
};
use crate::value::Data;

/// The definition a schema name was emitted from.
#[derive(Debug, Clone)]
pub enum SchemaType {
    Object(Arc<TypeDefinition>),
    Input(Arc<TypeDefinition>),
    Interface(Arc<TypeDefinition>),
    Enum(Arc<EnumDefinition>),
    Union(Arc<UnionDefinition>),
    Scalar(Arc<ScalarDefinition>),
}

impl SchemaType {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Object(_) => "object",
            Self::Input(_) => "input",
            Self::Interface(_) => "interface",
            Self::Enum(_) => "enum",
            Self::Union(_) => "union",
            Self::Scalar(_) => "scalar",
        }
    }

    /// The object, input or interface definition, if any.
    pub fn type_definition(&self) -> Option<&Arc<TypeDefinition>> {
        match self {
            Self::Object(def) | Self::Input(def) | Self::Interface(def) => Some(def),
            _ => None,
        }
    }

    fn same_definition(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b))
            | (Self::Input(a), Self::Input(b))
            | (Self::Interface(a), Self::Interface(b)) => a.origin() == b.origin(),
            (Self::Enum(a), Self::Enum(b)) => a.origin() == b.origin(),
            (Self::Union(a), Self::Union(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Scalar(a), Self::Scalar(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Emitted schema names and their definitions, in emission order.
#[derive(Debug, Clone, Default)]
pub struct TypeMap(IndexMap<String, SchemaType>);

impl TypeMap {
    pub fn get(&self, name: &str) -> Option<&SchemaType> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaType)> {
        self.0.iter().map(|(name, ty)| (name.as_str(), ty))
    }
}

/// Where a type reference appears, for error reporting.
#[derive(Clone, Copy)]
struct Site<'s> {
    type_name: &'s str,
    field: &'s str,
}

impl Site<'_> {
    fn unresolved(&self, source: AnnotationError) -> SchemaError {
        SchemaError::unresolved(self.type_name, self.field, source)
    }
}

/// Parts of an output field shared by object and subscription fields.
struct FieldParts {
    type_ref: TypeRef,
    plan: FieldPlan,
    arguments: Vec<InputValue>,
    description: Option<String>,
}

/// One argument of a converted directive definition.
struct DirectiveArgumentPlan {
    declared_name: String,
    graphql_name: String,
    required: bool,
    shape: InputShape,
}

struct DirectiveEntry {
    definition: Arc<DirectiveDefinition>,
    /// `None` while the definition's own argument types are being converted.
    arguments: Option<Arc<[DirectiveArgumentPlan]>>,
}

pub(crate) struct SchemaConverter<'c> {
    config: &'c SchemaConfig,
    names: &'c dyn NameConverter,
    scalars: &'c ScalarRegistry,
    stats: Arc<ResolverStats>,
    root_value: Arc<Data>,
    type_map: IndexMap<String, SchemaType>,
    types: Vec<dynamic::Type>,
    possible: HashMap<String, PossibleTypes>,
    implementors: IndexMap<String, Vec<Candidate>>,
    inputs: HashMap<String, Arc<InputObjectPlan>>,
    directives: IndexMap<String, DirectiveEntry>,
    directive_sdl: Vec<String>,
}

impl<'c> SchemaConverter<'c> {
    pub(crate) fn new(
        config: &'c SchemaConfig,
        names: &'c dyn NameConverter,
        scalars: &'c ScalarRegistry,
        stats: Arc<ResolverStats>,
        root_value: Arc<Data>,
    ) -> Self {
        Self {
            config,
            names,
            scalars,
            stats,
            root_value,
            type_map: IndexMap::new(),
            types: Vec::new(),
            possible: HashMap::new(),
            implementors: IndexMap::new(),
            inputs: HashMap::new(),
            directives: IndexMap::new(),
            directive_sdl: Vec::new(),
        }
    }

    /// Converts a query or mutation root and returns its schema name.
    pub(crate) fn root(&mut self, def: &Arc<TypeDefinition>) -> Result<String, SchemaError> {
        self.object_type(def)
    }

    /// Converts the subscription root. Every field needs a stream resolver.
    pub(crate) fn subscription_root(&mut self, def: &Arc<TypeDefinition>) -> Result<String, SchemaError> {
        self.ensure_concrete(def)?;
        let name = self.names.from_type(def);
        if !self.claim(&name, SchemaType::Object(Arc::clone(def)))? {
            return Ok(name);
        }

        let mut subscription = Subscription::new(&name);
        if let Some(description) = self.type_description(def) {
            subscription = subscription.description(description);
        }
        for field in def.fields() {
            if field.is_private() {
                continue;
            }
            let streams = field
                .resolver_ref()
                .is_some_and(|r| matches!(r.kind(), ResolverKind::Stream(_)));
            if !streams {
                return Err(SchemaError::InvalidResolverSignature {
                    resolver: field.declared_name().to_owned(),
                    reason: "subscription fields need a stream resolver".to_owned(),
                });
            }

            let parts = self.field_parts(def, &name, field)?;
            let plan = Arc::new(parts.plan);
            let field_name = plan.meta.field_name.clone();
            let mut out = SubscriptionField::new(field_name, parts.type_ref, move |ctx| plan.subscribe(ctx));
            for argument in parts.arguments {
                out = out.argument(argument);
            }
            if let Some(description) = parts.description {
                out = out.description(description);
            }
            subscription = subscription.field(out);
        }
        self.types.push(subscription.into());
        Ok(name)
    }

    /// Registers a type that is not necessarily reachable from the roots.
    pub(crate) fn register(&mut self, ty: &ConcreteType) -> Result<(), SchemaError> {
        let site = Site {
            type_name: "Schema",
            field: "types",
        };
        match ty.strip_annotated() {
            ConcreteType::Object(def) => self.object_type(def).map(drop),
            ConcreteType::Input(def) => self.input_type(def).map(drop),
            ConcreteType::Interface(def) => self.interface_type(def).map(drop),
            ConcreteType::Enum(def) => self.enum_type(def).map(drop),
            ConcreteType::Union(union) => self.union_type(union, site).map(drop),
            ConcreteType::Scalar(scalar) => self.scalar(scalar).map(drop),
            ConcreteType::List(inner) | ConcreteType::Optional(inner) => self.register(inner),
            ConcreteType::LazyRef(lazy) => {
                let resolved = lazy.resolve_type().map_err(|e| site.unresolved(e))?;
                self.register(&resolved)
            }
            ConcreteType::TypeVar(var) => Err(SchemaError::MissingTypesForGeneric {
                type_name: var.name().to_owned(),
                params: vec![var.name().to_owned()],
            }),
            ConcreteType::Annotated(inner, _) => self.register(inner),
        }
    }

    /// Completes interface possible types and hands over the emitted types
    /// with the SDL of the directive definitions in use.
    pub(crate) fn finish(mut self) -> (Vec<dynamic::Type>, TypeMap, String) {
        for (name, candidates) in std::mem::take(&mut self.implementors) {
            if let Some(possible) = self.possible.get(&name) {
                let _ = possible.set(candidates);
            }
        }
        (self.types, TypeMap(self.type_map), self.directive_sdl.join("\n"))
    }

    /// Returns `true` when `name` is new and must be built.
    fn claim(&mut self, name: &str, entry: SchemaType) -> Result<bool, SchemaError> {
        if let Some(existing) = self.type_map.get(name) {
            return if existing.same_definition(&entry) {
                Ok(false)
            } else {
                Err(SchemaError::ScalarAlreadyRegistered {
                    name: name.to_owned(),
                })
            };
        }
        trace!(name, kind = entry.kind(), "registering type");
        self.type_map.insert(name.to_owned(), entry);
        Ok(true)
    }

    fn ensure_concrete(&self, def: &TypeDefinition) -> Result<(), SchemaError> {
        if def.is_generic() {
            return Err(SchemaError::MissingTypesForGeneric {
                type_name: def.name().to_owned(),
                params: def.type_params().iter().map(|p| p.name().to_owned()).collect(),
            });
        }
        Ok(())
    }

    /// Sources for a type and, unless overridden further down, its fields
    /// and their arguments.
    fn type_sources<'d>(&'d self, def: &'d TypeDefinition) -> &'d DescriptionSources {
        def.description_sources().unwrap_or(&self.config.description_sources)
    }

    fn field_sources<'d>(&'d self, owner: &'d TypeDefinition, field: &'d Field) -> &'d DescriptionSources {
        field
            .description_source_override()
            .unwrap_or_else(|| self.type_sources(owner))
    }

    fn type_description(&self, def: &TypeDefinition) -> Option<String> {
        DescriptionLookup {
            description: def.description(),
            type_docstring: def.docstring(),
            ..Default::default()
        }
        .resolve(self.type_sources(def))
    }

    fn field_description(&self, owner: &TypeDefinition, field: &Field) -> Option<String> {
        DescriptionLookup {
            description: field.explicit_description(),
            resolver_docstring: field.resolver_ref().and_then(|r| r.docstring()),
            parent_type_docstring: owner.docstring(),
            child_name: Some(field.declared_name()),
            ..Default::default()
        }
        .resolve(self.field_sources(owner, field))
    }

    fn object_type(&mut self, def: &Arc<TypeDefinition>) -> Result<String, SchemaError> {
        self.ensure_concrete(def)?;
        let name = self.names.from_type(def);
        if !self.claim(&name, SchemaType::Object(Arc::clone(def)))? {
            return Ok(name);
        }

        let mut object = Object::new(&name);
        if let Some(description) = self.type_description(def) {
            object = object.description(description);
        }
        for directive in self.directives(&name, DirectiveLocation::Object, def.directives())? {
            object = object.directive(directive);
        }
        for interface in def.interfaces() {
            let interface_name = self.interface_type(interface)?;
            object = object.implement(&interface_name);
            self.implementors
                .entry(interface_name)
                .or_default()
                .push(Candidate {
                    name: name.clone(),
                    definition: Arc::clone(def),
                });
        }

        for field in def.fields() {
            if field.is_private() {
                continue;
            }
            if field.is_subscription() {
                return Err(SchemaError::InvalidResolverSignature {
                    resolver: field.declared_name().to_owned(),
                    reason: format!("subscription field declared on non-subscription type '{name}'"),
                });
            }
            if let Some(resolver) = field.resolver_ref() {
                if matches!(resolver.kind(), ResolverKind::Stream(_)) {
                    return Err(SchemaError::InvalidResolverSignature {
                        resolver: resolver.name().to_owned(),
                        reason: "stream resolvers are only allowed on subscription fields".to_owned(),
                    });
                }
            }

            let parts = self.field_parts(def, &name, field)?;
            let deprecation = field.deprecation_reason().map(str::to_owned);
            let plan = Arc::new(parts.plan);
            let field_name = plan.meta.field_name.clone();
            let element = format!("{name}.{field_name}");
            let directives = self.directives(&element, DirectiveLocation::FieldDefinition, field.directives())?;
            let mut out = dynamic::Field::new(field_name, parts.type_ref, move |ctx| plan.resolve(ctx));
            for argument in parts.arguments {
                out = out.argument(argument);
            }
            for directive in directives {
                out = out.directive(directive);
            }
            if let Some(description) = parts.description {
                out = out.description(description);
            }
            if deprecation.is_some() {
                out = out.deprecation(deprecation.as_deref());
            }
            object = object.field(out);
        }

        self.types.push(object.into());
        Ok(name)
    }

    fn field_parts(
        &mut self,
        owner: &TypeDefinition,
        owner_name: &str,
        field: &Field,
    ) -> Result<FieldParts, SchemaError> {
        let site = Site {
            type_name: owner_name,
            field: field.declared_name(),
        };
        let ty = field_type(owner_name, field)?;
        let (type_ref, output) = self.output_ref(&ty, site)?;

        let mut arguments = Vec::with_capacity(field.arguments().len());
        let mut plans = Vec::with_capacity(field.arguments().len());
        for argument in field.arguments() {
            let (value, plan) = self.argument(owner, field, argument)?;
            arguments.push(value);
            plans.push(plan);
        }

        let meta = Arc::new(FieldMeta {
            parent_type: owner_name.to_owned(),
            field_name: self.names.from_field(field),
            declared_name: field.declared_name().to_owned(),
            return_type: type_ref.to_string(),
        });
        let plan = FieldPlan {
            nullable: !matches!(type_ref, TypeRef::NonNull(_)),
            meta,
            output,
            arguments: plans,
            resolver: field.resolver_ref().cloned(),
            signature: field.signature().to_vec(),
            permissions: field.permission_classes(),
            root_value: Arc::clone(&self.root_value),
            stats: Arc::clone(&self.stats),
        };
        Ok(FieldParts {
            type_ref,
            plan,
            arguments,
            description: self.field_description(owner, field),
        })
    }

    fn argument(
        &mut self,
        owner: &TypeDefinition,
        field: &Field,
        argument: &Argument,
    ) -> Result<(InputValue, ArgumentPlan), SchemaError> {
        let site = Site {
            type_name: field.declared_name(),
            field: argument.declared_name(),
        };
        argument.check_input_shape(field.declared_name())?;
        let ty = argument.argument_type().map_err(|e| site.unresolved(e))?;
        let (type_ref, shape) = self.input_ref(&ty, site)?;

        let name = self.names.from_argument(argument);
        let mut value = InputValue::new(&name, type_ref);
        if let DefaultValue::Value(data) = argument.default_value() {
            if let Some(default) = shape.default_value(data) {
                value = value.default_value(default);
            }
        }
        let sources = argument
            .description_source_override()
            .unwrap_or_else(|| self.field_sources(owner, field));
        let description = DescriptionLookup {
            description: argument.description(),
            parent_resolver_docstring: field.resolver_ref().and_then(|r| r.docstring()),
            child_name: Some(argument.declared_name()),
            ..Default::default()
        }
        .resolve(sources);
        if let Some(description) = description {
            value = value.description(description);
        }
        let element = format!("{}({name})", field.declared_name());
        for directive in self.directives(&element, DirectiveLocation::ArgumentDefinition, argument.directives())? {
            value = value.directive(directive);
        }

        let plan = ArgumentPlan {
            declared_name: argument.declared_name().to_owned(),
            graphql_name: name,
            default: argument.default_value().clone(),
            shape,
        };
        Ok((value, plan))
    }

    fn output_ref(&mut self, ty: &ConcreteType, site: Site<'_>) -> Result<(TypeRef, OutputShape), SchemaError> {
        let (inner, nullable) = unwrap_optional(ty);
        let (named, shape) = self.output_named(inner, site)?;
        Ok((non_null_unless(named, nullable), shape))
    }

    fn output_named(&mut self, ty: &ConcreteType, site: Site<'_>) -> Result<(TypeRef, OutputShape), SchemaError> {
        Ok(match ty {
            ConcreteType::Scalar(scalar) => {
                let def = self.scalar(scalar)?;
                (TypeRef::named(def.name()), OutputShape::Scalar(def))
            }
            ConcreteType::Enum(def) => {
                let name = self.enum_type(def)?;
                (TypeRef::named(name), OutputShape::Enum(self.enum_shape(def)))
            }
            ConcreteType::List(item) => {
                let (item_ref, item_shape) = self.output_ref(item, site)?;
                (TypeRef::List(Box::new(item_ref)), OutputShape::List(Box::new(item_shape)))
            }
            ConcreteType::Optional(inner) | ConcreteType::Annotated(inner, _) => {
                self.output_named(inner, site)?
            }
            ConcreteType::Object(def) => (TypeRef::named(self.object_type(def)?), OutputShape::Object),
            ConcreteType::Interface(def) => {
                let name = self.interface_type(def)?;
                let shape = OutputShape::Abstract(AbstractShape {
                    name: name.clone(),
                    possible: self.possible_types(&name),
                    resolution: Arc::new(DefaultTypeResolution),
                });
                (TypeRef::named(name), shape)
            }
            ConcreteType::Union(union) => {
                let name = self.union_type(union, site)?;
                let shape = OutputShape::Abstract(AbstractShape {
                    name: name.clone(),
                    possible: self.possible_types(&name),
                    resolution: Arc::clone(union.type_resolution()),
                });
                (TypeRef::named(name), shape)
            }
            ConcreteType::Input(def) => {
                return Err(SchemaError::UnsupportedType {
                    type_name: format!("input type '{}' used as an output", def.name()),
                });
            }
            ConcreteType::TypeVar(var) => {
                return Err(SchemaError::MissingTypesForGeneric {
                    type_name: site.type_name.to_owned(),
                    params: vec![var.name().to_owned()],
                });
            }
            ConcreteType::LazyRef(lazy) => {
                let resolved = lazy.resolve_type().map_err(|e| site.unresolved(e))?;
                let (type_ref, shape) = self.output_ref(&resolved, site)?;
                (strip_non_null(type_ref), shape)
            }
        })
    }

    fn input_ref(&mut self, ty: &ConcreteType, site: Site<'_>) -> Result<(TypeRef, InputShape), SchemaError> {
        let (inner, nullable) = unwrap_optional(ty);
        let (named, shape) = self.input_named(inner, site)?;
        Ok((non_null_unless(named, nullable), shape))
    }

    fn input_named(&mut self, ty: &ConcreteType, site: Site<'_>) -> Result<(TypeRef, InputShape), SchemaError> {
        let invalid = |kind: &str| SchemaError::InvalidFieldArgument {
            field: site.type_name.to_owned(),
            argument: site.field.to_owned(),
            kind: kind.to_owned(),
        };
        Ok(match ty {
            ConcreteType::Scalar(scalar) => {
                let def = self.scalar(scalar)?;
                (TypeRef::named(def.name()), InputShape::Scalar(def))
            }
            ConcreteType::Enum(def) => {
                let name = self.enum_type(def)?;
                (TypeRef::named(name), InputShape::Enum(self.enum_shape(def)))
            }
            ConcreteType::List(item) => {
                let (item_ref, item_shape) = self.input_ref(item, site)?;
                (TypeRef::List(Box::new(item_ref)), InputShape::List(Box::new(item_shape)))
            }
            ConcreteType::Optional(inner) | ConcreteType::Annotated(inner, _) => {
                self.input_named(inner, site)?
            }
            ConcreteType::Input(def) => {
                let plan = self.input_type(def)?;
                (TypeRef::named(plan.name()), InputShape::Object(plan))
            }
            ConcreteType::Union(_) => return Err(invalid("union")),
            ConcreteType::Interface(_) => return Err(invalid("interface")),
            ConcreteType::Object(def) => {
                return Err(SchemaError::UnsupportedType {
                    type_name: format!("object type '{}' used as an input", def.name()),
                });
            }
            ConcreteType::TypeVar(var) => {
                return Err(SchemaError::MissingTypesForGeneric {
                    type_name: site.type_name.to_owned(),
                    params: vec![var.name().to_owned()],
                });
            }
            ConcreteType::LazyRef(lazy) => {
                let resolved = lazy.resolve_type().map_err(|e| site.unresolved(e))?;
                let (type_ref, shape) = self.input_ref(&resolved, site)?;
                (strip_non_null(type_ref), shape)
            }
        })
    }

    fn possible_types(&mut self, name: &str) -> PossibleTypes {
        Arc::clone(self.possible.entry(name.to_owned()).or_default())
    }

    fn interface_type(&mut self, def: &Arc<TypeDefinition>) -> Result<String, SchemaError> {
        self.ensure_concrete(def)?;
        let name = self.names.from_type(def);
        if !self.claim(&name, SchemaType::Interface(Arc::clone(def)))? {
            return Ok(name);
        }
        self.possible_types(&name);
        self.implementors.entry(name.clone()).or_default();

        let mut interface = Interface::new(&name);
        if let Some(description) = self.type_description(def) {
            interface = interface.description(description);
        }
        for directive in self.directives(&name, DirectiveLocation::Interface, def.directives())? {
            interface = interface.directive(directive);
        }
        for parent in def.interfaces() {
            let parent_name = self.interface_type(parent)?;
            interface = interface.implement(parent_name);
        }
        for field in def.fields() {
            if field.is_private() {
                continue;
            }
            let site = Site {
                type_name: &name,
                field: field.declared_name(),
            };
            let ty = field_type(&name, field)?;
            let (type_ref, _) = self.output_ref(&ty, site)?;
            let field_name = self.names.from_field(field);
            let element = format!("{name}.{field_name}");
            let mut out = InterfaceField::new(field_name, type_ref);
            for argument in field.arguments() {
                let (value, _) = self.argument(def, field, argument)?;
                out = out.argument(value);
            }
            for directive in self.directives(&element, DirectiveLocation::FieldDefinition, field.directives())? {
                out = out.directive(directive);
            }
            if let Some(description) = self.field_description(def, field) {
                out = out.description(description);
            }
            interface = interface.field(out);
        }

        self.types.push(interface.into());
        Ok(name)
    }

    fn union_type(&mut self, union: &Arc<UnionDefinition>, site: Site<'_>) -> Result<String, SchemaError> {
        let name = self.names.from_union(union);
        if !self.claim(&name, SchemaType::Union(Arc::clone(union)))? {
            return Ok(name);
        }
        let possible = self.possible_types(&name);

        let mut out = Union::new(&name);
        if let Some(description) = (DescriptionLookup {
            description: union.explicit_description(),
            ..Default::default()
        })
        .resolve(&self.config.description_sources)
        {
            out = out.description(description);
        }
        for directive in self.directives(&name, DirectiveLocation::Union, union.directives())? {
            out = out.directive(directive);
        }

        let mut candidates = Vec::new();
        for member in union.resolved_members().map_err(|e| site.unresolved(e))? {
            let lazy = match member.strip_annotated() {
                ConcreteType::LazyRef(lazy) => Some(lazy.clone()),
                _ => None,
            };
            let member = match lazy {
                Some(lazy) => lazy.resolve_type().map_err(|e| site.unresolved(e))?,
                None => member,
            };
            let ConcreteType::Object(def) = member.strip_annotated() else {
                return Err(SchemaError::InvalidTypeForUnion {
                    union: name,
                    member: member.to_string(),
                });
            };
            let member_name = self.object_type(def)?;
            out = out.possible_type(&member_name);
            candidates.push(Candidate {
                name: member_name,
                definition: Arc::clone(def),
            });
        }
        let _ = possible.set(candidates);

        self.types.push(out.into());
        Ok(name)
    }

    /// Converts the directives applied to one element.
    fn directives(
        &mut self,
        element: &str,
        location: DirectiveLocation,
        applied: &[SchemaDirective],
    ) -> Result<Vec<Directive>, SchemaError> {
        let mut emitted = Vec::with_capacity(applied.len());
        for (index, directive) in applied.iter().enumerate() {
            let Some(definition) = directive.definition() else {
                let mut out = Directive::new(self.names.apply_naming_config(directive.name()));
                for (name, value) in directive.arguments() {
                    if let Some(value) = value.to_value() {
                        out = out.argument(self.names.apply_naming_config(name), value);
                    }
                }
                emitted.push(out);
                continue;
            };
            if !definition.allows(location) {
                return Err(SchemaError::InvalidDirectiveLocation {
                    directive: definition.name().to_owned(),
                    location: location.to_string(),
                    element: element.to_owned(),
                });
            }
            let repeated = applied[..index]
                .iter()
                .any(|earlier| earlier.definition().is_some_and(|d| Arc::ptr_eq(d, definition)));
            if repeated && !definition.is_repeatable() {
                return Err(SchemaError::DirectiveNotRepeatable {
                    directive: definition.name().to_owned(),
                    element: element.to_owned(),
                });
            }
            let invalid = |reason: String| SchemaError::InvalidDirectiveArguments {
                directive: definition.name().to_owned(),
                element: element.to_owned(),
                reason,
            };

            let (name, arguments) = self.directive_definition(definition)?;
            let mut out = Directive::new(name);
            match arguments {
                Some(arguments) => {
                    for (declared, value) in directive.arguments() {
                        let plan = arguments
                            .iter()
                            .find(|a| a.declared_name == *declared)
                            .ok_or_else(|| invalid(format!("unknown argument '{declared}'")))?;
                        if let Some(value) = plan.shape.default_value(value) {
                            out = out.argument(plan.graphql_name.as_str(), value);
                        }
                    }
                    let missing = arguments
                        .iter()
                        .find(|a| a.required && !directive.arguments().contains_key(&a.declared_name));
                    if let Some(missing) = missing {
                        return Err(invalid(format!("missing required argument '{}'", missing.declared_name)));
                    }
                }
                // Used inside its own argument types; shapes are not known yet.
                None => {
                    for (declared, value) in directive.arguments() {
                        if let Some(value) = value.to_value() {
                            out = out.argument(self.names.apply_naming_config(declared), value);
                        }
                    }
                }
            }
            emitted.push(out);
        }
        Ok(emitted)
    }

    /// Converts a directive definition on first use and renders its SDL.
    fn directive_definition(
        &mut self,
        definition: &Arc<DirectiveDefinition>,
    ) -> Result<(String, Option<Arc<[DirectiveArgumentPlan]>>), SchemaError> {
        let name = self.names.from_directive(definition);
        if let Some(entry) = self.directives.get(&name) {
            if !Arc::ptr_eq(&entry.definition, definition) {
                return Err(SchemaError::DuplicateDirective { name });
            }
            return Ok((name, entry.arguments.clone()));
        }
        trace!(name, "registering directive");
        self.directives.insert(
            name.clone(),
            DirectiveEntry {
                definition: Arc::clone(definition),
                arguments: None,
            },
        );

        let config = self.config;
        let sources = definition
            .description_source_override()
            .unwrap_or(&config.description_sources);
        let site_name = format!("@{name}");
        let mut plans = Vec::with_capacity(definition.arguments().len());
        let mut rendered = Vec::with_capacity(definition.arguments().len());
        for argument in definition.arguments() {
            let site = Site {
                type_name: &site_name,
                field: argument.name(),
            };
            let ty = argument.annotation().resolve().map_err(|e| site.unresolved(e))?;
            let (type_ref, shape) = self.input_ref(&ty, site)?;
            let graphql_name = self.names.apply_naming_config(argument.name());
            let default = argument.default_value().and_then(|data| shape.default_value(data));

            let mut line = format!("{graphql_name}: {type_ref}");
            if let Some(default) = &default {
                line.push_str(&format!(" = {default}"));
            }
            let description = DescriptionLookup {
                description: argument.explicit_description(),
                parent_directive_docstring: definition.docstring_ref(),
                child_name: Some(argument.name()),
                ..Default::default()
            }
            .resolve(sources);
            rendered.push((description, line));
            plans.push(DirectiveArgumentPlan {
                declared_name: argument.name().to_owned(),
                graphql_name,
                required: matches!(type_ref, TypeRef::NonNull(_)) && default.is_none(),
                shape,
            });
        }

        if definition.prints_definition() {
            let description = DescriptionLookup {
                description: definition.explicit_description(),
                directive_docstring: definition.docstring_ref(),
                ..Default::default()
            }
            .resolve(sources);
            self.directive_sdl
                .push(render_directive(&name, description.as_deref(), &rendered, definition));
        }
        let arguments: Arc<[DirectiveArgumentPlan]> = plans.into();
        if let Some(entry) = self.directives.get_mut(&name) {
            entry.arguments = Some(Arc::clone(&arguments));
        }
        Ok((name, Some(arguments)))
    }

    fn enum_shape(&self, def: &Arc<EnumDefinition>) -> EnumShape {
        let names = def.values().iter().map(|value| self.names.from_enum_value(value)).collect();
        EnumShape::new(Arc::clone(def), names)
    }

    fn enum_type(&mut self, def: &Arc<EnumDefinition>) -> Result<String, SchemaError> {
        let name = self.names.from_enum(def);
        if !self.claim(&name, SchemaType::Enum(Arc::clone(def)))? {
            return Ok(name);
        }

        let sources = def.description_sources().unwrap_or(&self.config.description_sources);
        let mut out = Enum::new(&name);
        let description = DescriptionLookup {
            description: def.description(),
            enum_docstring: def.docstring(),
            ..Default::default()
        }
        .resolve(sources);
        if let Some(description) = description {
            out = out.description(description);
        }
        for directive in self.directives(&name, DirectiveLocation::Enum, def.directives())? {
            out = out.directive(directive);
        }
        for value in def.values() {
            let value_name = self.names.from_enum_value(value);
            let element = format!("{name}.{value_name}");
            let mut item = EnumItem::new(value_name);
            let description = DescriptionLookup {
                description: value.explicit_description(),
                parent_enum_docstring: def.docstring(),
                child_name: Some(value.name()),
                ..Default::default()
            }
            .resolve(value.description_source_override().unwrap_or(sources));
            if let Some(description) = description {
                item = item.description(description);
            }
            if let Some(reason) = value.deprecation_reason() {
                item = item.deprecation(Some(reason));
            }
            for directive in self.directives(&element, DirectiveLocation::EnumValue, value.directives())? {
                item = item.directive(directive);
            }
            out = out.item(item);
        }

        self.types.push(out.into());
        Ok(name)
    }

    fn scalar(&mut self, scalar: &ScalarType) -> Result<Arc<ScalarDefinition>, SchemaError> {
        let def = self.scalars.resolve(scalar)?;
        if def.is_builtin() {
            return Ok(def);
        }
        let name = def.name().to_owned();
        if self.claim(&name, SchemaType::Scalar(Arc::clone(&def)))? {
            let mut out = Scalar::new(&name);
            if let Some(description) = (DescriptionLookup {
                description: def.explicit_description(),
                ..Default::default()
            })
            .resolve(&self.config.description_sources)
            {
                out = out.description(description);
            }
            if let Some(url) = def.specified_by() {
                out = out.specified_by_url(url);
            }
            if let Some(validate) = def.validator_fn() {
                out = out.validator(move |value| validate(value));
            }
            for directive in self.directives(&name, DirectiveLocation::Scalar, def.directives())? {
                out = out.directive(directive);
            }
            self.types.push(out.into());
        }
        Ok(def)
    }

    fn input_type(&mut self, def: &Arc<TypeDefinition>) -> Result<Arc<InputObjectPlan>, SchemaError> {
        self.ensure_concrete(def)?;
        let name = self.names.from_type(def);
        if !self.claim(&name, SchemaType::Input(Arc::clone(def)))? {
            return self
                .inputs
                .get(&name)
                .cloned()
                .ok_or(SchemaError::ScalarAlreadyRegistered { name });
        }
        let plan = Arc::new(InputObjectPlan::new(name.clone(), Arc::clone(def)));
        self.inputs.insert(name.clone(), Arc::clone(&plan));

        let mut object = InputObject::new(&name);
        if let Some(description) = self.type_description(def) {
            object = object.description(description);
        }
        for directive in self.directives(&name, DirectiveLocation::InputObject, def.directives())? {
            object = object.directive(directive);
        }
        let mut fields = Vec::with_capacity(def.fields().len());
        for field in def.fields() {
            if field.is_private() {
                continue;
            }
            let site = Site {
                type_name: &name,
                field: field.declared_name(),
            };
            let ty = field_type(&name, field)?;
            let (type_ref, shape) = self.input_ref(&ty, site)?;
            let graphql_name = self.names.from_field(field);

            let mut value = InputValue::new(&graphql_name, type_ref);
            if let DefaultValue::Value(data) = field.default_value() {
                if let Some(default) = shape.default_value(data) {
                    value = value.default_value(default);
                }
            }
            if let Some(description) = self.field_description(def, field) {
                value = value.description(description);
            }
            let element = format!("{name}.{graphql_name}");
            for directive in self.directives(&element, DirectiveLocation::InputFieldDefinition, field.directives())? {
                value = value.directive(directive);
            }
            object = object.field(value);
            fields.push(InputFieldPlan {
                declared_name: field.declared_name().to_owned(),
                graphql_name,
                shape,
            });
        }
        plan.set_fields(fields);

        self.types.push(object.into());
        Ok(plan)
    }
}

fn field_type(owner: &str, field: &Field) -> Result<ConcreteType, SchemaError> {
    field.field_type().map_err(|err| match (err, field.resolver_ref()) {
        (AnnotationError::Missing, Some(resolver)) => SchemaError::MissingReturnAnnotation {
            type_name: owner.to_owned(),
            field: field.declared_name().to_owned(),
            resolver: resolver.name().to_owned(),
        },
        (AnnotationError::Missing, None) => SchemaError::MissingFieldAnnotation {
            type_name: owner.to_owned(),
            field: field.declared_name().to_owned(),
        },
        (err, _) => SchemaError::unresolved(owner, field.declared_name(), err),
    })
}

/// Peels optional and annotation layers; `true` when any layer was optional.
fn unwrap_optional(ty: &ConcreteType) -> (&ConcreteType, bool) {
    let mut current = ty;
    let mut nullable = false;
    loop {
        match current {
            ConcreteType::Optional(inner) => {
                nullable = true;
                current = inner;
            }
            ConcreteType::Annotated(inner, _) => current = inner,
            _ => return (current, nullable),
        }
    }
}

fn non_null_unless(type_ref: TypeRef, nullable: bool) -> TypeRef {
    if nullable {
        type_ref
    } else {
        TypeRef::NonNull(Box::new(type_ref))
    }
}

fn strip_non_null(type_ref: TypeRef) -> TypeRef {
    match type_ref {
        TypeRef::NonNull(inner) => *inner,
        other => other,
    }
}

/// `directive @name(args) repeatable on LOCATIONS`, with block-string
/// descriptions. Arguments go on their own lines once any is described.
fn render_directive(
    name: &str,
    description: Option<&str>,
    arguments: &[(Option<String>, String)],
    definition: &DirectiveDefinition,
) -> String {
    let mut sdl = String::new();
    if let Some(description) = description {
        sdl.push_str(&block_string(description, ""));
    }
    sdl.push_str("directive @");
    sdl.push_str(name);
    if arguments.iter().any(|(description, _)| description.is_some()) {
        sdl.push_str("(\n");
        for (description, line) in arguments {
            if let Some(description) = description {
                sdl.push_str(&block_string(description, "\t"));
            }
            sdl.push('\t');
            sdl.push_str(line);
            sdl.push('\n');
        }
        sdl.push(')');
    } else if !arguments.is_empty() {
        let lines: Vec<&str> = arguments.iter().map(|(_, line)| line.as_str()).collect();
        sdl.push('(');
        sdl.push_str(&lines.join(", "));
        sdl.push(')');
    }
    if definition.is_repeatable() {
        sdl.push_str(" repeatable");
    }
    let locations: Vec<&str> = definition.locations().iter().map(|l| l.as_str()).collect();
    sdl.push_str(" on ");
    sdl.push_str(&locations.join(" | "));
    sdl.push('\n');
    sdl
}

fn block_string(text: &str, indent: &str) -> String {
    let body = text.replace("\"\"\"", "\\\"\"\"").replace('\n', &format!("\n{indent}"));
    format!("{indent}\"\"\"\n{indent}{body}\n{indent}\"\"\"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{NativeType, TypeExpr};
    use crate::naming::DefaultNameConverter;

    fn convert<T>(f: impl FnOnce(&mut SchemaConverter<'_>) -> Result<T, SchemaError>) -> Result<(T, TypeMap), SchemaError> {
        let config = SchemaConfig::default();
        let names = DefaultNameConverter::default();
        let scalars = ScalarRegistry::default();
        let mut converter = SchemaConverter::new(&config, &names, &scalars, Arc::default(), Arc::new(Data::Null));
        let value = f(&mut converter)?;
        let (_, map, _) = converter.finish();
        Ok((value, map))
    }

    #[test]
    fn test_unwrap_optional() {
        let ty = ConcreteType::Optional(Box::new(ConcreteType::Scalar(ScalarType::Native(NativeType::INT))));
        let (inner, nullable) = unwrap_optional(&ty);
        assert!(nullable);
        assert!(matches!(inner, ConcreteType::Scalar(_)));
    }

    #[test]
    fn test_recursive_type_terminates() {
        let ns = crate::annotation::Namespace::new("tree");
        let node = TypeDefinition::object("Node")
            .field(Field::new("value").ty(TypeExpr::int()))
            .field(Field::new("children").ty(TypeExpr::list(TypeExpr::forward("Node"))))
            .declare(&ns)
            .unwrap();
        let (name, map) = convert(|c| c.root(&node)).unwrap();
        assert_eq!(name, "Node");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("Node").unwrap().kind(), "object");
    }

    #[test]
    fn test_conflicting_names_are_rejected() {
        let first = TypeDefinition::object("User")
            .field(Field::new("id").ty(TypeExpr::id()))
            .build()
            .unwrap();
        let second = TypeDefinition::object("User")
            .field(Field::new("name").ty(TypeExpr::string()))
            .build()
            .unwrap();
        let err = convert(|c| {
            c.root(&first)?;
            c.root(&second)
        })
        .unwrap_err();
        assert_eq!(err, SchemaError::ScalarAlreadyRegistered { name: "User".into() });

        assert!(convert(|c| {
            c.root(&first)?;
            c.root(&first)
        })
        .is_ok());
    }

    #[test]
    fn test_builtin_scalars_are_not_emitted() {
        let point = TypeDefinition::object("Point")
            .field(Field::new("x").ty(TypeExpr::int()))
            .field(Field::new("label").ty(TypeExpr::optional(TypeExpr::string())))
            .build()
            .unwrap();
        let (_, map) = convert(|c| c.root(&point)).unwrap();
        assert!(!map.contains("Int"));
        assert!(!map.contains("String"));
    }
}
