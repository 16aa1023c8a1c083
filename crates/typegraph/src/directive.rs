//! Schema directives.
//!
//! A [`DirectiveDefinition`] declares a directive: where it may appear, its
//! typed arguments and whether it repeats. A [`SchemaDirective`] is one use
//! of a directive on a type, field, argument or enum value. Uses are emitted
//! with the element they are attached to; definitions of the directives in
//! use are rendered at the top of [`Schema::sdl`](crate::Schema::sdl).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::annotation::{Namespace, TypeAnnotation, TypeExpr};
use crate::description::DescriptionSources;
use crate::docstring::Docstring;
use crate::value::Data;

/// A place in the type system a directive can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveLocation {
    Schema,
    Scalar,
    Object,
    FieldDefinition,
    ArgumentDefinition,
    Interface,
    Union,
    Enum,
    EnumValue,
    InputObject,
    InputFieldDefinition,
}

impl DirectiveLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "SCHEMA",
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::FieldDefinition => "FIELD_DEFINITION",
            Self::ArgumentDefinition => "ARGUMENT_DEFINITION",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::EnumValue => "ENUM_VALUE",
            Self::InputObject => "INPUT_OBJECT",
            Self::InputFieldDefinition => "INPUT_FIELD_DEFINITION",
        }
    }
}

impl fmt::Display for DirectiveLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed argument of a directive definition.
#[derive(Debug, Clone)]
pub struct DirectiveArgument {
    name: String,
    annotation: TypeAnnotation,
    default: Option<Data>,
    description: Option<String>,
}

impl DirectiveArgument {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeExpr>) -> Self {
        Self {
            name: name.into(),
            annotation: TypeAnnotation::new(ty),
            default: None,
            description: None,
        }
    }

    /// An argument whose type may name declarations in `namespace`.
    pub fn with_namespace(name: impl Into<String>, ty: impl Into<TypeExpr>, namespace: &Namespace) -> Self {
        Self {
            name: name.into(),
            annotation: TypeAnnotation::with_namespace(ty, namespace),
            default: None,
            description: None,
        }
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<Data>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> &TypeAnnotation {
        &self.annotation
    }

    pub fn default_value(&self) -> Option<&Data> {
        self.default.as_ref()
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Declaration of a schema directive.
///
/// # Example
///
/// ```ignore
/// let cache = DirectiveDefinition::new("cacheControl", [DirectiveLocation::Object])
///     .argument(DirectiveArgument::new("max_age", TypeExpr::int()))
///     .build();
/// let query = TypeDefinition::object("Query")
///     .directive(SchemaDirective::of(&cache).argument("max_age", 30))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectiveDefinition {
    name: String,
    locations: Vec<DirectiveLocation>,
    arguments: Vec<DirectiveArgument>,
    repeatable: bool,
    print_definition: bool,
    description: Option<String>,
    docstring: Option<Docstring>,
    description_sources: Option<DescriptionSources>,
}

impl DirectiveDefinition {
    pub fn new(name: impl Into<String>, locations: impl IntoIterator<Item = DirectiveLocation>) -> Self {
        Self {
            name: name.into(),
            locations: locations.into_iter().collect(),
            arguments: Vec::new(),
            repeatable: false,
            print_definition: true,
            description: None,
            docstring: None,
            description_sources: None,
        }
    }

    #[must_use]
    pub fn argument(mut self, argument: DirectiveArgument) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Allows several uses on the same element.
    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    /// Keeps the definition out of the rendered SDL, for directives the
    /// consumer already knows about.
    #[must_use]
    pub fn hide_definition(mut self) -> Self {
        self.print_definition = false;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Docstring whose entries describe the arguments.
    #[must_use]
    pub fn docstring(mut self, docstring: impl Into<Docstring>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    #[must_use]
    pub fn description_sources(mut self, sources: DescriptionSources) -> Self {
        self.description_sources = Some(sources);
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locations(&self) -> &[DirectiveLocation] {
        &self.locations
    }

    pub fn allows(&self, location: DirectiveLocation) -> bool {
        self.locations.contains(&location)
    }

    pub fn arguments(&self) -> &[DirectiveArgument] {
        &self.arguments
    }

    pub fn argument_named(&self, name: &str) -> Option<&DirectiveArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn prints_definition(&self) -> bool {
        self.print_definition
    }

    pub fn explicit_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn docstring_ref(&self) -> Option<&Docstring> {
        self.docstring.as_ref()
    }

    pub fn description_source_override(&self) -> Option<&DescriptionSources> {
        self.description_sources.as_ref()
    }
}

/// A directive applied to a schema element, e.g. `@tag(name: "x")`.
///
/// Uses built with [`SchemaDirective::new`] are emitted as written. Uses
/// built with [`SchemaDirective::of`] are checked against their definition
/// when the schema is built.
#[derive(Debug, Clone)]
pub struct SchemaDirective {
    name: String,
    arguments: IndexMap<String, Data>,
    definition: Option<Arc<DirectiveDefinition>>,
}

impl SchemaDirective {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: IndexMap::new(),
            definition: None,
        }
    }

    pub fn of(definition: &Arc<DirectiveDefinition>) -> Self {
        Self {
            name: definition.name.clone(),
            arguments: IndexMap::new(),
            definition: Some(Arc::clone(definition)),
        }
    }

    #[must_use]
    pub fn argument(mut self, name: impl Into<String>, value: impl Into<Data>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &IndexMap<String, Data> {
        &self.arguments
    }

    pub fn definition(&self) -> Option<&Arc<DirectiveDefinition>> {
        self.definition.as_ref()
    }
}

impl PartialEq for SchemaDirective {
    fn eq(&self, other: &Self) -> bool {
        let same_definition = match (&self.definition, &other.definition) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.name == other.name && self.arguments == other.arguments && same_definition
    }
}
