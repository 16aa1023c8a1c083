//! Error types for schema construction and field resolution.
//!
//! Three layers of errors exist:
//!
//! - [`AnnotationError`] is produced while resolving a single type
//!   annotation and knows nothing about where the annotation lives.
//! - [`SchemaError`] is fatal at declaration or schema-build time. Any
//!   `SchemaError` aborts schema construction; no partial schema is produced.
//! - [`ResolveError`] is raised while resolving one field of one request and
//!   is surfaced to the execution engine as a field error carrying a `code`
//!   extension.

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Errors raised while resolving a type annotation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnotationError {
    /// A forward reference names something the namespace does not contain.
    #[error("name '{name}' is not defined")]
    UnknownName {
        /// The unresolved name.
        name: String,
    },

    /// A forward reference could not be parsed.
    #[error("invalid type expression '{expression}': {reason}")]
    Syntax {
        /// The raw expression text.
        expression: String,
        /// What went wrong.
        reason: String,
    },

    /// A forward reference was used without a namespace to evaluate it in.
    #[error("forward reference '{reference}' has no namespace to resolve against")]
    NoNamespace {
        /// The raw reference text.
        reference: String,
    },

    /// Type arguments were applied to something that is not a generic type.
    #[error("type '{name}' is not generic")]
    NotGeneric {
        /// Name of the non-generic type.
        name: String,
    },

    /// Wrong number of type arguments for a generic type.
    #[error("type '{name}' expects {expected} type argument(s), got {found}")]
    GenericArity {
        /// Name of the generic type.
        name: String,
        /// Number of declared type parameters.
        expected: usize,
        /// Number of supplied arguments.
        found: usize,
    },

    /// The annotation has no schema representation.
    #[error("unsupported type annotation: {description}")]
    Unsupported {
        /// Human readable rendering of the annotation.
        description: String,
    },

    /// A field or argument has no annotation at all.
    #[error("no type annotation")]
    Missing,
}

/// Errors that abort declaration or schema construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A field without a resolver has no type annotation.
    #[error("unable to determine the type of field '{field}' on '{type_name}': missing type annotation")]
    MissingFieldAnnotation {
        /// Declaring type.
        type_name: String,
        /// Offending field.
        field: String,
    },

    /// A field relies on its resolver's return annotation, which is missing.
    #[error("return annotation missing for resolver '{resolver}' of field '{field}' on '{type_name}'")]
    MissingReturnAnnotation {
        /// Declaring type.
        type_name: String,
        /// Offending field.
        field: String,
        /// Resolver name.
        resolver: String,
    },

    /// A field was declared without any name.
    #[error("field on '{type_name}' has neither a name nor a resolver to infer one from")]
    MissingFieldName {
        /// Declaring type.
        type_name: String,
    },

    /// A field with a resolver also declared a default value.
    #[error("field '{field}' on '{type_name}' cannot define both a resolver and a default value")]
    FieldWithResolverAndDefault {
        /// Declaring type.
        type_name: String,
        /// Offending field.
        field: String,
    },

    /// A generic type reached a schema position without being specialized.
    #[error("'{type_name}' is generic, but no concrete type(s) were passed for {params:?}")]
    MissingTypesForGeneric {
        /// Generic type name.
        type_name: String,
        /// Unbound type parameters.
        params: Vec<String>,
    },

    /// A field's type annotation could not be resolved.
    #[error("could not resolve the type of field '{field}' on '{type_name}': {source}")]
    UnresolvedFieldType {
        /// Declaring type.
        type_name: String,
        /// Offending field or argument.
        field: String,
        /// Underlying resolution failure.
        #[source]
        source: AnnotationError,
    },

    /// More than one argument override was attached to a single argument.
    #[error("argument '{argument}' cannot have multiple argument annotations")]
    MultipleArgumentAnnotations {
        /// Offending argument.
        argument: String,
    },

    /// Two distinct definitions claim the same schema name.
    #[error("type '{name}' is already registered with a different definition")]
    ScalarAlreadyRegistered {
        /// Conflicting schema name.
        name: String,
    },

    /// A union member is not an object type.
    #[error("type '{member}' cannot be used in union '{union}': only object types are allowed")]
    InvalidTypeForUnion {
        /// Union name.
        union: String,
        /// Offending member.
        member: String,
    },

    /// An argument uses a shape that cannot be an input.
    #[error("argument '{argument}' on field '{field}' cannot be of type {kind}")]
    InvalidFieldArgument {
        /// Field or resolver name.
        field: String,
        /// Offending argument.
        argument: String,
        /// The disallowed kind, e.g. "union" or "interface".
        kind: String,
    },

    /// No classification rule matched the type.
    #[error("unsupported type '{type_name}'")]
    UnsupportedType {
        /// Rendering of the offending type.
        type_name: String,
    },

    /// A default factory failed while the field was being constructed.
    #[error("default factory for field '{field}' failed: {reason}")]
    InvalidDefaultFactory {
        /// Field name.
        field: String,
        /// Factory failure message.
        reason: String,
    },

    /// A resolver's parameter list cannot be bound.
    #[error("invalid signature for resolver '{resolver}': {reason}")]
    InvalidResolverSignature {
        /// Resolver name.
        resolver: String,
        /// Why binding failed.
        reason: String,
    },

    /// Constructor called with bad keyword values.
    #[error("cannot instantiate '{type_name}': {reason}")]
    InvalidConstructorArguments {
        /// Type being instantiated.
        type_name: String,
        /// Why construction failed.
        reason: String,
    },

    /// A directive was applied where its definition does not allow it.
    #[error("directive '@{directive}' cannot be applied to {location} '{element}'")]
    InvalidDirectiveLocation {
        /// Directive name.
        directive: String,
        /// Location of the offending use.
        location: String,
        /// Element the directive was applied to.
        element: String,
    },

    /// A non-repeatable directive was applied twice to one element.
    #[error("directive '@{directive}' is not repeatable but is applied more than once to '{element}'")]
    DirectiveNotRepeatable {
        /// Directive name.
        directive: String,
        /// Element the directive was applied to.
        element: String,
    },

    /// A directive use does not match the arguments its definition declares.
    #[error("invalid use of directive '@{directive}' on '{element}': {reason}")]
    InvalidDirectiveArguments {
        /// Directive name.
        directive: String,
        /// Element the directive was applied to.
        element: String,
        /// What was wrong.
        reason: String,
    },

    /// Two distinct directive definitions share a name.
    #[error("directive '@{name}' is already defined by a different definition")]
    DuplicateDirective {
        /// Conflicting directive name.
        name: String,
    },

    /// Configuration values are invalid.
    #[error("invalid schema configuration: {0}")]
    InvalidConfig(String),

    /// The execution engine rejected the assembled schema.
    #[error("execution engine rejected the schema: {0}")]
    Engine(String),

    /// A lazily built schema is being built by another caller.
    #[error("schema is being built, retry later")]
    Initializing,
}

impl SchemaError {
    /// Wraps an annotation failure with the location it happened at.
    pub(crate) fn unresolved(
        type_name: impl Into<String>,
        field: impl Into<String>,
        source: AnnotationError,
    ) -> Self {
        Self::UnresolvedFieldType {
            type_name: type_name.into(),
            field: field.into(),
            source,
        }
    }
}

/// Errors raised while resolving a single field of a request.
///
/// These never abort the request: the execution engine reports them in the
/// `errors` list and nulls the failing field.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// A permission requirement rejected the call.
    #[error("{message}")]
    AccessDenied {
        /// Message supplied by the permission.
        message: String,
    },

    /// Input named a value the enum does not declare.
    #[error("value '{value}' does not exist in enum '{enum_name}'")]
    UnknownEnumValue {
        /// Enum name.
        enum_name: String,
        /// Unknown identifier.
        value: String,
    },

    /// No member of an abstract type matched the runtime value.
    #[error("unable to determine the concrete type of a '{type_name}' value")]
    UnresolvableUnionMember {
        /// Union or interface name.
        type_name: String,
    },

    /// More than one member of an abstract type matched the runtime value.
    #[error("value of '{type_name}' matches several member types: {candidates:?}")]
    AmbiguousUnionMember {
        /// Union or interface name.
        type_name: String,
        /// Matching member names.
        candidates: Vec<String>,
    },

    /// An input value could not be converted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A resolved value does not fit the declared output type.
    #[error("cannot serialize value as {type_name}: {reason}")]
    Serialization {
        /// Expected output type.
        type_name: String,
        /// What was wrong.
        reason: String,
    },

    /// Raised by application code inside a resolver.
    #[error("{0}")]
    Resolver(String),
}

impl ResolveError {
    /// Convenience constructor for resolver failures.
    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver(message.into())
    }

    /// Returns the error code placed in GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::UnknownEnumValue { .. } => "UNKNOWN_ENUM_VALUE",
            Self::UnresolvableUnionMember { .. } => "UNRESOLVABLE_UNION_MEMBER",
            Self::AmbiguousUnionMember { .. } => "AMBIGUOUS_UNION_MEMBER",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Serialization { .. } => "SERIALIZATION",
            Self::Resolver(_) => "RESOLVER_ERROR",
        }
    }
}

impl ErrorExtensions for ResolveError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", self.error_code());
        })
    }
}
