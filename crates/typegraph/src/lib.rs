//! # typegraph
//!
//! Turns declared types, fields, enums and resolvers into an executable
//! GraphQL schema.
//!
//! Types are declared with builders and may reference each other before
//! they exist: annotations carry the [`Namespace`] they were written in and
//! are resolved only when the schema is converted. Generic definitions are
//! specialized by substitution and named after their arguments
//! (`Box[int]` becomes `IntBox`).
//!
//! ## Example
//!
//! ```ignore
//! let ns = Namespace::new("app");
//! TypeDefinition::object("Point")
//!     .field(Field::new("x").ty(TypeExpr::int()))
//!     .field(Field::new("y").ty(TypeExpr::int()))
//!     .declare(&ns)?;
//! let query = TypeDefinition::object("Query")
//!     .field(Field::from_resolver(
//!         Resolver::new("origin").returns("Point").namespace(&ns).sync(|_| origin()),
//!     )?)
//!     .declare(&ns)?;
//!
//! let schema = SchemaBuilder::new(&query).build()?;
//! let response = schema.execute("{ origin { x y } }").await;
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! auto_camel_case = true
//! description_sources = ["descriptions", "type_docstrings"]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! ```
//!
//! ## Modules
//!
//! - [`annotation`] - Type expressions, forward references and namespaces
//! - [`types`] - Resolved types and declared definitions
//! - [`field`] - Fields, arguments and resolvers
//! - [`permission`] - Per-field permission checks
//! - [`schema`] - Conversion, execution and lazy loading
//! - [`info`] - Per-call request context
//! - [`error`] - Error types

pub mod annotation;
pub mod config;
pub mod description;
pub mod directive;
pub mod docstring;
pub mod error;
pub mod field;
pub mod info;
pub mod naming;
pub mod permission;
pub mod schema;
pub mod types;
pub mod value;

pub use annotation::{Metadata, Namespace, NativeType, TypeAnnotation, TypeExpr, TypeVar};
pub use config::SchemaConfig;
pub use description::{DescriptionSource, DescriptionSources};
pub use directive::{DirectiveArgument, DirectiveDefinition, DirectiveLocation, SchemaDirective};
pub use error::{AnnotationError, ResolveError, SchemaError};
pub use field::{Argument, ArgumentOverride, DefaultValue, Field, Resolver, ResolverCall};
pub use info::{Info, ResolverStats, current_field};
pub use naming::{DefaultNameConverter, NameConverter};
pub use permission::{AsyncPermission, Permission, PermissionClass};
pub use schema::{LazySchema, Schema, SchemaBuilder};
pub use types::{ConcreteType, EnumDefinition, ScalarDefinition, TypeDefinition, UnionDefinition};
pub use value::{Data, Instance};

/// Result type for schema construction.
pub type Result<T> = std::result::Result<T, SchemaError>;
