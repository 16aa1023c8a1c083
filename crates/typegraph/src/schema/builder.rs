//! Schema builder.
//!
//! `SchemaBuilder` collects the root definitions, configuration and
//! extension points, and converts them into an executable [`Schema`] using
//! async-graphql's dynamic schema API.

use std::any::Any;
use std::sync::Arc;

use async_graphql::dynamic;
use tracing::{debug, info};

use super::Schema;
use super::converter::SchemaConverter;
use crate::annotation::{NativeType, TypeAnnotation, TypeExpr};
use crate::config::SchemaConfig;
use crate::error::SchemaError;
use crate::info::ResolverStats;
use crate::naming::{DefaultNameConverter, NameConverter};
use crate::types::{ScalarDefinition, ScalarRegistry, TypeDefinition};
use crate::value::Data;

type DataHook = Arc<dyn Fn(dynamic::SchemaBuilder) -> dynamic::SchemaBuilder + Send + Sync>;

/// Builds a [`Schema`] from declared root types.
///
/// # Example
///
/// ```ignore
/// let schema = SchemaBuilder::new(&query)
///     .mutation(&mutation)
///     .config(SchemaConfig::from_toml(source)?)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct SchemaBuilder {
    query: Arc<TypeDefinition>,
    mutation: Option<Arc<TypeDefinition>>,
    subscription: Option<Arc<TypeDefinition>>,
    config: SchemaConfig,
    name_converter: Option<Arc<dyn NameConverter>>,
    scalars: ScalarRegistry,
    extra_types: Vec<TypeAnnotation>,
    root_value: Data,
    data: Vec<DataHook>,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new(query: &Arc<TypeDefinition>) -> Self {
        Self {
            query: Arc::clone(query),
            mutation: None,
            subscription: None,
            config: SchemaConfig::default(),
            name_converter: None,
            scalars: ScalarRegistry::default(),
            extra_types: Vec::new(),
            root_value: Data::Null,
            data: Vec::new(),
        }
    }

    #[must_use]
    pub fn mutation(mut self, mutation: &Arc<TypeDefinition>) -> Self {
        self.mutation = Some(Arc::clone(mutation));
        self
    }

    /// Subscription root; every field needs a stream resolver.
    #[must_use]
    pub fn subscription(mut self, subscription: &Arc<TypeDefinition>) -> Self {
        self.subscription = Some(Arc::clone(subscription));
        self
    }

    #[must_use]
    pub fn config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the naming policy. Without one, [`DefaultNameConverter`] is
    /// used with the configured `auto_camel_case`.
    #[must_use]
    pub fn name_converter(mut self, converter: impl NameConverter + 'static) -> Self {
        self.name_converter = Some(Arc::new(converter));
        self
    }

    /// Maps a native type to a custom scalar, e.g. `datetime` to `DateTime`.
    #[must_use]
    pub fn scalar_override(mut self, native: NativeType, definition: ScalarDefinition) -> Self {
        self.scalars.register(native, Arc::new(definition));
        self
    }

    /// Adds a type that is not reachable from the roots, such as an
    /// interface implementor only returned through the interface.
    #[must_use]
    pub fn register_type(mut self, ty: impl Into<TypeExpr>) -> Self {
        self.extra_types.push(TypeAnnotation::new(ty));
        self
    }

    /// Parent value of query and mutation root fields.
    #[must_use]
    pub fn root_value(mut self, value: impl Into<Data>) -> Self {
        self.root_value = value.into();
        self
    }

    /// Schema data reachable from resolvers through [`Info::context`](crate::info::Info::context).
    #[must_use]
    pub fn data<D: Any + Clone + Send + Sync>(mut self, data: D) -> Self {
        self.data.push(Arc::new(move |builder| builder.data(data.clone())));
        self
    }

    /// Converts every reachable definition and assembles the schema.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`] aborts the build; no partial schema is returned.
    pub fn build(&self) -> Result<Schema, SchemaError> {
        self.config.validate()?;
        debug!(root = self.query.name(), "building schema");

        let default_names;
        let names: &dyn NameConverter = match &self.name_converter {
            Some(converter) => converter.as_ref(),
            None => {
                default_names = DefaultNameConverter::new(self.config.auto_camel_case);
                &default_names
            }
        };
        let stats = Arc::new(ResolverStats::default());
        let mut converter = SchemaConverter::new(
            &self.config,
            names,
            &self.scalars,
            Arc::clone(&stats),
            Arc::new(self.root_value.clone()),
        );

        let query = converter.root(&self.query)?;
        let mutation = self.mutation.as_ref().map(|def| converter.root(def)).transpose()?;
        let subscription = self
            .subscription
            .as_ref()
            .map(|def| converter.subscription_root(def))
            .transpose()?;
        for extra in &self.extra_types {
            let ty = extra
                .resolve()
                .map_err(|e| SchemaError::unresolved("Schema", "types", e))?;
            converter.register(&ty)?;
        }
        let (types, type_map, directive_sdl) = converter.finish();
        let type_count = types.len();

        let mut builder = dynamic::Schema::build(&query, mutation.as_deref(), subscription.as_deref());
        for ty in types {
            builder = builder.register(ty);
        }
        for hook in &self.data {
            builder = hook(builder);
        }
        builder = builder
            .limit_depth(self.config.max_depth)
            .limit_complexity(self.config.max_complexity);
        if !self.config.introspection {
            builder = builder.disable_introspection();
        }

        let inner = builder.finish().map_err(|e| SchemaError::Engine(e.to_string()))?;
        info!(types = type_count, query = %query, "schema built");
        Ok(Schema {
            inner,
            type_map: Arc::new(type_map),
            directive_sdl: directive_sdl.into(),
            stats,
        })
    }
}
