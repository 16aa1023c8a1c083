//! Lazy schema loading.
//!
//! `LazySchema` defers conversion until the schema is first needed and keeps
//! the result until it is invalidated, e.g. after declarations were added to
//! a namespace.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::{Schema, SchemaBuilder};
use crate::error::SchemaError;

/// State of the lazy schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Uninitialized,
    Building,
    Ready,
    Failed,
}

/// Thread-safe lazy schema holder.
///
/// # Example
///
/// ```ignore
/// let lazy = LazySchema::new(SchemaBuilder::new(&query));
///
/// // First access triggers the build
/// let schema = lazy.get_or_build_wait().await?;
///
/// // Force a rebuild on next access
/// lazy.invalidate().await;
/// ```
pub struct LazySchema {
    schema: RwLock<Option<Arc<Schema>>>,
    /// Serialises builds.
    build_lock: Mutex<()>,
    state: RwLock<SchemaState>,
    builder: Arc<SchemaBuilder>,
    last_error: RwLock<Option<SchemaError>>,
}

impl LazySchema {
    #[must_use]
    pub fn new(builder: SchemaBuilder) -> Self {
        Self {
            schema: RwLock::new(None),
            build_lock: Mutex::new(()),
            state: RwLock::new(SchemaState::Uninitialized),
            builder: Arc::new(builder),
            last_error: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> SchemaState {
        *self.state.read().await
    }

    /// Gets the schema, building it if necessary. Does not wait for a build
    /// started by another caller.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Initializing`] while another build is in progress, or
    /// the build failure.
    pub async fn get_or_build(&self) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        if *self.state.read().await == SchemaState::Building {
            return Err(SchemaError::Initializing);
        }
        let Ok(_guard) = self.build_lock.try_lock() else {
            return Err(SchemaError::Initializing);
        };
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        self.build().await
    }

    /// Gets the schema, waiting for an in-progress build instead of failing.
    /// A previous failure is returned again until [`invalidate`](Self::invalidate).
    ///
    /// # Errors
    ///
    /// The build failure.
    pub async fn get_or_build_wait(&self) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        let _guard = self.build_lock.lock().await;
        if let Some(schema) = self.get().await {
            return Ok(schema);
        }
        if *self.state.read().await == SchemaState::Failed {
            if let Some(err) = self.last_error.read().await.clone() {
                return Err(err);
            }
        }
        self.build().await
    }

    /// Must be called with the build lock held.
    async fn build(&self) -> Result<Arc<Schema>, SchemaError> {
        *self.state.write().await = SchemaState::Building;
        info!("building schema");

        match self.builder.build() {
            Ok(schema) => {
                let schema = Arc::new(schema);
                *self.schema.write().await = Some(Arc::clone(&schema));
                *self.state.write().await = SchemaState::Ready;
                *self.last_error.write().await = None;
                info!(types = schema.type_map().len(), "schema ready");
                Ok(schema)
            }
            Err(err) => {
                warn!(error = %err, "failed to build schema");
                *self.state.write().await = SchemaState::Failed;
                *self.last_error.write().await = Some(err.clone());
                Err(err)
            }
        }
    }

    /// The schema if it is already built.
    pub async fn get(&self) -> Option<Arc<Schema>> {
        self.schema.read().await.clone()
    }

    /// Drops the cached schema; the next access rebuilds it.
    pub async fn invalidate(&self) {
        let _guard = self.build_lock.lock().await;

        *self.schema.write().await = None;
        *self.state.write().await = SchemaState::Uninitialized;
        *self.last_error.write().await = None;

        info!("schema invalidated, will rebuild on next access");
    }

    pub async fn last_error(&self) -> Option<SchemaError> {
        self.last_error.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        *self.state.read().await == SchemaState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::TypeExpr;
    use crate::field::Field;
    use crate::types::TypeDefinition;

    fn lazy(query: &Arc<TypeDefinition>) -> LazySchema {
        LazySchema::new(SchemaBuilder::new(query))
    }

    #[tokio::test]
    async fn test_builds_once_and_caches() {
        let query = TypeDefinition::object("Query")
            .field(Field::new("ok").ty(TypeExpr::boolean()))
            .build()
            .unwrap();
        let lazy = lazy(&query);
        assert_eq!(lazy.state().await, SchemaState::Uninitialized);
        assert!(lazy.get().await.is_none());

        let first = lazy.get_or_build().await.unwrap();
        let second = lazy.get_or_build_wait().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(lazy.is_ready().await);

        lazy.invalidate().await;
        assert_eq!(lazy.state().await, SchemaState::Uninitialized);
        let rebuilt = lazy.get_or_build().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
    }

    #[tokio::test]
    async fn test_failure_is_remembered() {
        let t = crate::annotation::TypeVar::new("T");
        let generic = TypeDefinition::object("Query")
            .field(Field::new("value").ty(&t))
            .build()
            .unwrap();
        let lazy = lazy(&generic);

        let err = lazy.get_or_build().await.err().unwrap();
        assert!(matches!(err, SchemaError::MissingTypesForGeneric { .. }));
        assert_eq!(lazy.state().await, SchemaState::Failed);
        assert_eq!(lazy.last_error().await, Some(err.clone()));
        assert_eq!(lazy.get_or_build_wait().await.err(), Some(err));
    }
}
