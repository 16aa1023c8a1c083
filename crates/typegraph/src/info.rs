//! Per-call request context.
//!
//! An [`Info`] is built for every call of a non-basic field and handed to
//! permissions and, when declared, to the resolver. While a resolver runs,
//! the field it resolves is also available through [`current_field`]; the
//! value is scoped to the call and restored on every exit path, so nested
//! resolution sees its own field and the outer field again afterwards.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{self, Poll};

use async_graphql::Context;
use async_graphql::SelectionField;
use futures_util::{Stream, StreamExt};

tokio::task_local! {
    static CURRENT_FIELD: Arc<CurrentField>;
}

/// Static facts about a schema field, shared by every call.
#[derive(Debug)]
pub(crate) struct FieldMeta {
    pub(crate) parent_type: String,
    pub(crate) field_name: String,
    pub(crate) declared_name: String,
    pub(crate) return_type: String,
}

/// A field in the selection set below the current field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedField {
    pub name: String,
    pub alias: Option<String>,
    pub selections: Vec<SelectedField>,
}

impl SelectedField {
    fn from_selection(field: SelectionField<'_>) -> Self {
        Self {
            name: field.name().to_owned(),
            alias: field.alias().map(str::to_owned),
            selections: field.selection_set().map(Self::from_selection).collect(),
        }
    }
}

/// Request context for one field call.
pub struct Info<'a> {
    ctx: &'a Context<'a>,
    meta: Arc<FieldMeta>,
    selected: OnceLock<Vec<SelectedField>>,
}

impl<'a> Info<'a> {
    pub(crate) fn new(ctx: &'a Context<'a>, meta: Arc<FieldMeta>, stats: &ResolverStats) -> Self {
        stats.infos_created.fetch_add(1, Ordering::Relaxed);
        Self {
            ctx,
            meta,
            selected: OnceLock::new(),
        }
    }

    /// Public name of the field being resolved.
    pub fn field_name(&self) -> &str {
        &self.meta.field_name
    }

    /// Declared name of the field being resolved.
    pub fn declared_name(&self) -> &str {
        &self.meta.declared_name
    }

    /// Public name of the type declaring the field.
    pub fn parent_type(&self) -> &str {
        &self.meta.parent_type
    }

    /// Wire type of the field, e.g. `[String!]!`.
    pub fn return_type(&self) -> &str {
        &self.meta.return_type
    }

    pub fn alias(&self) -> Option<&str> {
        self.ctx.field().alias()
    }

    /// Response path, outermost segment first.
    pub fn path(&self) -> Vec<String> {
        self.ctx
            .path_node
            .map(|node| node.to_string_vec())
            .unwrap_or_default()
    }

    /// Sub-fields selected below this field, computed on first access.
    pub fn selected_fields(&self) -> &[SelectedField] {
        self.selected.get_or_init(|| {
            self.ctx
                .field()
                .selection_set()
                .map(SelectedField::from_selection)
                .collect()
        })
    }

    /// Request or schema data registered with the execution engine.
    pub fn context<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.ctx.data_opt::<T>()
    }

    fn current(&self) -> Arc<CurrentField> {
        Arc::new(CurrentField {
            field_name: self.meta.field_name.clone(),
            declared_name: self.meta.declared_name.clone(),
            path: self.path(),
        })
    }

    /// Runs `f` with this call installed as the current field.
    pub(crate) fn sync_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        CURRENT_FIELD.sync_scope(self.current(), f)
    }

    /// Runs `fut` with this call installed as the current field.
    pub(crate) async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_FIELD.scope(self.current(), fut).await
    }

    /// Wraps `stream` so each poll runs with this call installed as the
    /// current field. The wrapper outlives the `Info` it was made from.
    pub(crate) fn scope_stream<S: Stream + Unpin>(&self, stream: S) -> ScopedStream<S> {
        ScopedStream {
            current: self.current(),
            inner: stream,
        }
    }
}

/// A stream polled under a fixed current field.
pub(crate) struct ScopedStream<S> {
    current: Arc<CurrentField>,
    inner: S,
}

impl<S: Stream + Unpin> Stream for ScopedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Option<S::Item>> {
        let this = self.get_mut();
        CURRENT_FIELD.sync_scope(Arc::clone(&this.current), || this.inner.poll_next_unpin(cx))
    }
}

impl fmt::Debug for Info<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Info")
            .field("parent_type", &self.meta.parent_type)
            .field("field_name", &self.meta.field_name)
            .field("return_type", &self.meta.return_type)
            .finish_non_exhaustive()
    }
}

/// The field whose resolver is currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentField {
    pub field_name: String,
    pub declared_name: String,
    pub path: Vec<String>,
}

/// The field being resolved by the innermost running resolver, if any.
pub fn current_field() -> Option<Arc<CurrentField>> {
    CURRENT_FIELD.try_with(Arc::clone).ok()
}

/// Counters for one schema.
#[derive(Debug, Default)]
pub struct ResolverStats {
    infos_created: AtomicU64,
    resolver_calls: AtomicU64,
    permission_denials: AtomicU64,
}

impl ResolverStats {
    /// Number of [`Info`] values constructed. Basic fields never build one.
    pub fn infos_created(&self) -> u64 {
        self.infos_created.load(Ordering::Relaxed)
    }

    pub fn resolver_calls(&self) -> u64 {
        self.resolver_calls.load(Ordering::Relaxed)
    }

    pub fn permission_denials(&self) -> u64 {
        self.permission_denials.load(Ordering::Relaxed)
    }

    pub(crate) fn record_call(&self) {
        self.resolver_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_denial(&self) {
        self.permission_denials.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str) -> Arc<CurrentField> {
        Arc::new(CurrentField {
            field_name: name.to_owned(),
            declared_name: name.to_owned(),
            path: vec![name.to_owned()],
        })
    }

    #[test]
    fn test_no_current_field_outside_resolvers() {
        assert!(current_field().is_none());
    }

    #[test]
    fn test_sync_scope_nests_and_restores() {
        CURRENT_FIELD.sync_scope(field("outer"), || {
            assert_eq!(current_field().unwrap().field_name, "outer");
            CURRENT_FIELD.sync_scope(field("inner"), || {
                assert_eq!(current_field().unwrap().field_name, "inner");
            });
            assert_eq!(current_field().unwrap().field_name, "outer");
        });
        assert!(current_field().is_none());
    }

    #[tokio::test]
    async fn test_async_scope_restored_after_error() {
        let result: Result<(), &str> = CURRENT_FIELD
            .scope(field("outer"), async {
                let inner: Result<(), &str> = CURRENT_FIELD
                    .scope(field("inner"), async {
                        tokio::task::yield_now().await;
                        assert_eq!(current_field().unwrap().field_name, "inner");
                        Err("boom")
                    })
                    .await;
                assert!(inner.is_err());
                assert_eq!(current_field().unwrap().field_name, "outer");
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert!(current_field().is_none());
    }

    #[test]
    fn test_stats_counters() {
        let stats = ResolverStats::default();
        stats.record_call();
        stats.record_call();
        stats.record_denial();
        assert_eq!(stats.resolver_calls(), 2);
        assert_eq!(stats.permission_denials(), 1);
        assert_eq!(stats.infos_created(), 0);
    }
}
