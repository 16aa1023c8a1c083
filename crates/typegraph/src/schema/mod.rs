//! Schema construction and execution.
//!
//! ## Components
//!
//! - [`SchemaBuilder`] - collects roots and options, runs the conversion
//! - [`Schema`] - the executable schema with its type map and counters
//! - [`LazySchema`] - builds on first use, supports rebuilds
//!
//! ## Architecture
//!
//! Conversion walks the definitions reachable from the roots once and emits
//! engine types. Each field gets an execution plan with its output and
//! argument conversions precomputed, so request-time resolution does no type
//! dispatch beyond what the plan records.

mod arguments;
mod builder;
mod converter;
mod invoke;
mod lazy;
mod output;

use std::sync::Arc;

use async_graphql::Response;
use async_graphql::dynamic::{self, DynamicRequest};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

pub use builder::SchemaBuilder;
pub use converter::{SchemaType, TypeMap};
pub use lazy::{LazySchema, SchemaState};

use crate::info::ResolverStats;

/// An executable schema.
#[derive(Clone)]
pub struct Schema {
    inner: dynamic::Schema,
    type_map: Arc<TypeMap>,
    directive_sdl: Arc<str>,
    stats: Arc<ResolverStats>,
}

impl Schema {
    pub async fn execute(&self, request: impl Into<DynamicRequest>) -> Response {
        self.inner.execute(request).await
    }

    /// Executes a subscription, yielding one response per event.
    pub fn execute_stream(&self, request: impl Into<DynamicRequest>) -> BoxStream<'static, Response> {
        self.inner.execute_stream(request.into()).boxed()
    }

    /// Schema definition language rendering, led by the definitions of the
    /// schema directives in use.
    pub fn sdl(&self) -> String {
        if self.directive_sdl.is_empty() {
            return self.inner.sdl();
        }
        format!("{}\n{}", self.directive_sdl, self.inner.sdl())
    }

    /// Emitted schema names and the definitions behind them.
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    pub fn stats(&self) -> &ResolverStats {
        &self.stats
    }

    /// The underlying engine schema, e.g. for mounting in an HTTP server.
    pub fn engine(&self) -> &dynamic::Schema {
        &self.inner
    }
}
