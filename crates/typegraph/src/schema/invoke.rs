//! Field execution.
//!
//! Every schema field owns a [`FieldPlan`] computed at conversion time. A call
//! takes one of three paths:
//!
//! - basic fields (no resolver, no permissions) read the attribute of the
//!   parent value without building an [`Info`];
//! - fields whose resolver and permissions are all synchronous complete
//!   without suspending;
//! - anything else runs as a future.

use std::borrow::Cow;
use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, FieldValue, ObjectAccessor, ResolverContext, SubscriptionFieldFuture};
use async_graphql::{Context, ErrorExtensions};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use indexmap::IndexMap;
use tracing::debug;

use super::arguments::ArgumentPlan;
use super::output::OutputShape;
use crate::error::ResolveError;
use crate::field::{ParamRole, Resolver, ResolverCall, ResolverKind, ResolveResult};
use crate::info::{FieldMeta, Info, ResolverStats};
use crate::permission::{PermissionClass, PermissionInstance};
use crate::value::Data;

pub(crate) struct FieldPlan {
    pub(crate) meta: Arc<FieldMeta>,
    pub(crate) output: OutputShape,
    /// Errors on nullable fields resolve to null and are reported with the field path.
    pub(crate) nullable: bool,
    pub(crate) arguments: Vec<ArgumentPlan>,
    pub(crate) resolver: Option<Arc<Resolver>>,
    pub(crate) signature: Vec<ParamRole>,
    pub(crate) permissions: Vec<PermissionClass>,
    /// Parent of root fields.
    pub(crate) root_value: Arc<Data>,
    pub(crate) stats: Arc<ResolverStats>,
}

impl FieldPlan {
    pub(crate) fn is_basic(&self) -> bool {
        self.resolver.is_none() && self.permissions.is_empty()
    }

    fn suspends(&self) -> bool {
        self.resolver.as_ref().is_some_and(|r| r.is_async())
            || self.permissions.iter().any(PermissionClass::is_async)
    }

    pub(crate) fn resolve<'a>(self: &Arc<Self>, ctx: ResolverContext<'a>) -> FieldFuture<'a> {
        let ResolverContext {
            ctx,
            args,
            parent_value,
        } = ctx;
        let parent = parent_value.downcast_ref::<Data>();

        if self.is_basic() {
            return self.ready(ctx, self.read_basic(parent));
        }
        if !self.suspends() {
            return self.ready(ctx, self.call_sync(ctx, &args, parent));
        }

        let plan = Arc::clone(self);
        FieldFuture::new(async move {
            let result = plan.call_async(ctx, &args, parent).await;
            plan.settle(ctx, result)
        })
    }

    fn ready<'a>(
        &self,
        ctx: &'a Context<'a>,
        result: Result<Option<FieldValue<'a>>, ResolveError>,
    ) -> FieldFuture<'a> {
        match self.settle(ctx, result) {
            Ok(value) => FieldFuture::Value(value),
            Err(err) => FieldFuture::new(async move { Err::<Option<FieldValue<'a>>, _>(err) }),
        }
    }

    /// Turns a failure of a nullable field into `null` plus a located error.
    /// Non-null failures propagate to the parent.
    fn settle<'a>(
        &self,
        ctx: &'a Context<'a>,
        result: Result<Option<FieldValue<'a>>, ResolveError>,
    ) -> async_graphql::Result<Option<FieldValue<'a>>> {
        match result {
            Ok(value) => Ok(value),
            Err(err) if self.nullable => {
                let err = err.extend().into_server_error(ctx.item.pos);
                ctx.add_error(ctx.set_error_path(err));
                Ok(None)
            }
            Err(err) => Err(err.extend()),
        }
    }

    fn read_basic<'a>(&self, parent: Option<&'a Data>) -> Result<Option<FieldValue<'a>>, ResolveError> {
        let name = &self.meta.declared_name;
        match parent {
            Some(source) => match source.attribute(name) {
                Some(value) => self.output.output(Cow::Borrowed(value)),
                None => Ok(None),
            },
            None => match self.root_value.attribute(name) {
                Some(value) => self.output.output(Cow::Owned(value.clone())),
                None => Ok(None),
            },
        }
    }

    fn arguments(&self, args: &ObjectAccessor<'_>) -> Result<Vec<Data>, ResolveError> {
        self.arguments.iter().map(|arg| arg.value(args)).collect()
    }

    fn kwargs(&self, values: &[Data]) -> IndexMap<String, Data> {
        self.arguments
            .iter()
            .zip(values)
            .map(|(arg, value)| (arg.declared_name.clone(), value.clone()))
            .collect()
    }

    fn denied(&self, class: &PermissionClass, instance: &PermissionInstance) -> ResolveError {
        self.stats.record_denial();
        debug!(
            parent = %self.meta.parent_type,
            field = %self.meta.field_name,
            permission = class.type_name(),
            "permission denied"
        );
        ResolveError::AccessDenied {
            message: instance.message(),
        }
    }

    fn check_sync(&self, source: &Data, info: &Info<'_>, values: &[Data]) -> Result<(), ResolveError> {
        if self.permissions.is_empty() {
            return Ok(());
        }
        let kwargs = self.kwargs(values);
        for class in &self.permissions {
            let instance = class.instantiate();
            let allowed = match &instance {
                PermissionInstance::Sync(permission) => permission.has_permission(source, info, &kwargs),
                PermissionInstance::Async(_) => {
                    return Err(ResolveError::resolver(format!(
                        "asynchronous permission '{}' checked without suspending",
                        class.type_name()
                    )));
                }
            };
            if !allowed {
                return Err(self.denied(class, &instance));
            }
        }
        Ok(())
    }

    async fn check(&self, source: &Data, info: &Info<'_>, values: &[Data]) -> Result<(), ResolveError> {
        if self.permissions.is_empty() {
            return Ok(());
        }
        let kwargs = self.kwargs(values);
        for class in &self.permissions {
            let instance = class.instantiate();
            let allowed = match &instance {
                PermissionInstance::Sync(permission) => permission.has_permission(source, info, &kwargs),
                PermissionInstance::Async(permission) => {
                    permission.has_permission(source, info, &kwargs).await
                }
            };
            if !allowed {
                return Err(self.denied(class, &instance));
            }
        }
        Ok(())
    }

    fn bind<'b>(&self, source: &'b Data, values: Vec<Data>, info: &'b Info<'b>) -> ResolverCall<'b> {
        let names: Vec<&str> = self.arguments.iter().map(|a| a.declared_name.as_str()).collect();
        ResolverCall::bind(&self.signature, &names, source, values, Some(info))
    }

    fn stream_outside_subscription(&self) -> ResolveError {
        ResolveError::resolver(format!(
            "'{}.{}' produces a stream and can only be subscribed to",
            self.meta.parent_type, self.meta.field_name
        ))
    }

    fn call_sync<'a>(
        &self,
        ctx: &'a Context<'a>,
        args: &ObjectAccessor<'_>,
        parent: Option<&'a Data>,
    ) -> Result<Option<FieldValue<'a>>, ResolveError> {
        let source: &Data = parent.unwrap_or(self.root_value.as_ref());
        let values = self.arguments(args)?;
        let info = Info::new(ctx, Arc::clone(&self.meta), &self.stats);
        self.check_sync(source, &info, &values)?;

        let data = match self.resolver.as_deref().map(Resolver::kind) {
            None => source.attribute(&self.meta.declared_name).cloned().unwrap_or(Data::Null),
            Some(ResolverKind::Sync(body)) => {
                self.stats.record_call();
                let call = self.bind(source, values, &info);
                info.sync_scope(|| body(call))?
            }
            Some(ResolverKind::Future(_)) => {
                return Err(ResolveError::resolver("asynchronous resolver called without suspending"));
            }
            Some(ResolverKind::Stream(_)) => return Err(self.stream_outside_subscription()),
        };
        self.output.output(Cow::Owned(data))
    }

    async fn call_async<'a>(
        &self,
        ctx: &'a Context<'a>,
        args: &ObjectAccessor<'_>,
        parent: Option<&'a Data>,
    ) -> Result<Option<FieldValue<'a>>, ResolveError> {
        let source: &Data = parent.unwrap_or(self.root_value.as_ref());
        let values = self.arguments(args)?;
        let info = Info::new(ctx, Arc::clone(&self.meta), &self.stats);
        self.check(source, &info, &values).await?;

        let data = match self.resolver.as_deref().map(Resolver::kind) {
            None => source.attribute(&self.meta.declared_name).cloned().unwrap_or(Data::Null),
            Some(ResolverKind::Sync(body)) => {
                self.stats.record_call();
                let call = self.bind(source, values, &info);
                info.sync_scope(|| body(call))?
            }
            Some(ResolverKind::Future(body)) => {
                self.stats.record_call();
                let call = self.bind(source, values, &info);
                info.scope(body(call)).await?
            }
            Some(ResolverKind::Stream(_)) => return Err(self.stream_outside_subscription()),
        };
        self.output.output(Cow::Owned(data))
    }

    /// Entry point of subscription fields.
    pub(crate) fn subscribe<'a>(self: &Arc<Self>, ctx: ResolverContext<'a>) -> SubscriptionFieldFuture<'a> {
        let plan = Arc::clone(self);
        SubscriptionFieldFuture::new(async move {
            let ResolverContext {
                ctx,
                args,
                parent_value,
            } = ctx;
            let items = plan
                .open_stream(ctx, &args, parent_value.downcast_ref::<Data>())
                .await
                .map_err(|err| err.extend())?;
            let output = Arc::clone(&plan);
            Ok(items.map(move |item| {
                item.and_then(|data| output.output.output(Cow::Owned(data)))
                    .map(|value| value.unwrap_or(FieldValue::NULL))
                    .map_err(|err| err.extend())
            }))
        })
    }

    async fn open_stream<'a>(
        &self,
        ctx: &'a Context<'a>,
        args: &ObjectAccessor<'_>,
        parent: Option<&'a Data>,
    ) -> Result<BoxStream<'static, ResolveResult>, ResolveError> {
        let Some(ResolverKind::Stream(body)) = self.resolver.as_deref().map(Resolver::kind) else {
            return Err(ResolveError::resolver(format!(
                "subscription '{}' has no stream resolver",
                self.meta.field_name
            )));
        };
        let source: &Data = parent.unwrap_or(self.root_value.as_ref());
        let values = self.arguments(args)?;
        let info = Info::new(ctx, Arc::clone(&self.meta), &self.stats);
        self.check(source, &info, &values).await?;

        self.stats.record_call();
        let call = self.bind(source, values, &info);
        let items = info.sync_scope(|| body(call))?;
        Ok(info.scope_stream(items).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::TypeExpr;
    use crate::field::Field;
    use crate::permission::{AsyncPermission, Permission};
    use async_trait::async_trait;

    #[derive(Default)]
    struct Deny;

    impl Permission for Deny {
        fn has_permission(&self, _: &Data, _: &Info<'_>, _: &IndexMap<String, Data>) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct Remote;

    #[async_trait]
    impl AsyncPermission for Remote {
        async fn has_permission(&self, _: &Data, _: &Info<'_>, _: &IndexMap<String, Data>) -> bool {
            true
        }
    }

    fn plan(resolver: Option<Resolver>, permissions: Vec<PermissionClass>) -> FieldPlan {
        FieldPlan {
            meta: Arc::new(FieldMeta {
                parent_type: "Query".into(),
                field_name: "value".into(),
                declared_name: "value".into(),
                return_type: "Int".into(),
            }),
            output: OutputShape::Object,
            nullable: true,
            arguments: Vec::new(),
            resolver: resolver.map(Arc::new),
            signature: Vec::new(),
            permissions,
            root_value: Arc::new(Data::Null),
            stats: Arc::default(),
        }
    }

    #[test]
    fn test_paths() {
        assert!(plan(None, vec![]).is_basic());

        let sync = Resolver::new("value").returns(TypeExpr::int()).sync(|_| Ok(Data::Int(1)));
        let denied = plan(Some(sync.clone()), vec![PermissionClass::new::<Deny>()]);
        assert!(!denied.is_basic());
        assert!(!denied.suspends());

        let remote = plan(Some(sync), vec![PermissionClass::new_async::<Remote>()]);
        assert!(remote.suspends());

        let future = Resolver::new("value")
            .returns(TypeExpr::int())
            .future(|_| Box::pin(async { Ok(Data::Int(1)) }));
        assert!(plan(Some(future), vec![]).suspends());
    }

    #[test]
    fn test_basic_field_reads_root_value() {
        let mut plan = plan(None, vec![]);
        plan.root_value = Arc::new(Data::Object(
            crate::value::Instance::new(
                crate::types::TypeDefinition::object("Query")
                    .field(Field::new("value").ty(TypeExpr::int()))
                    .build()
                    .unwrap()
                    .origin(),
            )
            .with("value", 7),
        ));
        assert!(plan.read_basic(None).unwrap().is_some());
        let absent = Data::Null;
        assert!(plan.read_basic(Some(&absent)).unwrap().is_none());
        assert_eq!(plan.stats.infos_created(), 0);
    }
}
