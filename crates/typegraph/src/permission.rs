//! Field permission requirements.
//!
//! A permission is declared by type. Every call of a guarded field creates a
//! fresh instance through `Default` and asks it whether the call may go
//! ahead. Synchronous and asynchronous permissions can be mixed on one
//! field; the field only suspends when at least one of them is asynchronous.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::info::Info;
use crate::value::Data;

const DEFAULT_MESSAGE: &str = "User is not authorized";

/// A synchronous permission check.
pub trait Permission: Send + Sync {
    /// Message of the access-denied error.
    fn message(&self) -> String {
        DEFAULT_MESSAGE.to_owned()
    }

    /// Decides whether the call may go ahead. `source` is the parent value
    /// and `args` the converted arguments by declared name.
    fn has_permission(&self, source: &Data, info: &Info<'_>, args: &IndexMap<String, Data>) -> bool;
}

/// A permission check that suspends, e.g. to consult a remote service.
#[async_trait]
pub trait AsyncPermission: Send + Sync {
    fn message(&self) -> String {
        DEFAULT_MESSAGE.to_owned()
    }

    async fn has_permission(
        &self,
        source: &Data,
        info: &Info<'_>,
        args: &IndexMap<String, Data>,
    ) -> bool;
}

/// A fresh permission instance for one call.
pub enum PermissionInstance {
    Sync(Box<dyn Permission>),
    Async(Box<dyn AsyncPermission>),
}

impl PermissionInstance {
    pub fn message(&self) -> String {
        match self {
            Self::Sync(permission) => permission.message(),
            Self::Async(permission) => permission.message(),
        }
    }
}

#[derive(Clone)]
enum Factory {
    Sync(Arc<dyn Fn() -> Box<dyn Permission> + Send + Sync>),
    Async(Arc<dyn Fn() -> Box<dyn AsyncPermission> + Send + Sync>),
}

/// A permission type attached to a field. Equal when the permission types
/// are equal.
#[derive(Clone)]
pub struct PermissionClass {
    type_id: TypeId,
    type_name: &'static str,
    factory: Factory,
}

impl PermissionClass {
    pub fn new<P>() -> Self
    where
        P: Permission + Default + 'static,
    {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
            factory: Factory::Sync(Arc::new(|| Box::new(P::default()))),
        }
    }

    pub fn new_async<P>() -> Self
    where
        P: AsyncPermission + Default + 'static,
    {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: type_name::<P>(),
            factory: Factory::Async(Arc::new(|| Box::new(P::default()))),
        }
    }

    pub fn is_async(&self) -> bool {
        matches!(self.factory, Factory::Async(_))
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Creates the instance used for a single call.
    pub fn instantiate(&self) -> PermissionInstance {
        match &self.factory {
            Factory::Sync(make) => PermissionInstance::Sync(make()),
            Factory::Async(make) => PermissionInstance::Async(make()),
        }
    }
}

impl PartialEq for PermissionClass {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for PermissionClass {}

impl fmt::Debug for PermissionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PermissionClass").field(&self.type_name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct IsAdmin;

    impl Permission for IsAdmin {
        fn message(&self) -> String {
            "admins only".into()
        }

        fn has_permission(&self, _: &Data, _: &Info<'_>, _: &IndexMap<String, Data>) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RemoteCheck;

    #[async_trait]
    impl AsyncPermission for RemoteCheck {
        async fn has_permission(
            &self,
            _: &Data,
            _: &Info<'_>,
            _: &IndexMap<String, Data>,
        ) -> bool {
            true
        }
    }

    #[test]
    fn test_classes_compare_by_type() {
        assert_eq!(PermissionClass::new::<IsAdmin>(), PermissionClass::new::<IsAdmin>());
        assert_ne!(
            PermissionClass::new::<IsAdmin>(),
            PermissionClass::new_async::<RemoteCheck>()
        );
        assert!(format!("{:?}", PermissionClass::new::<IsAdmin>()).contains("IsAdmin"));
    }

    #[test]
    fn test_instances() {
        let sync = PermissionClass::new::<IsAdmin>();
        assert!(!sync.is_async());
        assert_eq!(sync.instantiate().message(), "admins only");

        let remote = PermissionClass::new_async::<RemoteCheck>();
        assert!(remote.is_async());
        assert!(matches!(remote.instantiate(), PermissionInstance::Async(_)));
        assert_eq!(remote.instantiate().message(), DEFAULT_MESSAGE);
    }
}
