use std::{
    any::{type_name, Any, TypeId},
    fmt::Debug,
    sync::Arc,
};

use futures::future::BoxFuture;

/// Errors raised by user supplied builds, hooks and callbacks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by every user supplied async function the container drives
pub type DynFuture<T> = BoxFuture<'static, Result<T, DynError>>;

/// The container may live in a `static` and services may be handed to other threads,
/// so anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A built service with its type erased
///
/// Cloning shares the service, every dependent of a provider holds the same allocation.
#[derive(Clone)]
pub struct Instance {
    type_info: TypeInfo,
    value: Arc<dyn Any + Send + Sync>,
}

impl Instance {
    pub(crate) fn new<T: Injectable>(value: T) -> Self {
        Instance {
            type_info: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// The typed service, or the name of the actual type on mismatch
    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| self.type_info.type_name)
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.type_info.type_name).finish()
    }
}

/// Name and id of a provided type
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn is<T: 'static + ?Sized>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}
