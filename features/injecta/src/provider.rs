use std::{borrow::Cow, fmt::Debug, future::Future, hash::Hash, marker::PhantomData, sync::Arc};

use futures::{FutureExt, TryFutureExt};

use crate::{
    resolver::BuildContext,
    types::{DynError, DynFuture, Injectable, Instance, TypeInfo},
};

/// Typed handle to a provided service
///
/// Returned by `provide` and accepted wherever a dependency can be declared. The graph
/// itself only works with the name, the type parameter lets dependents retrieve the
/// instance without naming its type again.
pub struct ProvidedKey<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProvidedKey<T> {
    /// Key for a provider registered under a well known name
    pub const fn from_static(name: &'static str) -> Self {
        ProvidedKey {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    /// Key for a provider registered under `name`
    ///
    /// The type is not checked until the instance is retrieved.
    pub fn named(name: impl Into<String>) -> Self {
        ProvidedKey {
            name: Cow::Owned(name.into()),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// Manual impls - T itself does not need to be Clone, Debug, ...
impl<T> Clone for ProvidedKey<T> {
    fn clone(&self) -> Self {
        ProvidedKey {
            name: self.name.clone(),
            _marker: PhantomData,
        }
    }
}
impl<T> Debug for ProvidedKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ProvidedKey").field(&self.name).finish()
    }
}
impl<T> std::fmt::Display for ProvidedKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
impl<T> PartialEq for ProvidedKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl<T> Eq for ProvidedKey<T> {}
impl<T> Hash for ProvidedKey<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Reference to a dependency, either a raw name or a [ProvidedKey]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef(String);
impl DependencyRef {
    pub fn name(&self) -> &str {
        &self.0
    }
}
impl From<&str> for DependencyRef {
    fn from(name: &str) -> Self {
        DependencyRef(name.to_string())
    }
}
impl From<String> for DependencyRef {
    fn from(name: String) -> Self {
        DependencyRef(name)
    }
}
impl From<&String> for DependencyRef {
    fn from(name: &String) -> Self {
        DependencyRef(name.clone())
    }
}
impl<T> From<&ProvidedKey<T>> for DependencyRef {
    fn from(key: &ProvidedKey<T>) -> Self {
        DependencyRef(key.name().to_string())
    }
}
impl<T> From<ProvidedKey<T>> for DependencyRef {
    fn from(key: ProvidedKey<T>) -> Self {
        DependencyRef(key.name.into_owned())
    }
}

/// Ordered mapping of parameter name to dependency name
pub(crate) type DependsOn = Vec<(String, String)>;

pub(crate) type BuildFn = Arc<dyn Fn(BuildContext) -> DynFuture<Instance> + Send + Sync>;

/// Recipe for a single service
///
/// ```ignore
/// let db = container.provide(
///     "db",
///     Provide::new(|ctx: BuildContext| async move {
///         let lifecycle = ctx.lifecycle("lifecycle")?;
///         let db = Database::new();
///         lifecycle.on_stop({
///             let db = db.clone();
///             move || {
///                 let db = db.clone();
///                 async move { db.close().await }
///             }
///         });
///         Ok::<_, DynError>(db)
///     })
///     .depends_on("lifecycle", &LIFECYCLE),
/// )?;
/// ```
pub struct Provide<T> {
    depends_on: DependsOn,
    build: BuildFn,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Provide<T> {
    /// Provide by running `build` once, the first time the service is required
    pub fn new<F, Fut, E>(build: F) -> Self
    where
        F: Fn(BuildContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<DynError>,
    {
        let build: BuildFn = Arc::new(move |context| {
            build(context)
                .map_ok(Instance::new)
                .map_err(|e| -> DynError { e.into() })
                .boxed()
        });

        Provide {
            depends_on: Vec::new(),
            build,
            _marker: PhantomData,
        }
    }

    /// Provide an already existing instance
    pub fn value(instance: T) -> Self {
        let instance = Instance::new(instance);
        let build: BuildFn = Arc::new(move |_: BuildContext| {
            futures::future::ok::<_, DynError>(instance.clone()).boxed()
        });

        Provide {
            depends_on: Vec::new(),
            build,
            _marker: PhantomData,
        }
    }
}

impl<T> Provide<T> {
    /// Declares a dependency, handed to the build function under `parameter`
    ///
    /// Dependencies are resolved in declaration order.
    pub fn depends_on(
        mut self,
        parameter: impl Into<String>,
        dependency: impl Into<DependencyRef>,
    ) -> Self {
        let parameter = parameter.into();
        let dependency = dependency.into().0;

        // Redeclaring a parameter replaces it, like inserting into a map would
        match self.depends_on.iter_mut().find(|(p, _)| *p == parameter) {
            Some(entry) => entry.1 = dependency,
            None => self.depends_on.push((parameter, dependency)),
        }
        self
    }

    pub(crate) fn into_definition(self) -> ProviderDefinition
    where
        T: 'static,
    {
        ProviderDefinition {
            provides: TypeInfo::of::<T>(),
            depends_on: self.depends_on,
            build: self.build,
        }
    }
}

/// Type erased provider as stored in the container
pub(crate) struct ProviderDefinition {
    pub provides: TypeInfo,
    pub depends_on: DependsOn,
    pub build: BuildFn,
}

impl ProviderDefinition {
    pub fn dependency_names(&self) -> Vec<String> {
        self.depends_on
            .iter()
            .map(|(_, dependency)| dependency.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_name() {
        let a = ProvidedKey::<u32>::named("a");
        assert_eq!(a, ProvidedKey::from_static("a"));
        assert_ne!(a, ProvidedKey::named("b"));
        assert_eq!(a.to_string(), "a");
    }

    #[test]
    fn dependencies_keep_declaration_order_and_replace_parameters() {
        let db = ProvidedKey::<String>::named("db");
        let definition = Provide::value(1_u8)
            .depends_on("db", &db)
            .depends_on("config", "config")
            .depends_on("db", "other-db")
            .into_definition();

        assert_eq!(
            definition.depends_on,
            vec![
                ("db".to_string(), "other-db".to_string()),
                ("config".to_string(), "config".to_string())
            ]
        );
        assert_eq!(definition.dependency_names(), vec!["other-db", "config"]);
        assert_eq!(definition.provides, TypeInfo::of::<u8>());
    }
}
