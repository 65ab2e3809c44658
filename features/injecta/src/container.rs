use std::{
    any::type_name,
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use uuid::Uuid;

use crate::{
    builder::ContainerBuilder,
    dependency_graph::{cycle_of, DependencyGraph, DependencyGraphError, DependencyGraphErrors},
    errors::{ProvideError, ResolveError, StartError, StopError},
    invocation::{self, Invoke},
    lifecycle::{self, HookPhase, Lifecycle, LIFECYCLE_NAME},
    logger::Logger,
    provider::{ProvidedKey, Provide, ProviderDefinition},
    types::{Injectable, Instance, TypeInfo},
};

/// Dependency injection container
///
/// Holds the providers, their memoized instances, the lifecycle handles and the pending
/// invocations. Cloning yields another handle to the same container, separate containers
/// never share state.
#[derive(Clone)]
pub struct Container(Arc<ContainerInner>);
struct ContainerInner {
    state: Mutex<ContainerState>,
    logger: RwLock<Arc<dyn Logger>>,
}

#[derive(Default)]
struct ContainerState {
    providers: HashMap<String, Arc<ProviderDefinition>>,
    graph: DependencyGraph,
    /// Done - memoized instances
    instances: HashMap<String, Instance>,
    /// In progress - providers currently resolving, outermost first
    resolving: Vec<String>,
    lifecycles: HashMap<String, Lifecycle>,
    invocations: Vec<Invoke>,
}

/// Outcome of starting to resolve a provider
pub(crate) enum Resolution {
    /// Already memoized
    Ready(Instance),
    /// Marked in progress, must be built
    Build(Arc<ProviderDefinition>),
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        let mut names: Vec<_> = state.providers.keys().collect();
        names.sort();

        let mut map = f.debug_struct("Container");
        for name in names {
            let val = if state.instances.contains_key(name) {
                "resolved"
            } else {
                "pending"
            };
            map.field(name, &val);
        }
        map.finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// A container logging through [crate::TracingLogger]
    pub fn new() -> Self {
        ContainerBuilder::new().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Container(Arc::new(ContainerInner {
            state: Mutex::new(ContainerState::default()),
            logger: RwLock::new(logger),
        }))
    }

    /// Registers `provide` under `name`
    ///
    /// Nothing is built until the provider is required. Registering a name again replaces
    /// the previous provider, as long as that one was not resolved yet.
    pub fn provide<T: Injectable>(
        &self,
        name: impl Into<String>,
        provide: Provide<T>,
    ) -> Result<ProvidedKey<T>, ProvideError> {
        let name = name.into();
        if name == LIFECYCLE_NAME {
            return Err(ProvideError::ReservedName(name));
        }

        let definition = provide.into_definition();
        let dependencies = definition.dependency_names();
        {
            let mut state = self.state();
            if state.instances.contains_key(&name) || state.resolving.contains(&name) {
                return Err(ProvideError::AlreadyResolved(name));
            }

            state.graph.insert(name.clone(), dependencies.clone());
            state.providers.insert(name.clone(), Arc::new(definition));
        }

        self.logger().provide(&name, &dependencies);
        Ok(ProvidedKey::named(name))
    }

    /// Registers `provide` under a generated unique name
    pub fn provide_anonymous<T: Injectable>(
        &self,
        provide: Provide<T>,
    ) -> Result<ProvidedKey<T>, ProvideError> {
        self.provide(format!("anonymous-{}", Uuid::new_v4()), provide)
    }

    /// Registers an invocation, run by the next [Container::start]
    pub fn invoke(&self, invoke: Invoke) {
        let dependencies = invoke.dependency_names();
        self.state().invocations.push(invoke);
        self.logger().invoke(&dependencies);
    }

    /// Starts the container
    ///
    /// 1. Orders the graph, failing on cycles before anything is built
    /// 2. Fires the `on_start` hooks of the services resolved so far, in dependency order
    /// 3. Runs the invocations in registration order, each resolving its dependencies right
    ///    before its callback
    ///
    /// Invocations are consumed, starting again only fires the hooks. A failure aborts the
    /// remaining invocations, nothing is rolled back.
    pub async fn start(&self) -> Result<(), StartError> {
        let order = self.topological_order()?;
        lifecycle::fire_hooks(self, &order, HookPhase::OnStart).await?;

        let invocations = std::mem::take(&mut self.state().invocations);
        tracing::debug!(
            "Started {} providers, running {} invocations",
            order.len(),
            invocations.len()
        );
        invocation::run_invocations(self, invocations).await?;

        self.logger().running();
        Ok(())
    }

    /// Fires the `on_stop` hooks, dependents before their dependencies
    pub async fn stop(&self) -> Result<(), StopError> {
        let order = self.topological_order()?;
        lifecycle::fire_hooks(self, order.iter().rev(), HookPhase::OnStop).await?;
        Ok(())
    }

    /// Fires the `on_start` hooks of all services resolved so far, in dependency order
    pub async fn start_lifecycle_hooks(&self) -> Result<(), StartError> {
        let order = self.topological_order()?;
        lifecycle::fire_hooks(self, &order, HookPhase::OnStart).await?;
        Ok(())
    }

    /// Fires the `on_stop` hooks of all services resolved so far, in reverse dependency order
    pub async fn stop_lifecycle_hooks(&self) -> Result<(), StopError> {
        self.stop().await
    }

    /// Resolves the provider behind `key`, building it if needed
    pub async fn resolve<T: Injectable>(
        &self,
        key: &ProvidedKey<T>,
    ) -> Result<Arc<T>, ResolveError> {
        self.resolve_named(key.name()).await
    }

    /// Resolves the provider registered under `name`, building it if needed
    ///
    /// A provider registered for another type is rejected without being built.
    pub async fn resolve_named<T: Injectable>(&self, name: &str) -> Result<Arc<T>, ResolveError> {
        if let Some(provides) = self.provided_type(name) {
            if !provides.is::<T>() {
                return Err(ResolveError::DowncastFailed {
                    name: name.to_string(),
                    required_type: type_name::<T>(),
                    actual_type: provides.type_name,
                });
            }
        }

        let instance = self.resolve_instance(name, None).await?;
        instance
            .downcast()
            .map_err(|actual_type| ResolveError::DowncastFailed {
                name: name.to_string(),
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    /// Checks the whole graph for missing dependencies and cycles
    pub fn validate(&self) -> Result<(), DependencyGraphErrors> {
        self.state().graph.check()
    }

    pub fn topological_order(&self) -> Result<Vec<String>, DependencyGraphError> {
        self.state().graph.topological_order()
    }

    pub fn set_logger(&self, logger: impl Logger + 'static) {
        *self
            .0
            .logger
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(logger);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state().graph.contains(name)
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.state().instances.contains_key(name)
    }

    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state().graph.names().map(str::to_string).collect();
        names.sort();
        names
    }

    /// The type built by the provider registered under `name`
    pub fn provided_type(&self, name: &str) -> Option<TypeInfo> {
        self.state().providers.get(name).map(|provider| provider.provides)
    }

    pub fn dependencies_of(&self, name: &str) -> Option<Vec<String>> {
        self.state().graph.dependencies_of(name).map(<[String]>::to_vec)
    }
}

// Internals used by the resolver and the lifecycle manager
//
// Each helper takes the state lock for its own duration only, so no lock is ever held
// across an await point.
impl Container {
    fn state(&self) -> MutexGuard<'_, ContainerState> {
        self.0.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn logger(&self) -> Arc<dyn Logger> {
        self.0
            .logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn begin_resolution(
        &self,
        name: &str,
        required_by: Option<&str>,
    ) -> Result<Resolution, ResolveError> {
        let mut state = self.state();

        if let Some(instance) = state.instances.get(name) {
            return Ok(Resolution::Ready(instance.clone()));
        }

        if state.resolving.iter().any(|resolving| resolving == name) {
            let chain: Vec<&str> = state.resolving.iter().map(String::as_str).collect();
            return Err(ResolveError::CircularDependency {
                name: name.to_string(),
                chain: cycle_of(&chain, name),
            });
        }

        let provider = state
            .providers
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::MissingProvider {
                name: name.to_string(),
                required_by: required_by.map(str::to_string),
            })?;

        state.resolving.push(name.to_string());
        Ok(Resolution::Build(provider))
    }

    pub(crate) fn finish_resolution(&self, name: &str, instance: Instance) {
        let mut state = self.state();
        state.resolving.retain(|resolving| resolving != name);
        state.instances.insert(name.to_string(), instance);
    }

    pub(crate) fn abort_resolution(&self, name: &str) {
        self.state().resolving.retain(|resolving| resolving != name);
    }

    /// The lifecycle handle of `owner`, created on first request
    pub(crate) fn lifecycle_for(&self, owner: &str) -> Lifecycle {
        self.state()
            .lifecycles
            .entry(owner.to_string())
            .or_default()
            .clone()
    }

    pub(crate) fn lifecycle_of(&self, name: &str) -> Option<Lifecycle> {
        self.state().lifecycles.get(name).cloned()
    }
}
