use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use futures::{FutureExt, TryFutureExt};

use crate::{
    container::Container,
    errors::LifecycleError,
    provider::ProvidedKey,
    types::{DynError, DynFuture},
};

/// Dependency name reserved for lifecycle handles
pub const LIFECYCLE_NAME: &str = "lifecycle";

/// Typed key for the reserved lifecycle dependency
///
/// A provider declaring this dependency receives its own [Lifecycle] instead of a built
/// instance.
pub const LIFECYCLE: ProvidedKey<Lifecycle> = ProvidedKey::from_static(LIFECYCLE_NAME);

type Hook = Arc<dyn Fn() -> DynFuture<()> + Send + Sync>;

/// Start and stop hooks of a single service
///
/// Every provider depending on [LIFECYCLE] gets its own handle, created the moment the
/// provider is resolved. Hooks run in registration order.
#[derive(Clone, Default)]
pub struct Lifecycle(Arc<LifecycleInner>);

#[derive(Default)]
struct LifecycleInner {
    on_start: Mutex<Vec<Hook>>,
    on_stop: Mutex<Vec<Hook>>,
}

impl Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("on_start", &self.hook_count(HookPhase::OnStart))
            .field("on_stop", &self.hook_count(HookPhase::OnStop))
            .finish()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a hook run when the container starts, after the hooks of all dependencies
    pub fn on_start<F, Fut, E>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<DynError>,
    {
        self.push(HookPhase::OnStart, wrap(hook));
    }

    /// Registers a hook run when the container stops, before the hooks of all dependencies
    pub fn on_stop<F, Fut, E>(&self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<DynError>,
    {
        self.push(HookPhase::OnStop, wrap(hook));
    }

    pub fn hook_count(&self, phase: HookPhase) -> usize {
        self.hooks(phase)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs all hooks of `phase` one after another, stopping at the first failure
    pub(crate) async fn emit(&self, phase: HookPhase) -> Result<(), DynError> {
        // Hooks are cloned out so the lock is not held while they run
        let hooks = self
            .hooks(phase)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for hook in hooks {
            hook().await?;
        }
        Ok(())
    }

    fn push(&self, phase: HookPhase, hook: Hook) {
        self.hooks(phase)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    fn hooks(&self, phase: HookPhase) -> &Mutex<Vec<Hook>> {
        match phase {
            HookPhase::OnStart => &self.0.on_start,
            HookPhase::OnStop => &self.0.on_stop,
        }
    }
}

fn wrap<F, Fut, E>(hook: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<DynError>,
{
    Arc::new(move || hook().map_err(|e| -> DynError { e.into() }).boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    OnStart,
    OnStop,
}
impl std::fmt::Display for HookPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookPhase::OnStart => f.write_str("OnStart"),
            HookPhase::OnStop => f.write_str("OnStop"),
        }
    }
}

/// Fires the `phase` hooks of every tracked service in the given order
///
/// Each service's hooks complete before the next service's hooks begin.
pub(crate) async fn fire_hooks<'a>(
    container: &Container,
    order: impl IntoIterator<Item = &'a String>,
    phase: HookPhase,
) -> Result<(), LifecycleError> {
    let logger = container.logger();

    for name in order {
        let Some(lifecycle) = container.lifecycle_of(name) else {
            continue;
        };

        match phase {
            HookPhase::OnStart => logger.hook_on_start(name),
            HookPhase::OnStop => logger.hook_on_stop(name),
        }

        let started = Instant::now();
        lifecycle
            .emit(phase)
            .await
            .map_err(|source| LifecycleError::HookFailed {
                name: name.clone(),
                phase,
                source,
            })?;
        let elapsed = started.elapsed();

        match phase {
            HookPhase::OnStart => logger.hook_on_start_complete(name, elapsed),
            HookPhase::OnStop => logger.hook_on_stop_complete(name, elapsed),
        }
    }

    Ok(())
}
