use thiserror::Error;

use crate::{dependency_graph::DependencyGraphError, lifecycle::HookPhase, types::DynError};

/// Errors when registering a provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvideError {
    /// The name is reserved for lifecycle handles
    #[error("'{0}' is reserved for lifecycle handles and cannot be provided")]
    ReservedName(String),
    /// Replacing a provider whose instance already exists (or is being built) would leave
    /// dependents holding a stale instance
    #[error("Provider '{0}' has already been resolved and can no longer be replaced")]
    AlreadyResolved(String),
}

/// Errors while resolving an instance
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Nothing was provided under the requested name
    #[error("No provider found for '{name}'{}", required_by_suffix(.required_by))]
    MissingProvider {
        name: String,
        required_by: Option<String>,
    },
    /// The provider was reached again while it was still being resolved
    #[error("Circular dependency detected involving '{name}' through {chain:?}")]
    CircularDependency { name: String, chain: Vec<String> },
    /// The provider's build function failed
    #[error("Provider '{name}' failed to build: {source}")]
    BuildFailed {
        name: String,
        #[source]
        source: DynError,
    },
    /// A build or callback asked for a parameter it never declared
    #[error("No dependency was declared under the parameter '{0}'")]
    UnknownParameter(String),
    /// A build or callback asked for a key it never declared
    #[error("'{0}' was not declared as a dependency")]
    UndeclaredDependency(String),

    #[error("Failed to downcast '{name}', required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        name: String,
        required_type: &'static str,
        actual_type: &'static str,
    },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    match required_by {
        Some(dependent) => format!(" (required by '{dependent}')"),
        None => String::new(),
    }
}

/// A lifecycle hook failed
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{phase} hook of '{name}' failed: {source}")]
    HookFailed {
        name: String,
        phase: HookPhase,
        #[source]
        source: DynError,
    },
}

/// Errors while starting a container
#[derive(Error, Debug)]
pub enum StartError {
    /// There are issues with the dependency graph
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// An invocation callback failed, remaining invocations were not run
    #[error("Invocation {invocation} failed: {source}")]
    InvocationFailed {
        invocation: String,
        #[source]
        source: DynError,
    },
}

/// Errors while stopping a container
#[derive(Error, Debug)]
pub enum StopError {
    #[error(transparent)]
    DependencyGraph(#[from] DependencyGraphError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
