use std::{any::type_name, ops::Deref, sync::Arc};

use crate::{
    errors::ResolveError,
    lifecycle::Lifecycle,
    provider::ProvidedKey,
    types::{Injectable, Instance},
};

/// Resolved dependencies of a provider or invocation, keyed by parameter name
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    entries: Vec<ResolvedDependency>,
}

#[derive(Debug, Clone)]
struct ResolvedDependency {
    parameter: String,
    name: String,
    instance: Instance,
}

impl Dependencies {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Dependencies {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, parameter: &str, name: &str, instance: Instance) {
        self.entries.push(ResolvedDependency {
            parameter: parameter.to_string(),
            name: name.to_string(),
            instance,
        });
    }

    /// The instance declared under `parameter`
    pub fn get<T: Injectable>(&self, parameter: &str) -> Result<Arc<T>, ResolveError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.parameter == parameter)
            .ok_or_else(|| ResolveError::UnknownParameter(parameter.to_string()))?;

        downcast(entry)
    }

    /// The instance of the dependency `key`, whatever parameter it was declared under
    pub fn of<T: Injectable>(&self, key: &ProvidedKey<T>) -> Result<Arc<T>, ResolveError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.name == key.name())
            .ok_or_else(|| ResolveError::UndeclaredDependency(key.name().to_string()))?;

        downcast(entry)
    }

    /// The lifecycle handle declared under `parameter`
    pub fn lifecycle(&self, parameter: &str) -> Result<Lifecycle, ResolveError> {
        self.get::<Lifecycle>(parameter)
            .map(|lifecycle| lifecycle.deref().clone())
    }

    /// The untyped instance declared under `parameter`
    pub fn instance(&self, parameter: &str) -> Option<&Instance> {
        self.entries
            .iter()
            .find(|entry| entry.parameter == parameter)
            .map(|entry| &entry.instance)
    }

    /// Parameter names in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.parameter.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn downcast<T: Injectable>(entry: &ResolvedDependency) -> Result<Arc<T>, ResolveError> {
    entry
        .instance
        .downcast()
        .map_err(|actual_type| ResolveError::DowncastFailed {
            name: entry.name.clone(),
            required_type: type_name::<T>(),
            actual_type,
        })
}

/// Passed to a provider's build function
#[derive(Debug)]
pub struct BuildContext {
    name: String,
    dependencies: Dependencies,
}

impl BuildContext {
    pub(crate) fn new(name: &str, dependencies: Dependencies) -> Self {
        BuildContext {
            name: name.to_string(),
            dependencies,
        }
    }

    /// Name of the provider being built
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    pub fn into_dependencies(self) -> Dependencies {
        self.dependencies
    }
}

impl Deref for BuildContext {
    type Target = Dependencies;

    fn deref(&self) -> &Self::Target {
        &self.dependencies
    }
}
