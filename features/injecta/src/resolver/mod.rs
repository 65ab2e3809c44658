//! Lazy, memoized resolution of providers
//!
//! Every provider passes through three states: not started, in progress and done. A
//! provider is in progress while its dependencies and its build function run, done once
//! its instance is memoized. Reaching an in-progress provider again means the graph has a
//! cycle.

use std::time::Instant;

use futures::{future::BoxFuture, FutureExt};

use crate::{
    container::{Container, Resolution},
    errors::ResolveError,
    lifecycle::LIFECYCLE_NAME,
    provider::ProviderDefinition,
    types::Instance,
};

mod dependencies;

pub use dependencies::{BuildContext, Dependencies};

impl Container {
    /// Resolves `name` into its memoized instance, building it and its dependencies if needed
    pub(crate) fn resolve_instance<'a>(
        &'a self,
        name: &'a str,
        required_by: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Instance, ResolveError>> {
        async move {
            let provider = match self.begin_resolution(name, required_by)? {
                Resolution::Ready(instance) => return Ok(instance),
                Resolution::Build(provider) => provider,
            };

            match self.build_instance(name, &provider).await {
                Ok(instance) => {
                    self.finish_resolution(name, instance.clone());
                    Ok(instance)
                }
                Err(e) => {
                    self.abort_resolution(name);
                    Err(e)
                }
            }
        }
        .boxed()
    }

    /// Resolves every declared dependency, one at a time in declaration order
    ///
    /// `owner` is the provider the dependencies belong to, `None` for invocations. Only
    /// providers can request a lifecycle handle.
    pub(crate) async fn resolve_dependencies(
        &self,
        owner: Option<&str>,
        depends_on: &[(String, String)],
    ) -> Result<Dependencies, ResolveError> {
        let mut dependencies = Dependencies::with_capacity(depends_on.len());

        for (parameter, dependency) in depends_on {
            let instance = match owner {
                Some(owner) if dependency == LIFECYCLE_NAME => {
                    Instance::new(self.lifecycle_for(owner))
                }
                _ => self.resolve_instance(dependency, owner).await?,
            };

            dependencies.insert(parameter, dependency, instance);
        }

        Ok(dependencies)
    }

    async fn build_instance(
        &self,
        name: &str,
        provider: &ProviderDefinition,
    ) -> Result<Instance, ResolveError> {
        let dependencies = self
            .resolve_dependencies(Some(name), &provider.depends_on)
            .await?;

        let logger = self.logger();
        logger.before_build(name);

        let started = Instant::now();
        let instance = (provider.build)(BuildContext::new(name, dependencies))
            .await
            .map_err(|source| ResolveError::BuildFailed {
                name: name.to_string(),
                source,
            })?;

        logger.built(name, started.elapsed());
        Ok(instance)
    }
}
