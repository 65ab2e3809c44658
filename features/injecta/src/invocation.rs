use std::future::Future;

use futures::{FutureExt, TryFutureExt};

use crate::{
    container::Container,
    errors::StartError,
    provider::{DependencyRef, DependsOn},
    resolver::Dependencies,
    types::{DynError, DynFuture},
};

type Callback = Box<dyn FnOnce(Dependencies) -> DynFuture<()> + Send>;

/// A terminal action run once when the container starts
///
/// Invocations consume services but are never memoized or depended upon.
pub struct Invoke {
    name: Option<String>,
    depends_on: DependsOn,
    callback: Callback,
}

impl Invoke {
    pub fn new<F, Fut, E>(callback: F) -> Self
    where
        F: FnOnce(Dependencies) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<DynError>,
    {
        Invoke {
            name: None,
            depends_on: Vec::new(),
            callback: Box::new(move |dependencies| {
                callback(dependencies)
                    .map_err(|e| -> DynError { e.into() })
                    .boxed()
            }),
        }
    }

    /// Names the invocation in logs and errors
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn depends_on(
        mut self,
        parameter: impl Into<String>,
        dependency: impl Into<DependencyRef>,
    ) -> Self {
        let parameter = parameter.into();
        let dependency = dependency.into().name().to_string();

        match self.depends_on.iter_mut().find(|(p, _)| *p == parameter) {
            Some(entry) => entry.1 = dependency,
            None => self.depends_on.push((parameter, dependency)),
        }
        self
    }

    pub(crate) fn dependency_names(&self) -> Vec<String> {
        self.depends_on
            .iter()
            .map(|(_, dependency)| dependency.clone())
            .collect()
    }

    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => format!("'{name}'"),
            None => format!("#{index}"),
        }
    }
}

/// Runs the invocations one after another
///
/// Each invocation's dependencies are resolved right before its callback runs. The first
/// failure, while resolving or inside a callback, aborts the invocations after it.
pub(crate) async fn run_invocations(
    container: &Container,
    invocations: Vec<Invoke>,
) -> Result<(), StartError> {
    for (index, invoke) in invocations.into_iter().enumerate() {
        let label = invoke.label(index);
        let dependencies = container
            .resolve_dependencies(None, &invoke.depends_on)
            .await?;

        tracing::debug!(invocation = %label, "Running invocation");
        (invoke.callback)(dependencies)
            .await
            .map_err(|source| StartError::InvocationFailed {
                invocation: label,
                source,
            })?;
    }

    Ok(())
}
