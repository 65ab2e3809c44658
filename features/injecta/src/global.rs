//! The ambient container and functions forwarding to it
//!
//! Convenient for application wiring where threading a [Container] through every call site
//! is not worth it. Libraries and tests should prefer their own [Container].

use std::sync::{PoisonError, RwLock};

use crate::{
    container::Container,
    dependency_graph::DependencyGraphErrors,
    errors::{ProvideError, StartError, StopError},
    invocation::Invoke,
    logger::Logger,
    provider::{ProvidedKey, Provide},
    types::Injectable,
};

// Created on first access
static AMBIENT: RwLock<Option<Container>> = RwLock::new(None);

/// Handle to the ambient container
pub fn container() -> Container {
    if let Some(container) = AMBIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return container.clone();
    }

    AMBIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(Container::new)
        .clone()
}

/// Replaces the ambient container with an empty one
///
/// Handles obtained through [container] before the reset keep pointing to the old one.
pub fn reset_container() {
    *AMBIENT.write().unwrap_or_else(PoisonError::into_inner) = Some(Container::new());
}

pub fn set_logger(logger: impl Logger + 'static) {
    container().set_logger(logger);
}

pub fn provide<T: Injectable>(
    name: impl Into<String>,
    provide: Provide<T>,
) -> Result<ProvidedKey<T>, ProvideError> {
    container().provide(name, provide)
}

pub fn provide_anonymous<T: Injectable>(
    provide: Provide<T>,
) -> Result<ProvidedKey<T>, ProvideError> {
    container().provide_anonymous(provide)
}

pub fn invoke(invoke: Invoke) {
    container().invoke(invoke)
}

pub fn validate() -> Result<(), DependencyGraphErrors> {
    container().validate()
}

pub async fn start() -> Result<(), StartError> {
    container().start().await
}

pub async fn stop() -> Result<(), StopError> {
    container().stop().await
}
