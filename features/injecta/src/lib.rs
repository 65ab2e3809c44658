//! Injecta bootstraps an application's services in dependency order, memoizes them and
//! tears them down in reverse order.
//!
//! Injecta is split into three steps:
//! 1. Registration: `provide` recipes for services and `invoke` actions consuming them
//! 2. Start: `on_start` hooks fire in dependency order, then each invocation pulls its
//!    dependencies, which are built lazily and exactly once, and runs
//! 3. Stop: `on_stop` hooks fire in reverse dependency order
//!
//! A service takes part in start and stop by depending on the reserved [LIFECYCLE] key.
//!
//! # Examples
//!
//! ```ignore
//! let container = Container::new();
//!
//! let db = container.provide(
//!     "db",
//!     Provide::new(|ctx: BuildContext| async move {
//!         let db = Database::default();
//!         let closing = db.clone();
//!         ctx.lifecycle("lifecycle")?.on_stop(move || {
//!             let db = closing.clone();
//!             async move { db.close().await }
//!         });
//!         Ok::<_, DynError>(db)
//!     })
//!     .depends_on("lifecycle", &LIFECYCLE),
//! )?;
//!
//! container.invoke(
//!     Invoke::new(|deps: Dependencies| async move { deps.get::<Database>("db")?.migrate().await })
//!         .depends_on("db", &db),
//! );
//!
//! container.start().await?;
//! container.stop().await?;
//! ```
//!
//! Consists of the following components:
//!
//! 1. Dependency graph - edges recorded on `provide`, ordering and validation
//! 2. Resolver - lazy, memoized, cycle checked resolution
//! 3. Lifecycle - per service start and stop hooks
//! 4. Invocation - terminal actions run on start
//! 5. Logger - pluggable instrumentation
//! 6. Global - the ambient container

pub mod builder;
pub mod container;
pub mod dependency_graph;
pub mod errors;
pub mod global;
pub mod invocation;
pub mod lifecycle;
pub mod logger;
pub mod provider;
pub mod resolver;
pub mod types;

pub use builder::ContainerBuilder;
pub use container::Container;
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use errors::{LifecycleError, ProvideError, ResolveError, StartError, StopError};
pub use invocation::Invoke;
pub use lifecycle::{HookPhase, Lifecycle, LIFECYCLE, LIFECYCLE_NAME};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use provider::{DependencyRef, Provide, ProvidedKey};
pub use resolver::{BuildContext, Dependencies};
pub use types::{DynError, Injectable, Instance, TypeInfo};
