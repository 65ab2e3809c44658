use std::time::Duration;

/// Observes what the container does
///
/// Every method defaults to doing nothing. Loggers are advisory: they return nothing and
/// cannot influence the outcome of `start` or `stop`.
pub trait Logger: Send + Sync {
    /// A provider was registered
    fn provide(&self, _name: &str, _dependencies: &[String]) {}
    /// An invocation was registered
    fn invoke(&self, _dependencies: &[String]) {}
    /// A provider is about to be built, all its dependencies are resolved
    fn before_build(&self, _name: &str) {}
    /// A provider was built
    fn built(&self, _name: &str, _elapsed: Duration) {}
    fn hook_on_start(&self, _name: &str) {}
    fn hook_on_start_complete(&self, _name: &str, _elapsed: Duration) {}
    fn hook_on_stop(&self, _name: &str) {}
    fn hook_on_stop_complete(&self, _name: &str, _elapsed: Duration) {}
    /// All invocations completed
    fn running(&self) {}
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Emits every container event as a `tracing` event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;
impl Logger for TracingLogger {
    fn provide(&self, name: &str, dependencies: &[String]) {
        if dependencies.is_empty() {
            tracing::debug!(provider = %name, "PROVIDE");
        } else {
            tracing::debug!(provider = %name, depends_on = %dependencies.join(", "), "PROVIDE");
        }
    }

    fn invoke(&self, dependencies: &[String]) {
        tracing::debug!(depends_on = %dependencies.join(", "), "INVOKE");
    }

    fn before_build(&self, name: &str) {
        tracing::debug!(provider = %name, "BEFORE RUN");
    }

    fn built(&self, name: &str, elapsed: Duration) {
        tracing::info!(provider = %name, ?elapsed, "RUN");
    }

    fn hook_on_start(&self, name: &str) {
        tracing::debug!(provider = %name, "HOOK OnStart executing");
    }

    fn hook_on_start_complete(&self, name: &str, elapsed: Duration) {
        tracing::info!(provider = %name, ?elapsed, "HOOK OnStart ran successfully");
    }

    fn hook_on_stop(&self, name: &str) {
        tracing::debug!(provider = %name, "HOOK OnStop executing");
    }

    fn hook_on_stop_complete(&self, name: &str, elapsed: Duration) {
        tracing::info!(provider = %name, ?elapsed, "HOOK OnStop ran successfully");
    }

    fn running(&self) {
        tracing::info!("RUNNING");
    }
}
