use std::sync::Arc;

use crate::{
    container::Container,
    logger::{Logger, NoopLogger, TracingLogger},
};

/// Options for a new [Container]
///
/// ```ignore
/// let container = ContainerBuilder::new().logging(false).build();
/// ```
pub struct ContainerBuilder {
    logging: bool,
    logger: Option<Arc<dyn Logger>>,
}
impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> Self {
        ContainerBuilder {
            logging: true,
            logger: None,
        }
    }
}
impl ContainerBuilder {
    /// Disabling logging installs a [NoopLogger], regardless of [ContainerBuilder::logger]
    pub fn logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Replace the default [TracingLogger]
    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn build(self) -> Container {
        let logger: Arc<dyn Logger> = match (self.logging, self.logger) {
            (false, _) => Arc::new(NoopLogger),
            (true, Some(logger)) => logger,
            (true, None) => Arc::new(TracingLogger),
        };

        Container::with_logger(logger)
    }
}
