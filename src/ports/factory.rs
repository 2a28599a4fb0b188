use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::{ContainerHandler, HandlerError};

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("runtime engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Answer of a factory asked whether it owns a container.
///
/// "Handle" means the factory recognizes the name; "accept" means it also
/// wants the container monitored. Accepting without handling is not
/// representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Not recognized, ask the next factory
    Pass,
    /// Recognized but deliberately excluded from monitoring
    Ignore,
    /// Recognized and should be monitored by this factory
    Accept,
}

impl Claim {
    pub fn can_handle(&self) -> bool {
        !matches!(self, Self::Pass)
    }

    pub fn can_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Port for a runtime-specific handler factory
#[async_trait]
pub trait ContainerHandlerFactory: Send + Sync {
    /// Identity of the factory. The generic fallback factory is named `"raw"`.
    fn name(&self) -> &str;

    async fn can_handle_and_accept(&self, name: &str) -> Result<Claim, FactoryError>;

    async fn new_container_handler(
        &self,
        name: &str,
        metadata_env_allow_list: &[String],
        in_host_namespace: bool,
    ) -> Result<Arc<dyn ContainerHandler>, FactoryError>;

    /// Free-form diagnostics shown on the validation endpoint
    fn debug_info(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }
}
