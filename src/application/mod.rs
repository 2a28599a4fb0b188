pub mod events;
pub mod factory_registry;
pub mod manager;

pub use events::EventStore;
pub use factory_registry::{Dispatch, FactoryRegistry, RegistryDebugInfo, RegistryError, RAW_FACTORY_NAME};
pub use manager::{ContainerManager, DiscoveryError, ManagerConfig};
