pub mod container_handler;
pub mod factory;
pub mod machine_source;
pub mod manager;
pub mod process_source;
pub mod watcher;

pub use container_handler::{ContainerHandler, HandlerError};
pub use factory::{Claim, ContainerHandlerFactory, FactoryError};
pub use machine_source::MachineSource;
pub use manager::{EventWatch, Manager, ManagerError, RequestedContainers};
pub use process_source::ProcessSource;
pub use watcher::{ContainerWatcher, WatchEvent, WatchEventKind, WatcherError};
