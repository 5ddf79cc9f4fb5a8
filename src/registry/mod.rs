// Gateway module for registry - follows the Train Station Pattern
// All external access must go through this gateway

mod credentials;
mod refresh;
#[allow(clippy::module_inception)]
mod registry;

pub use credentials::{storage_key, CredentialStore, MemoryCredentialStore};
pub use refresh::{refresh_registry, CloudModel, RefreshSource};
pub use registry::{ServiceGroup, ServiceRegistry, SharedRegistry};
