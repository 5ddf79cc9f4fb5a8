// Gateway module for models - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod events;
mod traits;
mod types;

// Public re-exports - the ONLY way to access model functionality
pub use events::{
    Attachment, ChatRequest, CompletionEvent, DownloadEvent, DownloadRequest, ModelSpec,
};
pub use traits::Engine;
pub use types::{
    AccessToken, ConnectionParams, Lane, Message, ModelDescriptor, ModelKind, ProviderKind, Role,
    ServiceConfiguration, UsageRecord, UseCase,
};
