// Gateway module for stream - follows the Train Station Pattern
// All external access must go through this gateway

mod cancellable;
mod handle;

pub use cancellable::{CancellableStream, ProviderStream};
pub use handle::{CancelHandle, RequestHandle};
