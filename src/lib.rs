pub mod app;
pub mod cli;
pub mod constants;
pub mod download;
pub mod models;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod stream;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use app::{load_config, AppState, Config};
pub use download::{DownloadOrchestrator, DownloadPhase};
pub use models::Engine;
pub use registry::{ServiceRegistry, SharedRegistry};
pub use runtime::Runtime;
pub use session::ChatSession;
pub use utils::{ParleyError, Result};
