// Gateway module for download - follows the Train Station Pattern
// All external access must go through this gateway

mod orchestrator;
mod phase;
mod store;

pub use orchestrator::{DownloadOrchestrator, DownloadOutcome, DownloadReport, DownloadSettings};
pub use phase::{format_elapsed, format_percent, progress_percent, DownloadPhase};
#[cfg(test)]
pub use store::MockUseCaseStore;
pub use store::{load_matching, FileUseCaseStore, MemoryUseCaseStore, UseCaseStore};
