// Gateway module for session - follows the Train Station Pattern
// All external access must go through this gateway

mod aggregator;
mod chat;
mod control;
mod prompt;
mod state;
mod timeline;
mod usage;

pub use aggregator::{Step, StreamAggregator, StreamOutcome};
pub use chat::{AskOutcome, ChatSession};
pub use control::SessionControl;
pub use prompt::{build_prompt, build_validation_prompt, default_info_message, transcript};
pub use state::SessionSnapshot;
pub use timeline::Timeline;
pub use usage::UsageLedger;
