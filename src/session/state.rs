use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Lane, Message, UsageRecord};

/// Read-only view of a chat session, published after every change
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    /// Reply text streamed so far on the running lane
    pub in_flight: String,
    /// Transient lifecycle status, never part of the timeline
    pub status: Option<String>,
    pub usage: HashMap<String, UsageRecord>,
    pub active_lanes: Vec<Lane>,
    /// User-facing text of the last surfaced failure
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn is_streaming(&self) -> bool {
        !self.active_lanes.is_empty()
    }

    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_assistant())
    }
}
