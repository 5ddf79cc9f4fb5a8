use tracing::debug;

use crate::models::{Message, Role};
use crate::stream::CancelHandle;

/// Ordered conversation history
///
/// Never holds two consecutive Assistant entries: an Assistant delta that
/// follows an Assistant entry is concatenated into it.
#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<Message>,
    owner: Option<CancelHandle>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn merge_or_append(&mut self, delta: Message) {
        match self.entries.last_mut() {
            Some(last) if last.role == Role::Assistant && delta.role == Role::Assistant => {
                last.content.push_str(&delta.content);
                last.model_id = delta.model_id;
            }
            _ => self.entries.push(delta),
        }
    }

    /// Empty the timeline and cancel the stream currently writing to it
    pub fn clear(&mut self) {
        if let Some(owner) = self.owner.take() {
            debug!("Clearing timeline, cancelling owning stream");
            owner.cancel();
        }
        self.entries.clear();
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }

    /// Register the stream that is currently feeding this timeline
    pub fn bind_stream(&mut self, handle: CancelHandle) {
        self.owner = Some(handle);
    }

    /// Forget the owning stream, if it is still `handle`
    pub fn unbind_stream(&mut self, handle: &CancelHandle) {
        if self.owner.as_ref().is_some_and(|o| o.same_stream(handle)) {
            self.owner = None;
        }
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
