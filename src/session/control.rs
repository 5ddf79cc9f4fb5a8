use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::Lane;
use crate::stream::CancelHandle;
use crate::utils::{ParleyError, Result};

/// Active-stream references, one slot per lane
///
/// The single source of truth for cancellation: stop cancels whatever a
/// lane references and empties the slot. Cloning shares the slots.
#[derive(Debug, Clone, Default)]
pub struct SessionControl {
    active: Arc<Mutex<HashMap<Lane, CancelHandle>>>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with `LaneBusy` if `lane` already has a stream
    pub fn ensure_idle(&self, lane: Lane) -> Result<()> {
        if self.active.lock().contains_key(&lane) {
            return Err(ParleyError::LaneBusy(lane));
        }
        Ok(())
    }

    /// Claim `lane` for `handle`
    pub fn acquire(&self, lane: Lane, handle: CancelHandle) -> Result<()> {
        let mut active = self.active.lock();
        if active.contains_key(&lane) {
            return Err(ParleyError::LaneBusy(lane));
        }
        debug!("{} acquired", lane);
        active.insert(lane, handle);
        Ok(())
    }

    /// Empty the slot if it still references `handle`
    pub fn release(&self, lane: Lane, handle: &CancelHandle) {
        let mut active = self.active.lock();
        if active.get(&lane).is_some_and(|h| h.same_stream(handle)) {
            active.remove(&lane);
            debug!("{} released", lane);
        }
    }

    /// Cancel and forget the stream on `lane`. Returns whether one was active
    pub fn stop(&self, lane: Lane) -> bool {
        let handle = self.active.lock().remove(&lane);
        match handle {
            Some(handle) => {
                info!("Stopping {}", lane);
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every lane, e.g. when the host goes to the background
    pub fn stop_all(&self) {
        let handles: Vec<(Lane, CancelHandle)> = self.active.lock().drain().collect();
        for (lane, handle) in handles {
            info!("Stopping {}", lane);
            handle.cancel();
        }
    }

    pub fn is_active(&self, lane: Lane) -> bool {
        self.active.lock().contains_key(&lane)
    }
}
