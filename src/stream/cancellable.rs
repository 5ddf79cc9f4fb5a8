use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::oneshot;
use tracing::debug;

use super::handle::{CancelHandle, RequestHandle};
use crate::utils::Result;

/// What an engine hands back for a streaming call: the request handle on
/// its own channel, then the events
pub struct ProviderStream<T> {
    pub handle: oneshot::Receiver<RequestHandle>,
    pub events: BoxStream<'static, Result<T>>,
}

impl<T> ProviderStream<T> {
    pub fn new(
        handle: oneshot::Receiver<RequestHandle>,
        events: BoxStream<'static, Result<T>>,
    ) -> Self {
        Self { handle, events }
    }
}

/// Finite, non-restartable event sequence with a uniform cancel contract
///
/// Once cancelled no further item is delivered, even one already buffered
/// by the provider.
pub struct CancellableStream<T> {
    events: BoxStream<'static, Result<T>>,
    cancel: CancelHandle,
    finished: bool,
}

impl<T: Send + 'static> CancellableStream<T> {
    /// Wrap a provider stream. Must be called inside a tokio runtime.
    pub fn from_provider(provider: ProviderStream<T>) -> Self {
        Self::with_handle(provider, CancelHandle::new())
    }

    /// Wrap a provider stream under a handle the caller created earlier,
    /// e.g. to claim a lane before the request was opened. A handle that
    /// was already cancelled cancels the request as soon as it arrives.
    pub fn with_handle(provider: ProviderStream<T>, cancel: CancelHandle) -> Self {
        let mut handle_rx = provider.handle;
        match handle_rx.try_recv() {
            Ok(request) => cancel.attach(request),
            Err(oneshot::error::TryRecvError::Empty) => {
                let slot = cancel.clone();
                tokio::spawn(async move {
                    if let Ok(request) = handle_rx.await {
                        debug!("Request handle {} received", request.id());
                        slot.attach(request);
                    }
                });
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                debug!("Provider sent no request handle");
            }
        }

        Self {
            events: provider.events,
            cancel,
            finished: false,
        }
    }

    /// Next event, or `None` once the stream is exhausted or cancelled
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.finished {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.finished = true;
            return None;
        }

        let gate = self.cancel.gate();
        let item = tokio::select! {
            biased;
            _ = gate.cancelled() => None,
            item = self.events.next() => item,
        };

        // An item that raced a cancel is dropped
        if item.is_none() || self.cancel.is_cancelled() {
            self.finished = true;
            return None;
        }
        item
    }

    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Cancelling request {:?}", self.cancel.request_id());
        }
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

// Stopping consumption early releases the provider request too
impl<T> Drop for CancellableStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
