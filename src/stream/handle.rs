use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Engine-side handle for one in-flight request
///
/// Delivered before the first event so a caller can abort a request that
/// has not produced anything yet. The engine watches `token()` and releases
/// its network/IO resources when it fires.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: String,
    token: CancellationToken,
}

impl RequestHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct CancelInner {
    gate: CancellationToken,
    request: Mutex<Option<RequestHandle>>,
}

/// Cloneable cancel capability for one `CancellableStream`
///
/// Session state keeps one of these per lane so a stop action can cancel a
/// stream it holds no reference to. Cancelling is idempotent and never blocks.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                gate: CancellationToken::new(),
                request: Mutex::new(None),
            }),
        }
    }

    pub fn cancel(&self) {
        self.inner.gate.cancel();
        if let Some(request) = self.inner.request.lock().as_ref() {
            request.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.gate.is_cancelled()
    }

    /// True when both handles control the same stream
    pub fn same_stream(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn gate(&self) -> CancellationToken {
        self.inner.gate.clone()
    }

    // A handle that arrives after cancel() is cancelled on arrival
    pub(crate) fn attach(&self, request: RequestHandle) {
        let mut slot = self.inner.request.lock();
        if self.inner.gate.is_cancelled() {
            request.cancel();
        }
        *slot = Some(request);
    }

    pub(crate) fn request_id(&self) -> Option<String> {
        self.inner
            .request
            .lock()
            .as_ref()
            .map(|r| r.id().to_string())
    }
}
