use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cloneable, `Send` handle that closes an [`EventStream`](crate::EventStream)
/// from any task.
///
/// Closing is idempotent. A read that is in flight when the handle closes
/// fails with [`SseError::Closed`](crate::SseError::Closed).
#[derive(Debug, Clone)]
pub struct CloseHandle {
    inner: Arc<CloseState>,
}

#[derive(Debug)]
struct CloseState {
    closed: AtomicBool,
    signal: CancellationToken,
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self {
            inner: Arc::new(CloseState {
                closed: AtomicBool::new(false),
                signal: CancellationToken::new(),
            }),
        }
    }
}

impl CloseHandle {
    /// Returns `true` only for the call that actually closed the stream.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.signal.cancel();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Resolves once the stream has been closed.
    pub async fn closed(&self) {
        self.inner.signal.cancelled().await;
    }
}

/// Closes `closer` when `cancel` fires. The watcher exits as soon as `until`
/// resolves, whichever comes first.
pub(crate) fn spawn_cancel_watcher<F>(closer: CloseHandle, cancel: CancellationToken, until: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                if closer.close() {
                    debug!("cancellation closed event stream");
                }
            }
            _ = until => {}
        }
    });
}
