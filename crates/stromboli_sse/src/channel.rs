use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::close::{spawn_cancel_watcher, CloseHandle};
use crate::error::SseError;
use crate::event::StreamEvent;
use crate::stream::EventStream;

impl EventStream {
    /// Moves the stream onto a reader task and returns a receiver fed with
    /// owned copies of each event.
    ///
    /// The sequence ends when the peer finishes, a read fails, or `cancel`
    /// fires. Cancellation closes the stream, which also unblocks a read
    /// that is waiting on the network. Use [`EventReceiver::finish`] to get
    /// the stream back and inspect [`EventStream::err`].
    pub fn events_with_cancel(self, cancel: CancellationToken) -> EventReceiver {
        let (tx, rx) = mpsc::channel(1);
        let closer = self.close_handle();
        let reader = tokio::spawn(pump(self, cancel, tx));
        EventReceiver {
            rx,
            reader: Some(reader),
            closer,
            ended: false,
        }
    }

    /// Like [`events_with_cancel`](EventStream::events_with_cancel) with a
    /// token that never fires.
    #[deprecated(
        note = "without a token the sequence only ends when the peer finishes or the receiver is dropped; use `events_with_cancel`"
    )]
    pub fn events(self) -> EventReceiver {
        self.events_with_cancel(CancellationToken::new())
    }
}

async fn pump(
    mut stream: EventStream,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamEvent>,
) -> EventStream {
    let (done_tx, done_rx) = oneshot::channel::<()>();
    spawn_cancel_watcher(stream.close_handle(), cancel.clone(), async move {
        let _ = done_rx.await;
    });

    while stream.next().await {
        let Some(event) = stream.current().cloned() else {
            break;
        };
        let delivered = tokio::select! {
            sent = tx.send(event) => sent.is_ok(),
            _ = cancel.cancelled() => false,
        };
        if !delivered {
            break;
        }
    }

    drop(done_tx);
    stream
}

/// Push-style view of an [`EventStream`], also usable as a
/// [`futures::Stream`](futures_util::Stream).
///
/// Dropping the receiver before the sequence ends closes the stream, so the
/// reader task and its watcher exit even if the peer has stalled.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<StreamEvent>,
    reader: Option<JoinHandle<EventStream>>,
    closer: CloseHandle,
    ended: bool,
}

impl EventReceiver {
    /// Next event, or `None` once the sequence has ended.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        let event = self.rx.recv().await;
        if event.is_none() {
            self.ended = true;
        }
        event
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    /// Stops the reader task and returns the underlying stream.
    ///
    /// If the sequence has not been drained to its end the stream is closed
    /// first, so this never waits on the network.
    pub async fn finish(mut self) -> Result<EventStream, SseError> {
        self.rx.close();
        if !self.ended {
            self.closer.close();
        }

        let Some(reader) = self.reader.take() else {
            return Err(SseError::Closed);
        };
        reader.await.map_err(join_failure)
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        if !self.ended {
            self.closer.close();
        }
    }
}

/// A reader task only fails to join when it panicked or the runtime shut
/// down underneath it.
fn join_failure(error: JoinError) -> SseError {
    if error.is_panic() {
        SseError::ReaderPanicked(error.to_string())
    } else {
        SseError::Closed
    }
}

impl Stream for EventReceiver {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        let polled = self.rx.poll_recv(cx);
        if let Poll::Ready(None) = polled {
            self.ended = true;
        }
        polled
    }
}
