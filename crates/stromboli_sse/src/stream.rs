use std::fmt;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::close::{spawn_cancel_watcher, CloseHandle};
use crate::error::SseError;
use crate::event::StreamEvent;
use crate::frame::{ByteStream, FrameReader, MAX_EVENT_SIZE};

#[derive(Debug)]
enum StreamState {
    Active,
    Exhausted,
    Errored(SseError),
}

/// Pull iterator over the events of one `text/event-stream` response.
///
/// The stream exclusively owns the byte stream it was built from. [`next`]
/// reads on the calling task and never spawns; it can wait indefinitely on a
/// stalled peer unless the stream is closed or the transport has a deadline.
///
/// ```no_run
/// # async fn run(mut stream: stromboli_sse::EventStream) {
/// while stream.next().await {
///     if let Some(event) = stream.current() {
///         print!("{}", event.data);
///     }
/// }
/// if let Some(error) = stream.err() {
///     eprintln!("stream failed: {error}");
/// }
/// # }
/// ```
///
/// [`next`]: EventStream::next
pub struct EventStream {
    reader: FrameReader,
    current: Option<StreamEvent>,
    state: StreamState,
    closer: CloseHandle,
}

impl EventStream {
    /// Wraps a chunked byte stream, such as `reqwest::Response::bytes_stream`.
    pub fn new<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        let body: ByteStream = Box::pin(body.map(|chunk| chunk.map_err(SseError::read)));
        Self {
            reader: FrameReader::new(body, MAX_EVENT_SIZE),
            current: None,
            state: StreamState::Active,
            closer: CloseHandle::default(),
        }
    }

    /// Overrides [`MAX_EVENT_SIZE`].
    pub fn with_max_event_size(mut self, limit: usize) -> Self {
        self.reader.set_limit(limit);
        self
    }

    /// Advances to the next event.
    ///
    /// Returns `false` when the peer finished, a read failed, or the stream
    /// was closed. Once `false`, every later call is `false` as well; check
    /// [`err`](EventStream::err) to tell a clean end from a failure.
    pub async fn next(&mut self) -> bool {
        if self.closer.is_closed() {
            self.reader.release();
            return false;
        }
        if !matches!(self.state, StreamState::Active) {
            return false;
        }

        match self.reader.read_event(&self.closer).await {
            Ok(Some(event)) => {
                self.current = Some(event);
                true
            }
            Ok(None) => {
                self.state = StreamState::Exhausted;
                false
            }
            Err(error) => {
                debug!(%error, "event stream stopped");
                self.state = StreamState::Errored(error);
                false
            }
        }
    }

    /// The event produced by the last successful [`next`](EventStream::next).
    ///
    /// Not cleared when iteration ends, so after exhaustion this still holds
    /// the final event.
    pub fn current(&self) -> Option<&StreamEvent> {
        self.current.as_ref()
    }

    /// The failure that ended the stream, if any. `None` while the stream is
    /// active or after a clean end.
    pub fn err(&self) -> Option<&SseError> {
        match &self.state {
            StreamState::Errored(error) => Some(error),
            StreamState::Active | StreamState::Exhausted => None,
        }
    }

    /// Consumes the stream, handing back its sticky error.
    pub fn into_result(mut self) -> Result<(), SseError> {
        match std::mem::replace(&mut self.state, StreamState::Exhausted) {
            StreamState::Errored(error) => Err(error),
            StreamState::Active | StreamState::Exhausted => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }

    /// Closes the stream and releases the byte stream.
    ///
    /// Safe to call repeatedly; only the first call returns `true`.
    pub fn close(&mut self) -> bool {
        let first = self.closer.close();
        self.reader.release();
        if first {
            debug!("event stream closed");
        }
        first
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.closer.clone()
    }

    /// Closes this stream when `cancel` fires.
    ///
    /// The watcher task exits once the stream closes for any reason,
    /// including being dropped.
    pub fn close_on_cancel(&self, cancel: CancellationToken) {
        let signal = self.closer.clone();
        spawn_cancel_watcher(self.closer.clone(), cancel, async move {
            signal.closed().await;
        });
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.closer.close();
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("current", &self.current)
            .field("state", &self.state)
            .field("closed", &self.closer.is_closed())
            .finish()
    }
}
