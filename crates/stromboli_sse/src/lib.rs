//! Server-Sent Events reader for streamed agent output.
//!
//! This crate turns a chunked `text/event-stream` body into [`StreamEvent`]s.
//! It is transport-agnostic: anything that yields `Result<Bytes, E>` chunks can
//! back an [`EventStream`]. HTTP, authentication and status handling belong to
//! the caller.
//!
//! Two consumption styles are offered. [`EventStream::next`] is a pull
//! iterator that reads on the calling task. [`EventStream::events_with_cancel`]
//! moves the stream onto a reader task and feeds an [`EventReceiver`], closing
//! the stream when the supplied [`CancellationToken`] fires.

pub mod channel;
pub mod close;
pub mod error;
pub mod event;
pub mod frame;
pub mod stream;

pub use channel::EventReceiver;
pub use close::CloseHandle;
pub use error::SseError;
pub use event::StreamEvent;
pub use frame::MAX_EVENT_SIZE;
pub use stream::EventStream;
pub use tokio_util::sync::CancellationToken;
