//! Async client for the Stromboli agent execution API.
//!
//! The interesting part is streaming: [`StromboliClient::stream`] opens
//! `GET /run/stream` and returns an [`EventStream`] that yields agent output
//! as Server-Sent Events. The stream can be consumed pull-style with
//! [`EventStream::next`] or handed to a reader task with
//! [`EventStream::events_with_cancel`].
//!
//! The SSE reader itself lives in the `stromboli_sse` crate and is re-exported
//! here.

pub mod client;
pub mod config;
pub mod error;
pub mod headers;
pub mod health;
pub mod request;
pub mod url;

pub use client::StromboliClient;
pub use config::{ClientConfig, RequestHook, ResponseHook};
pub use error::{parse_error_message, ErrorCode, StromboliError};
pub use health::{ComponentHealth, HealthResponse};
pub use request::StreamRequest;
pub use stromboli_sse::{
    CancellationToken, CloseHandle, EventReceiver, EventStream, SseError, StreamEvent,
    MAX_EVENT_SIZE,
};

/// Crate version, also used in the default `User-Agent`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
