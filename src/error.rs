use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use stromboli_sse::SseError;
use thiserror::Error;

/// Upper bound on how much of an error response body is read.
pub const MAX_ERROR_BODY_SIZE: usize = 4096;

/// Stable, machine-readable classification of a [`StromboliError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Timeout,
    RateLimited,
    Unavailable,
    Internal,
    Cancelled,
    InvalidUrl,
    RequestFailed,
    StreamError,
    InvalidResponse,
    StreamRead,
    EventTooLarge,
    StreamClosed,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Timeout => "TIMEOUT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
            Self::Cancelled => "CANCELLED",
            Self::InvalidUrl => "INVALID_URL",
            Self::RequestFailed => "REQUEST_FAILED",
            Self::StreamError => "STREAM_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::StreamRead => "STREAM_READ",
            Self::EventTooLarge => "EVENT_TOO_LARGE",
            Self::StreamClosed => "STREAM_CLOSED",
        }
    }

    /// Maps a non-success status from a non-streaming endpoint.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::CONFLICT => Self::Conflict,
            StatusCode::REQUEST_TIMEOUT => Self::Timeout,
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            StatusCode::SERVICE_UNAVAILABLE => Self::Unavailable,
            status if status.is_server_error() => Self::Internal,
            _ => Self::RequestFailed,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StromboliError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("{context}: {source}")]
    Connection {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The streaming endpoint answered with something other than `200 OK`.
    /// `message` holds at most [`MAX_ERROR_BODY_SIZE`] bytes of the body.
    #[error("stream request failed: {message}")]
    Stream { status: StatusCode, message: String },

    #[error("unexpected content type: {content_type}")]
    InvalidResponse {
        status: StatusCode,
        content_type: String,
    },

    #[error("{code}: HTTP {status}: {message}")]
    Status {
        code: ErrorCode,
        status: StatusCode,
        message: String,
    },

    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Sse(#[from] SseError),
}

impl StromboliError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::InvalidUrl { .. } => ErrorCode::InvalidUrl,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Connection { .. } => ErrorCode::RequestFailed,
            Self::Stream { .. } => ErrorCode::StreamError,
            Self::InvalidResponse { .. } | Self::Decode(_) => ErrorCode::InvalidResponse,
            Self::Status { code, .. } => *code,
            Self::Sse(SseError::EventTooLarge { .. }) => ErrorCode::EventTooLarge,
            Self::Sse(SseError::Closed) => ErrorCode::StreamClosed,
            Self::Sse(SseError::Read { .. } | SseError::ReaderPanicked(_)) => ErrorCode::StreamRead,
        }
    }

    /// HTTP status associated with the failure, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            Self::Timeout(_) => Some(StatusCode::REQUEST_TIMEOUT),
            Self::Stream { status, .. }
            | Self::InvalidResponse { status, .. }
            | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == ErrorCode::NotFound || self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn transport(context: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout(source)
        } else {
            Self::Connection { context, source }
        }
    }

    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_owned(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Best human-readable message for an error response body.
///
/// Prefers a JSON `error` or `message` field, then the raw body, then the
/// canonical reason phrase of `status`.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload
            .error
            .into_iter()
            .chain(payload.message)
            .find(|value| !value.trim().is_empty())
        {
            return message;
        }
    }

    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}
