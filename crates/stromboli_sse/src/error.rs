use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal failure recorded by an [`EventStream`](crate::EventStream).
#[derive(Debug, Error)]
pub enum SseError {
    #[error("stream read failed: {source}")]
    Read {
        #[source]
        source: BoxError,
    },

    #[error("event exceeds maximum size of {limit} bytes")]
    EventTooLarge { limit: usize },

    #[error("stream was closed")]
    Closed,

    #[error("panic in stream reader: {0}")]
    ReaderPanicked(String),
}

impl SseError {
    pub(crate) fn read(source: impl Into<BoxError>) -> Self {
        Self::Read {
            source: source.into(),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
