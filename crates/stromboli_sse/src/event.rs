use serde::{Deserialize, Serialize};

/// One event assembled from the `text/event-stream` wire format.
///
/// `event_type` is empty for untyped events. Servers commonly send
/// `message`, `error` or `done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// Value of the `event:` field.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
    /// Value of the last `id:` field.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
}

impl StreamEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// True for events sent without an `event:` field.
    pub fn is_untyped(&self) -> bool {
        self.event_type.is_empty()
    }
}
