use serde::{Deserialize, Serialize};

use crate::error::StromboliError;

/// Parameters for [`StromboliClient::stream`](crate::StromboliClient::stream).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Message for the agent. Required.
    pub prompt: String,
    /// Working directory inside the container.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub workdir: String,
    /// Continues an existing conversation when set.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
}

impl StreamRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = workdir.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn validate(&self) -> Result<(), StromboliError> {
        if self.prompt.is_empty() {
            return Err(StromboliError::BadRequest("prompt is required".to_owned()));
        }
        Ok(())
    }
}
