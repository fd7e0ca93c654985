use serde::{Deserialize, Serialize};

const STATUS_OK: &str = "ok";

/// Body of `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service name, normally `stromboli`.
    #[serde(default)]
    pub name: String,
    /// `ok` or `error`.
    pub status: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub components: Vec<ComponentHealth>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Components that report anything other than `ok`.
    pub fn unhealthy_components(&self) -> impl Iterator<Item = &ComponentHealth> {
        self.components
            .iter()
            .filter(|component| !component.is_healthy())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    /// Failure detail, empty when healthy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl ComponentHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == STATUS_OK
    }
}
