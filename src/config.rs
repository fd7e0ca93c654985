//! Client configuration.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::headers::is_valid_token;
use crate::url::DEFAULT_BASE_URL;

/// Timeout applied to non-streaming requests unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_URL: &str = "STROMBOLI_URL";
pub const ENV_TOKEN: &str = "STROMBOLI_TOKEN";
pub const ENV_USER_AGENT: &str = "STROMBOLI_USER_AGENT";
pub const ENV_STREAM_TIMEOUT_SECS: &str = "STROMBOLI_STREAM_TIMEOUT_SECS";

/// Observer invoked with every request right before it is sent.
#[derive(Clone)]
pub struct RequestHook(Arc<dyn Fn(&reqwest::Request) + Send + Sync>);

impl RequestHook {
    pub fn new(hook: impl Fn(&reqwest::Request) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn call(&self, request: &reqwest::Request) {
        (self.0)(request);
    }
}

impl fmt::Debug for RequestHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestHook(..)")
    }
}

/// Observer invoked with every response once its headers have arrived.
///
/// The body has not been read at that point; for streams it is still
/// arriving.
#[derive(Clone)]
pub struct ResponseHook(Arc<dyn Fn(&reqwest::Response) + Send + Sync>);

impl ResponseHook {
    pub fn new(hook: impl Fn(&reqwest::Response) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn call(&self, response: &reqwest::Response) {
        (self.0)(response);
    }
}

impl fmt::Debug for ResponseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseHook(..)")
    }
}

/// Transport configuration for a [`StromboliClient`](crate::StromboliClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `http://localhost:8585` or `https://host/api/v1`.
    pub base_url: String,
    /// Bearer token sent as `Authorization`.
    pub token: Option<String>,
    /// `User-Agent` override. `None` or empty keeps `stromboli-rust/<version>`.
    pub user_agent: Option<String>,
    /// Deadline for non-streaming requests.
    pub timeout: Duration,
    /// Deadline for a whole streaming request, body included. `None` leaves
    /// streams bounded only by the caller's cancellation token.
    pub stream_timeout: Option<Duration>,
    /// Additional headers merged into every request.
    pub extra_headers: BTreeMap<String, String>,
    /// Preconfigured HTTP client (proxies, TLS, pooling).
    pub http_client: Option<reqwest::Client>,
    pub request_hook: Option<RequestHook>,
    pub response_hook: Option<ResponseHook>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: None,
            extra_headers: BTreeMap::new(),
            http_client: None,
            request_hook: None,
            response_hook: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("stream_timeout", &self.stream_timeout)
            .field("extra_headers", &self.extra_headers)
            .field("http_client", &self.http_client.is_some())
            .field("request_hook", &self.request_hook)
            .field("response_hook", &self.response_hook)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Reads `STROMBOLI_URL`, `STROMBOLI_TOKEN`, `STROMBOLI_USER_AGENT` and
    /// `STROMBOLI_STREAM_TIMEOUT_SECS`. Unset or blank values keep defaults.
    pub fn from_env() -> Self {
        let base_url = env_string_opt(ENV_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);
        if let Some(token) = env_string_opt(ENV_TOKEN) {
            config = config.with_token(token);
        }
        config.user_agent = env_string_opt(ENV_USER_AGENT);
        config.stream_timeout = env_secs_opt(ENV_STREAM_TIMEOUT_SECS);
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the bearer token. An empty token clears it; a token containing
    /// control characters is ignored with a warning.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        if token.is_empty() {
            self.token = None;
        } else if is_valid_token(&token) {
            self.token = Some(token);
        } else {
            warn!("ignoring bearer token containing control characters");
        }
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        if !user_agent.trim().is_empty() {
            self.user_agent = Some(user_agent);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Zero is ignored.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.stream_timeout = Some(timeout);
        }
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_request_hook(
        mut self,
        hook: impl Fn(&reqwest::Request) + Send + Sync + 'static,
    ) -> Self {
        self.request_hook = Some(RequestHook::new(hook));
        self
    }

    pub fn with_response_hook(
        mut self,
        hook: impl Fn(&reqwest::Response) + Send + Sync + 'static,
    ) -> Self {
        self.response_hook = Some(ResponseHook::new(hook));
        self
    }

    pub fn insert_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.extra_headers.extend(headers);
        self
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn env_secs_opt(key: &str) -> Option<Duration> {
    let raw = env_string_opt(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) => None,
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!(key, value = %raw, "ignoring non-numeric timeout");
            None
        }
    }
}
