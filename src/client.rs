use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Request, Response, StatusCode, Url};
use stromboli_sse::EventStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{ClientConfig, RequestHook, ResponseHook};
use crate::error::{parse_error_message, ErrorCode, StromboliError, MAX_ERROR_BODY_SIZE};
use crate::headers::{
    build_headers, build_stream_headers, default_user_agent, is_valid_token, to_header_map,
    CONTENT_TYPE_EVENT_STREAM,
};
use crate::health::HealthResponse;
use crate::request::StreamRequest;
use crate::url::{endpoint_url, parse_base_url, stream_url};

/// Client for one Stromboli server.
///
/// Cheap to share behind an `Arc`; the bearer token can be swapped at runtime
/// with [`set_token`](StromboliClient::set_token) and is read when each
/// request is built.
pub struct StromboliClient {
    http: Client,
    base_url: Url,
    token: RwLock<Option<String>>,
    user_agent: String,
    timeout: Duration,
    stream_timeout: Option<Duration>,
    extra_headers: BTreeMap<String, String>,
    request_hook: Option<RequestHook>,
    response_hook: Option<ResponseHook>,
}

impl StromboliClient {
    pub fn new(config: ClientConfig) -> Result<Self, StromboliError> {
        let base_url = parse_base_url(&config.base_url)?;
        let http = match config.http_client {
            Some(http) => http,
            None => Client::builder()
                .build()
                .map_err(|error| StromboliError::transport("failed to build HTTP client", error))?,
        };
        let user_agent = config
            .user_agent
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(default_user_agent);

        Ok(Self {
            http,
            base_url,
            token: RwLock::new(config.token),
            user_agent,
            timeout: config.timeout,
            stream_timeout: config.stream_timeout,
            extra_headers: config.extra_headers,
            request_hook: config.request_hook,
            response_hook: config.response_hook,
        })
    }

    /// Builds a client from `STROMBOLI_*` environment variables.
    pub fn from_env() -> Result<Self, StromboliError> {
        Self::new(ClientConfig::from_env())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the bearer token. An empty token clears it. Returns `false`
    /// and keeps the current token when `token` contains control characters.
    pub fn set_token(&self, token: impl Into<String>) -> bool {
        let token = token.into();
        if !is_valid_token(&token) {
            warn!("ignoring bearer token containing control characters");
            return false;
        }
        let token = (!token.is_empty()).then_some(token);
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
        true
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The `GET /run/stream` request [`stream`](StromboliClient::stream)
    /// would send.
    pub fn build_stream_request(&self, request: &StreamRequest) -> Result<Request, StromboliError> {
        request.validate()?;

        let token = self.token();
        let headers = to_header_map(build_stream_headers(
            &self.user_agent,
            token.as_deref(),
            &self.extra_headers,
        ))?;

        let mut builder = self
            .http
            .get(stream_url(&self.base_url, request))
            .headers(headers);
        if let Some(timeout) = self.stream_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|error| StromboliError::transport("failed to create request", error))
    }

    /// Starts an agent run and streams its output.
    ///
    /// Fails before any I/O when the prompt is empty. On success the returned
    /// stream owns the response body. When `cancel` is given it governs both
    /// the request and every later read: firing it closes the stream.
    pub async fn stream(
        &self,
        request: &StreamRequest,
        cancel: Option<&CancellationToken>,
    ) -> Result<EventStream, StromboliError> {
        let http_request = self.build_stream_request(request)?;
        let path = http_request.url().path().to_owned();

        let response = self
            .execute(http_request, cancel, "failed to connect to stream")
            .await?;
        let status = response.status();

        if status != StatusCode::OK {
            let message = await_or_cancel(read_error_body(response), cancel).await?;
            debug!(%path, status = status.as_u16(), "stream request rejected");
            return Err(StromboliError::Stream { status, message });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        if !content_type.starts_with(CONTENT_TYPE_EVENT_STREAM) {
            return Err(StromboliError::InvalidResponse {
                status,
                content_type,
            });
        }

        debug!(%path, status = status.as_u16(), "event stream established");
        let stream = EventStream::new(response.bytes_stream());
        if let Some(cancel) = cancel {
            stream.close_on_cancel(cancel.clone());
        }
        Ok(stream)
    }

    /// `GET /health`, bounded by the configured request timeout.
    pub async fn health(
        &self,
        cancel: Option<&CancellationToken>,
    ) -> Result<HealthResponse, StromboliError> {
        let token = self.token();
        let headers = to_header_map(build_headers(
            &self.user_agent,
            token.as_deref(),
            &self.extra_headers,
        ))?;
        let request = self
            .http
            .get(endpoint_url(&self.base_url, &["health"]))
            .headers(headers)
            .timeout(self.timeout)
            .build()
            .map_err(|error| StromboliError::transport("failed to create request", error))?;

        let response = self
            .execute(request, cancel, "failed to get health status")
            .await?;
        let status = response.status();
        let body = await_or_cancel(response.bytes(), cancel)
            .await?
            .map_err(|error| StromboliError::transport("failed to read health status", error))?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&body);
            return Err(StromboliError::Status {
                code: ErrorCode::from_status(status),
                status,
                message: parse_error_message(status, &body),
            });
        }

        serde_json::from_slice(&body).map_err(StromboliError::Decode)
    }

    async fn execute(
        &self,
        request: Request,
        cancel: Option<&CancellationToken>,
        context: &'static str,
    ) -> Result<Response, StromboliError> {
        if let Some(hook) = &self.request_hook {
            hook.call(&request);
        }

        let response = await_or_cancel(self.http.execute(request), cancel)
            .await?
            .map_err(|error| StromboliError::transport(context, error))?;

        if let Some(hook) = &self.response_hook {
            hook.call(&response);
        }
        Ok(response)
    }
}

impl fmt::Debug for StromboliClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StromboliClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("stream_timeout", &self.stream_timeout)
            .finish_non_exhaustive()
    }
}

async fn await_or_cancel<F>(
    future: F,
    cancel: Option<&CancellationToken>,
) -> Result<F::Output, StromboliError>
where
    F: Future,
{
    let Some(cancel) = cancel else {
        return Ok(future.await);
    };
    if cancel.is_cancelled() {
        return Err(StromboliError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StromboliError::Cancelled),
        output = future => Ok(output),
    }
}

/// Reads at most [`MAX_ERROR_BODY_SIZE`] bytes. A body that fails midway
/// yields whatever arrived before the failure.
async fn read_error_body(mut response: Response) -> String {
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY_SIZE {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY_SIZE - body.len();
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            Ok(None) | Err(_) => break,
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
