use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::StromboliError;
use crate::VERSION;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_AUTHORIZATION: &str = "authorization";
pub const HEADER_CACHE_CONTROL: &str = "cache-control";
pub const HEADER_CONNECTION: &str = "connection";
pub const HEADER_USER_AGENT: &str = "user-agent";

pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";
pub const CONTENT_TYPE_JSON: &str = "application/json";

pub fn default_user_agent() -> String {
    format!("stromboli-rust/{VERSION}")
}

/// Rejects tokens that could smuggle extra header lines.
pub fn is_valid_token(token: &str) -> bool {
    !token.chars().any(|c| c < '\u{20}' || c == '\u{7f}')
}

/// Headers shared by every request. Extra headers are applied last, keyed in
/// lowercase, so they can override the defaults.
pub fn build_headers(
    user_agent: &str,
    token: Option<&str>,
    extra_headers: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(HEADER_ACCEPT.to_owned(), CONTENT_TYPE_JSON.to_owned());
    headers.insert(HEADER_USER_AGENT.to_owned(), user_agent.to_owned());

    if let Some(token) = token.filter(|token| !token.is_empty()) {
        headers.insert(HEADER_AUTHORIZATION.to_owned(), format!("Bearer {token}"));
    }

    for (key, value) in extra_headers {
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_owned());
    }

    headers
}

/// Headers for `GET /run/stream`: the shared set plus the SSE negotiation
/// headers, which extras cannot override.
pub fn build_stream_headers(
    user_agent: &str,
    token: Option<&str>,
    extra_headers: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut headers = build_headers(user_agent, token, extra_headers);
    headers.insert(
        HEADER_ACCEPT.to_owned(),
        CONTENT_TYPE_EVENT_STREAM.to_owned(),
    );
    headers.insert(HEADER_CACHE_CONTROL.to_owned(), "no-cache".to_owned());
    headers.insert(HEADER_CONNECTION.to_owned(), "keep-alive".to_owned());
    headers
}

pub(crate) fn to_header_map(
    headers: BTreeMap<String, String>,
) -> Result<HeaderMap, StromboliError> {
    let mut out = HeaderMap::new();
    for (key, value) in headers {
        out.insert(
            HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                StromboliError::BadRequest(format!("invalid header name: {key}"))
            })?,
            HeaderValue::from_str(&value).map_err(|_| {
                StromboliError::BadRequest(format!("invalid header value for {key}"))
            })?,
        );
    }
    Ok(out)
}
