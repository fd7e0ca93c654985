use reqwest::Url;

use crate::error::StromboliError;
use crate::request::StreamRequest;

/// Default server root, matching a locally started Stromboli.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8585";

/// Parse and validate a server root. Requires an `http`/`https` scheme and a
/// host.
pub fn parse_base_url(input: &str) -> Result<Url, StromboliError> {
    let trimmed = input.trim();
    let url = Url::parse(trimmed)
        .map_err(|error| StromboliError::invalid_url(trimmed, error.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(StromboliError::invalid_url(
            trimmed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(StromboliError::invalid_url(trimmed, "missing host"));
    }

    Ok(url)
}

/// Appends `segments` to the base path, keeping any prefix such as `/api/v1`.
/// Query and fragment of the base are dropped.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> Url {
    let path = base
        .path()
        .split('/')
        .chain(segments.iter().copied())
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    let mut url = base.clone();
    url.set_path(&format!("/{path}"));
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// `GET {base}/run/stream` with the request's query parameters. Empty
/// optional fields are omitted.
pub fn stream_url(base: &Url, request: &StreamRequest) -> Url {
    let mut url = endpoint_url(base, &["run", "stream"]);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("prompt", &request.prompt);
        if !request.session_id.is_empty() {
            query.append_pair("session_id", &request.session_id);
        }
        if !request.workdir.is_empty() {
            query.append_pair("workdir", &request.workdir);
        }
    }
    url
}
