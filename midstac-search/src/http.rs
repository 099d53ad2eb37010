//! Shared HTTP plumbing for catalog backends and the geocoder.
//!
//! Provides a configured [`reqwest::Client`] and the mapping from HTTP
//! failures to [`BackendError`] kinds. Error messages never carry the request
//! URL.

use crate::error::{BackendError, SearchError};
use std::time::Duration;

/// Longest response-body excerpt quoted in an error message.
const MAX_ERROR_DETAIL: usize = 200;

/// Build a [`reqwest::Client`] for catalog requests.
///
/// The client has:
/// - The given request timeout
/// - The given User-Agent
/// - Gzip decompression
/// - At most 10 redirects
///
/// # Errors
///
/// Returns [`SearchError::Config`] if the client cannot be constructed.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a transport-level failure.
pub(crate) fn map_transport_error(err: reqwest::Error) -> BackendError {
    let err = err.without_url();
    if err.is_timeout() {
        BackendError::Timeout(format!("request timed out: {err}"))
    } else {
        BackendError::Http(format!("request failed: {err}"))
    }
}

/// Map a non-success HTTP status to the matching error kind.
pub(crate) fn map_http_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let detail = extract_error_message(body);
    let code = status.as_u16();
    match code {
        401 | 403 => BackendError::Auth(format!("HTTP {code}: {detail}")),
        400 | 422 => BackendError::InvalidQuery(format!("HTTP {code}: {detail}")),
        408 | 504 => BackendError::Timeout(format!("HTTP {code}: {detail}")),
        _ => BackendError::Http(format!("HTTP {code}: {detail}")),
    }
}

/// Pull a readable message out of a CMR (`errors`) or STAC
/// (`description`/`message`) error body.
fn extract_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        ["/errors/0", "/description", "/message", "/error"]
            .iter()
            .find_map(|pointer| v.pointer(pointer).and_then(|m| m.as_str()))
            .map(String::from)
    });
    match message {
        Some(m) => m,
        None if body.trim().is_empty() => "empty response body".into(),
        None => body.trim().chars().take(MAX_ERROR_DETAIL).collect(),
    }
}

/// Read a JSON response body, mapping HTTP and decode failures.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, BackendError> {
    let status = response.status();
    let body = response.text().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(map_http_error(status, &body));
    }
    tracing::trace!(bytes = body.len(), "response received");
    serde_json::from_str(&body).map_err(|e| BackendError::Parse(format!("invalid JSON: {e}")))
}
