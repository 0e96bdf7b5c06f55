//! Owner/manager API client.
//!
//! Provides authenticated HTTP communication with the EatOrder server, used
//! for order pages, station CRUD, menu mutations and login. All raw payload
//! interpretation happens in `normalize`; this module only moves JSON.

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

use crate::error::{Error, Result};

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the server base URL:
/// - strip trailing slashes
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_server_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach server at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid server URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        401 => "Session expired or invalid".to_string(),
        403 => "Account not authorized for this store".to_string(),
        404 => "Server endpoint not found".to_string(),
        s if s >= 500 => format!("Server error (HTTP {s})"),
        s => format!("Unexpected response from server (HTTP {s})"),
    }
}

/// Build the failure message for a non-2xx response, preserving any
/// server-provided `error`/`message` field for diagnostics.
fn error_detail(status: StatusCode, body_text: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body_text) {
        let message = json
            .get("error")
            .or_else(|| json.get("message"))
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .unwrap_or_else(|| status_error(status));
        return format!("{message} (HTTP {})", status.as_u16());
    }
    if !body_text.trim().is_empty() {
        format!(
            "{} (HTTP {}): {}",
            status_error(status),
            status.as_u16(),
            body_text.trim()
        )
    } else {
        format!("{} (HTTP {})", status_error(status), status.as_u16())
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated HTTP client for the owner/manager API.
///
/// Holds the normalised base URL and an optional bearer token. Cloning is
/// cheap (`reqwest::Client` is internally reference-counted).
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    /// Build a client for `server_url`, authenticated with `token` when
    /// present. Login is the only call issued without a token.
    pub fn new(server_url: &str, token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::fetch(None, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: normalize_server_url(server_url),
            token,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request against the API. `path` includes the leading slash,
    /// e.g. `/owner/getstations/{storeId}`.
    ///
    /// Returns the JSON body, or `Value::Null` for empty 204 responses.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let full_url = format!("{}{path}", self.base_url);

        let mut req = self
            .http
            .request(method, &full_url)
            .header("Content-Type", "application/json");

        if let Some(token) = &self.token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::fetch(None, friendly_error(&self.base_url, &e)))?;
        let status = resp.status();

        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            let detail = error_detail(status, &body_text);
            warn!(path, status = status.as_u16(), error = %detail, "api request failed");
            return Err(Error::fetch(Some(status.as_u16()), detail));
        }

        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(|e| {
            Error::fetch(
                Some(status.as_u16()),
                format!("Invalid JSON from server: {e}"),
            )
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_scheme() {
        assert_eq!(
            normalize_server_url("server.eatorder.fr:8000"),
            "https://server.eatorder.fr:8000"
        );
    }

    #[test]
    fn normalize_uses_http_for_localhost() {
        assert_eq!(
            normalize_server_url("localhost:8000"),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_server_url("127.0.0.1:8000"),
            "http://127.0.0.1:8000"
        );
    }

    #[test]
    fn normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_server_url("https://server.eatorder.fr:8000///"),
            "https://server.eatorder.fr:8000"
        );
    }

    #[test]
    fn normalize_trims_whitespace() {
        assert_eq!(
            normalize_server_url("  https://server.eatorder.fr  "),
            "https://server.eatorder.fr"
        );
    }

    #[test]
    fn status_error_maps_auth_failures() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED),
            "Session expired or invalid"
        );
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR),
            "Server error (HTTP 500)"
        );
    }

    #[test]
    fn error_detail_prefers_server_message() {
        let detail = error_detail(
            StatusCode::BAD_REQUEST,
            r#"{"message": "Invalid status transition"}"#,
        );
        assert_eq!(detail, "Invalid status transition (HTTP 400)");
    }

    #[test]
    fn error_detail_falls_back_to_status_text() {
        let detail = error_detail(StatusCode::NOT_FOUND, "");
        assert_eq!(detail, "Server endpoint not found (HTTP 404)");
    }
}
