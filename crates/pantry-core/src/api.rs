//! JSON request layer over an [`HttpClient`] transport.
//!
//! [`ApiClient::request`] turns one HTTP exchange into either a parsed JSON
//! body or an [`ApiError`]. It never retries and never caches; both are left
//! to the poller and the local cache.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::http_client::{HttpAuth, HttpClient, HttpMethod, HttpRequest, ReqwestHttpClient};
use crate::ValidationError;

/// Failure of a single API request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No response was received (DNS, connect, timeout, reset).
    #[error("network error: {message}")]
    Network { message: String },

    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    /// The server answered 2xx but the body is not JSON.
    #[error("malformed response body: {message}")]
    MalformedBody { message: String },
}

impl ApiError {
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message suitable for a form-level error banner.
    pub fn message(&self) -> &str {
        match self {
            Self::Network { message }
            | Self::Status { message, .. }
            | Self::MalformedBody { message } => message,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "api.network",
            Self::Status { .. } => "api.status",
            Self::MalformedBody { .. } => "api.malformed_body",
        }
    }
}

/// Client for the Pantry REST API rooted at a base URL.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    timeout_ms: u64,
    http_client: Arc<dyn HttpClient>,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ValidationError> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(ValidationError::InvalidBaseUrl { value: base_url });
        }

        Ok(Self {
            base_url: trimmed.to_owned(),
            timeout_ms: 10_000,
            http_client,
        })
    }

    /// Client using the reqwest transport.
    pub fn with_reqwest(base_url: impl Into<String>) -> Result<Self, ValidationError> {
        Self::new(base_url, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one request and parse the JSON body of a 2xx answer.
    ///
    /// `body` is serialized as JSON when present and `auth_token` is sent as a
    /// bearer credential when present. An empty 2xx body parses as
    /// [`Value::Null`].
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        auth_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut request = HttpRequest::new(method, self.url_for(path))
            .with_header("accept", "application/json")
            .with_auth(&HttpAuth::from_token(auth_token))
            .with_timeout_ms(self.timeout_ms);

        if let Some(body) = body {
            let serialized = serde_json::to_string(body).map_err(|e| ApiError::MalformedBody {
                message: format!("request body could not be serialized: {e}"),
            })?;
            request = request.with_json_body(serialized);
        }

        tracing::debug!(method = %method, path, "api request");

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| ApiError::Network {
                message: error.message().to_owned(),
            })?;

        if !response.is_success() {
            let message = extract_error_message(&response.body)
                .unwrap_or_else(|| format!("request failed with status {}", response.status));
            tracing::debug!(status = response.status, path, "api request rejected");
            return Err(ApiError::Status {
                status: response.status,
                message,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response.body).map_err(|e| ApiError::MalformedBody {
            message: e.to_string(),
        })
    }

    pub async fn get(&self, path: &str, auth_token: Option<&str>) -> Result<Value, ApiError> {
        self.request(HttpMethod::Get, path, None, auth_token).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &Value,
        auth_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.request(HttpMethod::Post, path, Some(body), auth_token)
            .await
    }
}

/// Best-effort message lookup in an error body. Never fails.
fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|field| value.get(field).and_then(Value::as_str))
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(str::to_owned)
}
