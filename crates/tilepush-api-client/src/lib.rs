//! HTTP client for the Cesium ion REST API.
//!
//! Provides a minimal client with Bearer auth, generic GET/POST helpers that
//! map every failure to [`ApiError`], and domain methods (assets, archives,
//! downloads) in [`api`]. The CLI and the worker use this client directly.

pub mod api;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tilepush_core::UploaderConfig;

pub use api::ArchiveDownload;

/// Default timeout for metadata calls, and for the response headers of a download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication strategy for a request.
#[derive(Clone)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// No credentials, for presigned URLs handed out by the API.
    None,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
            Auth::None => f.write_str("None"),
        }
    }
}

/// Errors returned by every client call. Raw `reqwest` errors never escape.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Timeouts, connection failures, HTTP 429 and 5xx. Worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Connect(_) => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else if e.is_connect() {
            ApiError::Connect(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Request(e.to_string())
        }
    }
}

/// HTTP client for the Cesium ion API.
///
/// Metadata calls must finish, body included, within `timeout`. Downloads only
/// wait `timeout` for the response headers; the body may take as long as it needs.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            timeout,
        })
    }

    /// Create client from loaded configuration (base URL, token, timeout).
    pub fn from_config(config: &UploaderConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_url.clone(),
            Auth::Bearer(config.access_token.clone()),
            config.http_timeout(),
        )
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Authenticated metadata request bounded by the full timeout.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        with_auth(
            self.client.request(method, url).timeout(self.timeout),
            &self.auth,
        )
    }

    /// GET request with optional query parameters. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.build_url(path);
        let mut request = self.request(Method::GET, &url);

        if !query.is_empty() {
            request = request.query(query);
        }

        let response = check_status(request.send().await?).await?;
        decode(response).await
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.build_url(path);
        let request = self.request(Method::POST, &url).json(body);

        let response = check_status(request.send().await?).await?;
        decode(response).await
    }

    /// GET whose body is streamed by the caller. Only the wait for the response
    /// headers is bounded.
    pub(crate) async fn open_stream(&self, url: &str, auth: &Auth) -> Result<Response, ApiError> {
        let request = with_auth(self.client.get(url), auth);
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                ApiError::Timeout(format!(
                    "no response from {} within {}s",
                    url,
                    self.timeout.as_secs()
                ))
            })??;
        check_status(response).await
    }

    pub(crate) fn auth(&self) -> &Auth {
        &self.auth
    }
}

fn with_auth(request: RequestBuilder, auth: &Auth) -> RequestBuilder {
    match auth {
        Auth::Bearer(token) => request.bearer_auth(token),
        Auth::None => request,
    }
}

/// Turn non-2xx responses into `ApiError`, keeping the body for diagnostics.
pub(crate) async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    tracing::debug!(status = status.as_u16(), url = %url, "API request failed");

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(url));
    }

    Err(ApiError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiError::Timeout("t".into()).is_transient());
        assert!(ApiError::Connect("c".into()).is_transient());
        assert!(ApiError::Status {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(ApiError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!ApiError::Status {
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!ApiError::NotFound("x".into()).is_transient());
        assert!(!ApiError::Decode("x".into()).is_transient());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ApiClient::new(
            "https://api.cesium.com/".to_string(),
            Auth::Bearer("t".into()),
            DEFAULT_TIMEOUT,
        )
        .unwrap();
        assert_eq!(client.build_url("/v1/assets"), "https://api.cesium.com/v1/assets");
    }

    #[test]
    fn test_auth_debug_hides_token() {
        assert_eq!(format!("{:?}", Auth::Bearer("secret".into())), "Bearer(***)");
    }
}
