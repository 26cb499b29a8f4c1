//! HTTP implementation of the API client.

use super::{ApiClient, ApiError, REQUEST_TIMEOUT};
use async_trait::async_trait;

/// API client backed by the real backend over HTTPS.
///
/// Requests are JSON POSTs with an optional bearer token. Responses map
/// onto the error taxonomy: 2xx success, 4xx [`ApiError::Rejected`],
/// 5xx [`ApiError::Server`], connection failures [`ApiError::Network`],
/// and timeouts [`ApiError::Timeout`].
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpApiClient {
    /// Create a client for the given backend base URL.
    ///
    /// `auth_token`, when present, is sent as a bearer token on every
    /// request.
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            http,
            base_url,
            auth_token,
        })
    }

    /// The backend base URL this client posts to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Err(ApiError::Server {
            status: status.as_u16(),
        })
    }
}
