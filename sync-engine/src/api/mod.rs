//! The remote API collaborator.
//!
//! This module provides a pluggable client for the backend HTTP API
//! (real HTTP via reqwest, mock for testing).
//!
//! # Design
//!
//! The client is a single async `post` call; the engine never needs
//! anything richer. Errors carry an explicit transient/permanent split:
//! the queue processor retries transient failures with backoff and
//! dead-letters a record on the first permanent failure, so a rejected
//! body cannot burn the whole retry budget before parking.

mod http;
mod mock;

pub use http::HttpApiClient;
pub use mock::{MockApiClient, RecordedCall};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Timeout for a single request; expiry reports as [`ApiError::Timeout`].
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors reported by the API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection-level failure (DNS, refused, reset). Transient.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the timeout. Transient.
    #[error("request timed out")]
    Timeout,

    /// The server failed (5xx). Transient.
    #[error("server error: status {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The server rejected the request (4xx). Permanent.
    #[error("request rejected: status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for the dead-letter operator.
        message: String,
    },

    /// The request body could not be encoded. Permanent.
    #[error("request body not encodable: {0}")]
    Encode(String),
}

impl ApiError {
    /// Whether retrying the same request cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { .. } | Self::Encode(_))
    }
}

/// Trait for the authenticated backend API.
///
/// Implementations are stateless from the engine's perspective; the
/// engine serializes its own dispatches.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// POST a JSON body to `path`.
    ///
    /// Success iff the backend reports a 2xx status.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ApiError>;
}
