//! Mock API client for testing.
//!
//! Allows scripting outcomes and capturing posted bodies for verification.

use super::{ApiClient, ApiError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A call captured by [`MockApiClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Path the body was posted to.
    pub path: String,
    /// The JSON body.
    pub body: serde_json::Value,
}

/// Mock API client for testing.
///
/// Records every call and replays scripted outcomes: queued outcomes are
/// consumed first, then the standing outcome - success unless
/// `fail_always` was set.
#[derive(Debug, Default)]
pub struct MockApiClient {
    inner: Arc<Mutex<MockApiClientInner>>,
}

#[derive(Debug, Default)]
struct MockApiClientInner {
    calls: Vec<RecordedCall>,
    outcomes: VecDeque<Result<(), ApiError>>,
    standing_failure: Option<ApiError>,
}

impl MockApiClient {
    /// Create a new mock client that succeeds on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome for the next call.
    pub fn queue_outcome(&self, outcome: Result<(), ApiError>) {
        let mut inner = self.inner.lock().unwrap();
        inner.outcomes.push_back(outcome);
    }

    /// Queue `count` failures with the given error.
    pub fn fail_times(&self, count: usize, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        for _ in 0..count {
            inner.outcomes.push_back(Err(error.clone()));
        }
    }

    /// Fail every call that has no queued outcome.
    pub fn fail_always(&self, error: ApiError) {
        let mut inner = self.inner.lock().unwrap();
        inner.standing_failure = Some(error);
    }

    /// Get all calls that were made.
    pub fn calls(&self) -> Vec<RecordedCall> {
        let inner = self.inner.lock().unwrap();
        inner.calls.clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.calls.len()
    }

    /// Get the most recent call.
    pub fn last_call(&self) -> Option<RecordedCall> {
        let inner = self.inner.lock().unwrap();
        inner.calls.last().cloned()
    }

    /// Clear all state (calls, outcomes, standing failure).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockApiClientInner::default();
    }
}

impl Clone for MockApiClient {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(RecordedCall {
            path: path.to_string(),
            body: body.clone(),
        });

        if let Some(outcome) = inner.outcomes.pop_front() {
            return outcome;
        }

        match &inner.standing_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
