//! Mapping queued mutations onto API calls.
//!
//! Each mutation kind has one fixed backend route. The POST body is the
//! kind-specific payload plus the record's `localId`, so the remote
//! system can deduplicate a mutation that is delivered more than once.

use crate::api::{ApiClient, ApiError};
use std::sync::Arc;
use sync_types::{Mutation, MutationKind, MutationRecord};

/// The backend route for a mutation kind.
pub fn route_for(kind: MutationKind) -> &'static str {
    match kind {
        MutationKind::WorkoutUpsert => "/api/workouts",
        MutationKind::SetAppend => "/api/sets",
        MutationKind::RecoveryAssessmentCreate => "/api/recovery-assessments",
    }
}

/// Delivers records to the remote API.
pub struct Dispatcher {
    api: Arc<dyn ApiClient>,
}

impl Dispatcher {
    /// Create a dispatcher over any API client.
    pub fn new(api: Arc<dyn ApiClient>) -> Self {
        Self { api }
    }

    /// Build the wire body for a record: its payload fields plus `localId`.
    pub fn body_for(record: &MutationRecord) -> Result<serde_json::Value, ApiError> {
        let mut body = match &record.mutation {
            Mutation::WorkoutUpsert(p) => serde_json::to_value(p),
            Mutation::SetAppend(p) => serde_json::to_value(p),
            Mutation::RecoveryAssessmentCreate(p) => serde_json::to_value(p),
        }
        .map_err(|e| ApiError::Encode(e.to_string()))?;

        match body.as_object_mut() {
            Some(map) => {
                map.insert(
                    "localId".to_string(),
                    serde_json::Value::from(record.local_id.value()),
                );
            }
            None => return Err(ApiError::Encode("payload is not a JSON object".to_string())),
        }

        Ok(body)
    }

    /// Attempt delivery of one record.
    pub async fn dispatch(&self, record: &MutationRecord) -> Result<(), ApiError> {
        let body = Self::body_for(record)?;
        self.api.post(route_for(record.kind()), &body).await
    }
}
