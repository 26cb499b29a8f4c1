//! Mutation records and their typed payloads.
//!
//! A [`MutationRecord`] is the unit of work for the sync queue: one locally
//! generated write waiting for delivery to the remote API. Payloads form a
//! closed tagged union over the known entity kinds rather than an open JSON
//! map, so malformed work cannot enter the queue.

use crate::ids::{LocalId, MutationId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The closed set of entity kinds the engine can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    /// Create or update a workout record.
    WorkoutUpsert,
    /// Append a logged set to a workout.
    SetAppend,
    /// Create a daily recovery assessment.
    RecoveryAssessmentCreate,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WorkoutUpsert => "workout_upsert",
            Self::SetAppend => "set_append",
            Self::RecoveryAssessmentCreate => "recovery_assessment_create",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle status of a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    /// Scheduled but not yet begun.
    NotStarted,
    /// Currently being performed.
    InProgress,
    /// Finished normally.
    Completed,
    /// Abandoned before completion.
    Cancelled,
}

/// Body fields for creating or updating a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPayload {
    /// Program day this workout belongs to.
    pub program_day_id: i64,
    /// Calendar date of the workout (ISO-8601, `YYYY-MM-DD`).
    pub date: String,
    /// Current lifecycle status.
    pub status: WorkoutStatus,
    /// When the workout started (epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    /// When the workout completed (epoch milliseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
    /// Total volume lifted across all sets, in kilograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_volume_kg: Option<f64>,
    /// Mean reps-in-reserve across all sets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rir: Option<f64>,
}

/// A single logged set appended to a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetPayload {
    /// Workout this set belongs to.
    pub workout_id: i64,
    /// Exercise performed.
    pub exercise_id: i64,
    /// Position of this set within the exercise (1-based).
    pub set_number: u32,
    /// Weight lifted, in kilograms.
    pub weight_kg: f64,
    /// Repetitions completed.
    pub reps: u32,
    /// Reps in reserve at the end of the set (0-4).
    pub rir: u8,
    /// When the set was logged (epoch milliseconds).
    pub timestamp: i64,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A daily recovery self-assessment (three 1-5 subscores).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPayload {
    /// Calendar date of the assessment (ISO-8601, `YYYY-MM-DD`).
    pub date: String,
    /// Sleep quality subscore (1-5).
    pub sleep_quality: u8,
    /// Muscle soreness subscore (1-5).
    pub muscle_soreness: u8,
    /// Mental motivation subscore (1-5).
    pub mental_motivation: u8,
}

/// A locally generated write, tagged by entity kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Mutation {
    /// Create or update a workout.
    WorkoutUpsert(WorkoutPayload),
    /// Append a logged set.
    SetAppend(SetPayload),
    /// Create a recovery assessment.
    RecoveryAssessmentCreate(RecoveryPayload),
}

impl Mutation {
    /// The entity kind of this mutation.
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::WorkoutUpsert(_) => MutationKind::WorkoutUpsert,
            Self::SetAppend(_) => MutationKind::SetAppend,
            Self::RecoveryAssessmentCreate(_) => MutationKind::RecoveryAssessmentCreate,
        }
    }
}

/// The unit of work for the sync queue.
///
/// A record lives in exactly one of the active queue or the dead-letter
/// store. The processor mutates `retry_count` and `next_attempt_at` in
/// place on every failed attempt; an explicit operator requeue is the only
/// thing that resets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Process-unique identifier, assigned at enqueue time.
    pub id: MutationId,
    /// The write to deliver.
    pub mutation: Mutation,
    /// Idempotency key echoed to the remote system on every attempt.
    pub local_id: LocalId,
    /// Failed delivery attempts so far.
    pub retry_count: u32,
    /// When the record was enqueued (epoch milliseconds).
    pub created_at: u64,
    /// Earliest time the next attempt may run (epoch milliseconds).
    /// Absent until the first failure, then always present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<u64>,
}

impl MutationRecord {
    /// Create a fresh record ready for its first delivery attempt.
    pub fn new(mutation: Mutation, local_id: LocalId) -> Self {
        Self {
            id: MutationId::new(),
            mutation,
            local_id,
            retry_count: 0,
            created_at: unix_time_millis(),
            next_attempt_at: None,
        }
    }

    /// The entity kind of the queued write.
    pub fn kind(&self) -> MutationKind {
        self.mutation.kind()
    }

    /// Whether the record may be dispatched at `now` (epoch milliseconds).
    ///
    /// A record is eligible when it has never failed or its backoff window
    /// has elapsed.
    pub fn is_eligible(&self, now: u64) -> bool {
        self.next_attempt_at.map_or(true, |due| due <= now)
    }
}

/// Current Unix time in milliseconds.
pub fn unix_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
