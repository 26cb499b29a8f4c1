//! # sync-types
//!
//! Record types for the RepSync offline-first synchronization engine.
//!
//! This crate provides the foundational types used across all RepSync crates:
//! - [`MutationId`], [`LocalId`] - Identity types
//! - [`Mutation`], [`MutationKind`] - The closed set of deliverable writes
//! - [`MutationRecord`] - A queued write with its retry bookkeeping

#![warn(missing_docs)]
#![warn(clippy::all)]

mod ids;
mod record;

pub use ids::{LocalId, MutationId};
pub use record::{
    unix_time_millis, Mutation, MutationKind, MutationRecord, RecoveryPayload, SetPayload,
    WorkoutPayload, WorkoutStatus,
};
