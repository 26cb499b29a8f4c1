//! # sync-engine
//!
//! Offline-first durable mutation queue engine for RepSync.
//!
//! Locally generated writes (workouts, set logs, recovery assessments)
//! are persisted at enqueue time, dispatched strictly in order by a
//! single worker, retried with exponential backoff, and parked in a
//! dead-letter store once the retry budget is spent. Delivery is
//! at-least-once; every dispatch carries the record's `localId` so the
//! backend deduplicates redeliveries.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{FileStore, HttpApiClient, SyncConfig, SyncEngine};
//! use sync_types::{LocalId, Mutation};
//!
//! let store = Arc::new(FileStore::create("/var/lib/repsync").await?);
//! let api = Arc::new(HttpApiClient::new("https://api.example.com", Some(token))?);
//! let engine = SyncEngine::new(store, api, SyncConfig::default());
//!
//! engine.load().await?;
//! engine.start().await;
//!
//! // Fire-and-forget: persisted before this returns, delivered when
//! // connectivity allows.
//! engine.enqueue(mutation, LocalId::new(7)).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod dispatch;
pub mod engine;
mod processor;
pub mod queue_store;
pub mod store;
pub mod trigger;

pub use api::{ApiClient, ApiError, HttpApiClient, MockApiClient, RecordedCall, REQUEST_TIMEOUT};
pub use dispatch::{route_for, Dispatcher};
pub use engine::{SyncConfig, SyncEngine};
pub use queue_store::{QueueStore, DEAD_LETTER_KEY, QUEUE_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use trigger::spawn_interval_trigger;
