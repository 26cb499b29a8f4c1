//! The sync engine facade.
//!
//! [`SyncEngine`] is one explicit object owning the queue state, retry
//! policy, durable store and dispatcher - constructed once and shared by
//! reference with callers. It exposes the full caller interface:
//! fire-and-forget `enqueue`, drain triggering, introspection snapshots
//! of both queues, and the dead-letter recovery operations.
//!
//! # Durability
//!
//! Every state transition (enqueue, success removal, failure reschedule,
//! dead-letter move) is persisted before the operation completes, so a
//! restart followed by [`SyncEngine::load`] reproduces the last persisted
//! queue. Removal is persisted only after the remote call succeeds; a
//! crash in that window redelivers the record on restart, which the
//! remote side deduplicates via `localId`.

use crate::api::ApiClient;
use crate::dispatch::Dispatcher;
use crate::processor;
use crate::queue_store::QueueStore;
use crate::store::{KeyValueStore, StoreError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use sync_core::{MutationQueue, RetryPolicy};
use sync_types::{LocalId, Mutation, MutationId, MutationRecord};
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

/// Configuration for [`SyncEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    /// Backoff schedule and retry budget.
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Create a configuration with the default retry policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Mutable queue state, guarded by one lock shared between `enqueue` and
/// the processor.
pub(crate) struct EngineState {
    pub(crate) queue: MutationQueue,
    pub(crate) dead_letter: Vec<MutationRecord>,
}

/// Everything the worker task shares with the facade.
pub(crate) struct EngineShared {
    pub(crate) state: Mutex<EngineState>,
    pub(crate) store: QueueStore,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) policy: RetryPolicy,
    pub(crate) wake: Notify,
    pub(crate) processing: AtomicBool,
}

impl EngineShared {
    /// Persist the active queue; a failure is logged and absorbed, and
    /// the in-memory queue stays authoritative until the next persist.
    pub(crate) async fn persist_queue(&self, state: &EngineState) {
        if let Err(error) = self.store.save_queue(&state.queue.records()).await {
            tracing::error!("Failed to persist queue: {}", error);
        }
    }

    /// Persist the dead-letter queue; failures logged and absorbed.
    pub(crate) async fn persist_dead_letter(&self, state: &EngineState) {
        if let Err(error) = self.store.save_dead_letter(&state.dead_letter).await {
            tracing::error!("Failed to persist dead-letter queue: {}", error);
        }
    }
}

/// The offline-first sync engine.
///
/// See the [module documentation](self) for the durability contract.
pub struct SyncEngine {
    shared: Arc<EngineShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl SyncEngine {
    /// Create an engine over a durable store and an API client.
    ///
    /// The engine starts empty and idle: call [`load`](Self::load) to
    /// restore persisted state, then [`start`](Self::start) to begin
    /// draining.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn ApiClient>,
        config: SyncConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(EngineShared {
                state: Mutex::new(EngineState {
                    queue: MutationQueue::new(),
                    dead_letter: Vec::new(),
                }),
                store: QueueStore::new(store),
                dispatcher: Dispatcher::new(api),
                policy: config.retry,
                wake: Notify::new(),
                processing: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
            shutdown,
        }
    }

    /// Restore both queues from durable storage.
    ///
    /// An undecodable snapshot is logged and treated as empty (the
    /// engine keeps serving). A record found in both collections is an
    /// interrupted dead-letter move; the dead-letter copy wins.
    pub async fn load(&self) -> Result<(), StoreError> {
        let queue_records = match self.shared.store.load_queue().await {
            Ok(records) => records,
            Err(StoreError::Decode(error)) => {
                tracing::warn!("Discarding undecodable queue snapshot: {}", error);
                Vec::new()
            }
            Err(error) => return Err(error),
        };
        let dead_letter = match self.shared.store.load_dead_letter().await {
            Ok(records) => records,
            Err(StoreError::Decode(error)) => {
                tracing::warn!("Discarding undecodable dead-letter snapshot: {}", error);
                Vec::new()
            }
            Err(error) => return Err(error),
        };

        let dead_ids: HashSet<MutationId> = dead_letter.iter().map(|r| r.id).collect();
        let mut queue = MutationQueue::from_records(queue_records);
        queue.retain(|r| !dead_ids.contains(&r.id));

        let mut state = self.shared.state.lock().await;
        tracing::info!(
            "Loaded {} queued and {} dead-lettered records",
            queue.len(),
            dead_letter.len()
        );
        state.queue = queue;
        state.dead_letter = dead_letter;
        drop(state);

        self.shared.wake.notify_one();
        Ok(())
    }

    /// Start the queue processor if it is not already running, and wake
    /// it for an immediate drain pass.
    ///
    /// Exactly one worker task exists at a time.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        let needs_spawn = worker.as_ref().map_or(true, |handle| handle.is_finished());
        if needs_spawn {
            // send_replace: a plain send would not update the value once
            // the previous worker's receiver is gone.
            self.shutdown.send_replace(false);
            let shared = Arc::clone(&self.shared);
            let shutdown_rx = self.shutdown.subscribe();
            *worker = Some(tokio::spawn(processor::run(shared, shutdown_rx)));
            tracing::debug!("Queue processor started");
        }
        drop(worker);
        self.shared.wake.notify_one();
    }

    /// Stop the queue processor.
    ///
    /// Cancels any pending scheduled resumption without mutating queue
    /// contents; an in-flight dispatch finishes (bounded by the API
    /// client's timeout) and its outcome is applied before the worker
    /// exits. Processing resumes cleanly on the next
    /// [`start`](Self::start).
    pub async fn stop(&self) {
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            self.shutdown.send_replace(true);
            self.shared.wake.notify_one();
            if let Err(error) = handle.await {
                tracing::error!("Queue processor task failed: {}", error);
            }
            tracing::debug!("Queue processor stopped");
        }
    }

    /// Append a mutation to the queue tail and persist it.
    ///
    /// Fire-and-forget: the record is durably persisted before this
    /// returns, the processor is woken, and delivery failures surface
    /// only through the dead-letter interface - never to this caller.
    /// Safe to call concurrently from many tasks.
    pub async fn enqueue(&self, mutation: Mutation, local_id: LocalId) -> MutationId {
        let record = MutationRecord::new(mutation, local_id);
        let id = record.id;

        let mut state = self.shared.state.lock().await;
        tracing::info!("Enqueued {} (local id {})", record.kind(), record.local_id);
        state.queue.push_back(record);
        self.shared.persist_queue(&state).await;
        drop(state);

        self.shared.wake.notify_one();
        id
    }

    /// Request an immediate drain attempt.
    ///
    /// Called on network reconnect or on a periodic interval; a no-op
    /// when the processor is already draining or the queue is empty.
    pub fn trigger_sync(&self) {
        tracing::debug!("Immediate drain requested");
        self.shared.wake.notify_one();
    }

    /// Snapshot of the active queue in dispatch order.
    pub async fn list_queue(&self) -> Vec<MutationRecord> {
        self.shared.state.lock().await.queue.records()
    }

    /// Snapshot of the dead-letter queue in arrival order.
    pub async fn list_dead_letter(&self) -> Vec<MutationRecord> {
        self.shared.state.lock().await.dead_letter.clone()
    }

    /// Move every dead-lettered record back to the active queue tail
    /// with its retry state reset, and empty the dead-letter store.
    ///
    /// One logically atomic step under the state lock. The queue is
    /// persisted before the dead-letter store: if interrupted between
    /// the two writes, the records are still in the dead-letter snapshot
    /// and [`load`](Self::load) keeps that copy.
    pub async fn requeue_dead_letter(&self) {
        let mut state = self.shared.state.lock().await;
        if state.dead_letter.is_empty() {
            return;
        }

        let drained = std::mem::take(&mut state.dead_letter);
        let count = drained.len();
        for mut record in drained {
            record.retry_count = 0;
            record.next_attempt_at = None;
            state.queue.push_back(record);
        }

        self.shared.persist_queue(&state).await;
        self.shared.persist_dead_letter(&state).await;
        drop(state);

        tracing::info!("Requeued {} dead-lettered records", count);
        self.shared.wake.notify_one();
    }

    /// Delete every dead-lettered record.
    pub async fn clear_dead_letter(&self) {
        let mut state = self.shared.state.lock().await;
        let count = state.dead_letter.len();
        state.dead_letter.clear();
        if let Err(error) = self.shared.store.clear_dead_letter().await {
            tracing::error!("Failed to clear dead-letter snapshot: {}", error);
        }
        drop(state);
        tracing::info!("Cleared {} dead-lettered records", count);
    }

    /// Delete every queued record without dispatching it.
    pub async fn clear_queue(&self) {
        let mut state = self.shared.state.lock().await;
        let count = state.queue.len();
        state.queue.clear();
        self.shared.persist_queue(&state).await;
        drop(state);
        tracing::info!("Cleared {} queued records", count);
    }

    /// Whether the processor is actively dispatching (as opposed to idle
    /// or waiting out a backoff delay).
    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockApiClient};
    use crate::queue_store::{DEAD_LETTER_KEY, QUEUE_KEY};
    use crate::store::{KeyValueStore, MemoryStore};
    use std::time::{Duration, Instant};
    use sync_types::{Mutation, RecoveryPayload, SetPayload, WorkoutPayload, WorkoutStatus};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(20), 5)
    }

    fn make_engine(store: &MemoryStore, api: &MockApiClient, policy: RetryPolicy) -> SyncEngine {
        SyncEngine::new(
            Arc::new(store.clone()),
            Arc::new(api.clone()),
            SyncConfig::new().with_retry(policy),
        )
    }

    fn workout(program_day_id: i64) -> Mutation {
        Mutation::WorkoutUpsert(WorkoutPayload {
            program_day_id,
            date: "2026-01-15".to_string(),
            status: WorkoutStatus::InProgress,
            started_at: Some(1_768_521_600_000),
            completed_at: None,
            total_volume_kg: None,
            average_rir: None,
        })
    }

    fn set(workout_id: i64) -> Mutation {
        Mutation::SetAppend(SetPayload {
            workout_id,
            exercise_id: 4,
            set_number: 1,
            weight_kg: 80.0,
            reps: 10,
            rir: 2,
            timestamp: 1_768_521_700_000,
            notes: None,
        })
    }

    fn recovery() -> Mutation {
        Mutation::RecoveryAssessmentCreate(RecoveryPayload {
            date: "2026-01-15".to_string(),
            sleep_quality: 4,
            muscle_soreness: 2,
            mental_motivation: 3,
        })
    }

    async fn wait_until_queue_empty(engine: &SyncEngine) {
        for _ in 0..600 {
            if engine.list_queue().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue did not drain");
    }

    async fn wait_for_dead_letter(engine: &SyncEngine, count: usize) {
        for _ in 0..600 {
            if engine.list_dead_letter().await.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("dead letter never reached {count} records");
    }

    async fn wait_for_calls(api: &MockApiClient, count: usize) {
        for _ in 0..600 {
            if api.call_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("api never saw {count} calls");
    }

    // ===========================================
    // Enqueue Tests
    // ===========================================

    #[tokio::test]
    async fn enqueue_persists_before_returning() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        engine.enqueue(workout(1), LocalId::new(7)).await;

        // No worker is running: the snapshot must already be durable.
        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].local_id, LocalId::new(7));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn enqueue_appends_to_tail() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        engine.enqueue(workout(1), LocalId::new(1)).await;
        engine.enqueue(set(1), LocalId::new(2)).await;

        let queued = engine.list_queue().await;
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].local_id, LocalId::new(1));
        assert_eq!(queued[1].local_id, LocalId::new(2));
        assert_eq!(queued[0].retry_count, 0);
        assert!(queued[0].next_attempt_at.is_none());
    }

    // ===========================================
    // Drain Tests
    // ===========================================

    #[tokio::test]
    async fn successful_record_is_removed_everywhere() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(set(12), LocalId::new(5)).await;
        wait_until_queue_empty(&engine).await;

        assert_eq!(api.call_count(), 1);
        assert!(engine.list_dead_letter().await.is_empty());

        // The removal is durable too
        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert!(records.is_empty());

        engine.stop().await;
    }

    #[tokio::test]
    async fn dispatch_uses_kind_route_and_local_id() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(recovery(), LocalId::new(3)).await;
        wait_until_queue_empty(&engine).await;

        let call = api.last_call().unwrap();
        assert_eq!(call.path, "/api/recovery-assessments");
        assert_eq!(call.body["localId"], 3);
        assert_eq!(call.body["sleep_quality"], 4);

        engine.stop().await;
    }

    #[tokio::test]
    async fn records_dispatch_in_enqueue_order() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        engine.enqueue(workout(1), LocalId::new(1)).await;
        engine.enqueue(set(1), LocalId::new(2)).await;
        engine.enqueue(recovery(), LocalId::new(3)).await;

        engine.start().await;
        wait_until_queue_empty(&engine).await;

        let paths: Vec<_> = api.calls().into_iter().map(|c| c.path).collect();
        assert_eq!(
            paths,
            vec!["/api/workouts", "/api/sets", "/api/recovery-assessments"]
        );

        engine.stop().await;
    }

    #[tokio::test]
    async fn idle_engine_is_not_processing() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        assert!(!engine.is_processing());
        engine.start().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!engine.is_processing());
        engine.stop().await;
    }

    // ===========================================
    // Retry Tests
    // ===========================================

    #[tokio::test]
    async fn transient_failures_retry_with_backoff() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_times(3, ApiError::Server { status: 500 });
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        let started = Instant::now();
        engine.enqueue(workout(1), LocalId::new(7)).await;
        wait_until_queue_empty(&engine).await;
        let elapsed = started.elapsed();

        // 3 failures then success: exactly 4 dispatches, every one
        // carrying the idempotency key.
        assert_eq!(api.call_count(), 4);
        for call in api.calls() {
            assert_eq!(call.body["localId"], 7);
        }
        assert!(engine.list_dead_letter().await.is_empty());

        // Backoff of 20 + 40 + 80 ms must have elapsed before the
        // successful attempt.
        assert!(
            elapsed >= Duration::from_millis(140),
            "drained too fast: {elapsed:?}"
        );

        engine.stop().await;
    }

    #[tokio::test]
    async fn retry_state_is_persisted() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_always(ApiError::Network("offline".into()));
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(set(1), LocalId::new(2)).await;
        wait_for_calls(&api, 1).await;
        engine.stop().await;

        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].retry_count >= 1);
        assert!(records[0].next_attempt_at.is_some());
    }

    // ===========================================
    // Dead Letter Tests
    // ===========================================

    #[tokio::test]
    async fn exhausted_budget_moves_record_to_dead_letter() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_always(ApiError::Network("offline".into()));
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(workout(2), LocalId::new(9)).await;
        wait_for_dead_letter(&engine, 1).await;
        engine.stop().await;

        assert_eq!(api.call_count(), 5);
        assert!(engine.list_queue().await.is_empty());

        let dead = engine.list_dead_letter().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].local_id, LocalId::new(9));
        assert_eq!(dead[0].retry_count, 5);

        // Durable in the dead-letter snapshot, gone from the queue one
        let bytes = store.get(DEAD_LETTER_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn five_failing_records_dead_letter_in_order() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_always(ApiError::Server { status: 503 });
        let engine = make_engine(&store, &api, fast_policy());

        engine.enqueue(workout(1), LocalId::new(1)).await;
        engine.enqueue(set(1), LocalId::new(2)).await;
        engine.enqueue(recovery(), LocalId::new(3)).await;
        engine.enqueue(set(2), LocalId::new(4)).await;
        engine.enqueue(workout(2), LocalId::new(5)).await;

        engine.start().await;
        wait_for_dead_letter(&engine, 5).await;
        engine.stop().await;

        // 5 attempts each
        assert_eq!(api.call_count(), 25);
        assert!(engine.list_queue().await.is_empty());

        let locals: Vec<_> = engine
            .list_dead_letter()
            .await
            .iter()
            .map(|r| r.local_id)
            .collect();
        assert_eq!(
            locals,
            vec![
                LocalId::new(1),
                LocalId::new(2),
                LocalId::new(3),
                LocalId::new(4),
                LocalId::new(5)
            ]
        );
    }

    #[tokio::test]
    async fn permanent_rejection_dead_letters_after_one_attempt() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.queue_outcome(Err(ApiError::Rejected {
            status: 422,
            message: "rir out of range".to_string(),
        }));
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(set(1), LocalId::new(6)).await;
        wait_for_dead_letter(&engine, 1).await;
        engine.stop().await;

        assert_eq!(api.call_count(), 1);
        let dead = engine.list_dead_letter().await;
        assert_eq!(dead[0].retry_count, 0);
        assert!(engine.list_queue().await.is_empty());
    }

    // ===========================================
    // Recovery Tests
    // ===========================================

    #[tokio::test]
    async fn requeue_dead_letter_resets_and_drains() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_always(ApiError::Network("offline".into()));
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(workout(1), LocalId::new(1)).await;
        engine.enqueue(set(1), LocalId::new(2)).await;
        wait_for_dead_letter(&engine, 2).await;
        engine.stop().await;

        // Back online
        api.reset();
        engine.requeue_dead_letter().await;

        let queued = engine.list_queue().await;
        assert_eq!(queued.len(), 2);
        for record in &queued {
            assert_eq!(record.retry_count, 0);
            assert!(record.next_attempt_at.is_none());
        }
        assert_eq!(queued[0].local_id, LocalId::new(1));
        assert_eq!(queued[1].local_id, LocalId::new(2));
        assert!(engine.list_dead_letter().await.is_empty());

        engine.start().await;
        wait_until_queue_empty(&engine).await;
        engine.stop().await;

        assert_eq!(api.call_count(), 2);
        assert!(engine.list_dead_letter().await.is_empty());
    }

    #[tokio::test]
    async fn clear_dead_letter_deletes_records() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.queue_outcome(Err(ApiError::Rejected {
            status: 400,
            message: "bad date".to_string(),
        }));
        let engine = make_engine(&store, &api, fast_policy());
        engine.start().await;

        engine.enqueue(recovery(), LocalId::new(1)).await;
        wait_for_dead_letter(&engine, 1).await;
        engine.stop().await;

        engine.clear_dead_letter().await;

        assert!(engine.list_dead_letter().await.is_empty());
        assert_eq!(store.get(DEAD_LETTER_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_queue_discards_pending_records() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        engine.enqueue(workout(1), LocalId::new(1)).await;
        engine.enqueue(workout(2), LocalId::new(2)).await;
        engine.clear_queue().await;

        assert!(engine.list_queue().await.is_empty());
        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert!(records.is_empty());
    }

    // ===========================================
    // Restart Tests
    // ===========================================

    #[tokio::test]
    async fn reload_reproduces_queue_content_and_order() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();

        let first = make_engine(&store, &api, fast_policy());
        first.enqueue(workout(1), LocalId::new(1)).await;
        first.enqueue(set(1), LocalId::new(2)).await;
        first.enqueue(recovery(), LocalId::new(3)).await;
        let before = first.list_queue().await;
        drop(first);

        let second = make_engine(&store, &api, fast_policy());
        second.load().await.unwrap();

        assert_eq!(second.list_queue().await, before);
        assert!(second.list_dead_letter().await.is_empty());
    }

    #[tokio::test]
    async fn load_keeps_the_dead_letter_copy_of_a_duplicated_record() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();

        // Simulate a crash between the two writes of a dead-letter move:
        // the same record persisted in both collections.
        let record = MutationRecord::new(workout(1), LocalId::new(1));
        let queue_store = QueueStore::new(Arc::new(store.clone()));
        queue_store.save_queue(&[record.clone()]).await.unwrap();
        queue_store.save_dead_letter(&[record]).await.unwrap();

        let engine = make_engine(&store, &api, fast_policy());
        engine.load().await.unwrap();

        assert!(engine.list_queue().await.is_empty());
        assert_eq!(engine.list_dead_letter().await.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_snapshot_loads_empty() {
        let store = MemoryStore::new();
        store.set(QUEUE_KEY, b"not json").await.unwrap();

        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        engine.load().await.unwrap();
        assert!(engine.list_queue().await.is_empty());
    }

    #[tokio::test]
    async fn stop_preserves_queue_and_start_resumes() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        api.fail_times(2, ApiError::Network("flaky".into()));
        // Wide backoff so the stop lands inside the first delay
        let engine = make_engine(&store, &api, RetryPolicy::new(Duration::from_millis(200), 5));
        engine.start().await;

        engine.enqueue(set(1), LocalId::new(4)).await;
        wait_for_calls(&api, 1).await;
        engine.stop().await;

        let queued = engine.list_queue().await;
        assert_eq!(queued.len(), 1);
        assert!(queued[0].retry_count >= 1);

        engine.start().await;
        wait_until_queue_empty(&engine).await;
        engine.stop().await;

        assert_eq!(api.call_count(), 3);
        assert!(engine.list_dead_letter().await.is_empty());
    }

    // ===========================================
    // Concurrency Tests
    // ===========================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueue_is_safe() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = Arc::new(make_engine(&store, &api, fast_policy()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.enqueue(set(1), LocalId::new(i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(engine.list_queue().await.len(), 10);

        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 10);
    }

    #[tokio::test]
    async fn persistence_failure_is_absorbed() {
        let store = MemoryStore::new();
        let api = MockApiClient::new();
        let engine = make_engine(&store, &api, fast_policy());

        store.fail_next_set("disk full");
        engine.enqueue(workout(1), LocalId::new(1)).await;

        // In-memory state stays authoritative despite the failed persist
        assert_eq!(engine.list_queue().await.len(), 1);
        assert_eq!(store.get(QUEUE_KEY).await.unwrap(), None);

        // The next persist writes the full snapshot
        engine.enqueue(workout(2), LocalId::new(2)).await;
        let bytes = store.get(QUEUE_KEY).await.unwrap().unwrap();
        let records: Vec<MutationRecord> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(records.len(), 2);
    }
}
