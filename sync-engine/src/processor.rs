//! The queue processor - the engine's single worker loop.
//!
//! One task drains the active queue: dispatch the head when eligible,
//! sleep until its due time when not, park on the wake signal when the
//! queue is empty. The queue is single-lane, so a head record waiting
//! out its backoff delays everything behind it.
//!
//! The state lock is never held across a dispatch; the head is cloned,
//! the remote call awaited, and the outcome applied under a fresh lock
//! with an id guard in case the queue was cleared in between. Every
//! transition is persisted before the loop continues.

use crate::api::ApiError;
use crate::engine::EngineShared;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use sync_types::{unix_time_millis, MutationRecord};
use tokio::sync::watch;

/// What the worker decided after inspecting the head of the queue.
enum Step {
    /// Queue empty: park until woken.
    Idle,
    /// Head not yet eligible: sleep out the remaining backoff.
    Wait(Duration),
    /// Head eligible: deliver it.
    Dispatch(MutationRecord),
}

pub(crate) async fn run(shared: Arc<EngineShared>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let step = {
            let state = shared.state.lock().await;
            match state.queue.peek_head() {
                None => Step::Idle,
                Some(head) => {
                    let now = unix_time_millis();
                    if head.is_eligible(now) {
                        Step::Dispatch(head.clone())
                    } else {
                        let due = head.next_attempt_at.unwrap_or(now);
                        Step::Wait(Duration::from_millis(due.saturating_sub(now)))
                    }
                }
            }
        };

        match step {
            Step::Idle => {
                shared.processing.store(false, Ordering::SeqCst);
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    changed = shutdown.changed() => {
                        // The engine was dropped without stop()
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            Step::Wait(delay) => {
                shared.processing.store(false, Ordering::SeqCst);
                tracing::debug!("Head record not yet eligible; waiting {:?}", delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shared.wake.notified() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            Step::Dispatch(record) => {
                shared.processing.store(true, Ordering::SeqCst);
                let outcome = shared.dispatcher.dispatch(&record).await;
                apply_outcome(&shared, record, outcome).await;
            }
        }
    }

    shared.processing.store(false, Ordering::SeqCst);
}

/// Apply one dispatch outcome: remove on success, reschedule a transient
/// failure at the tail, dead-letter a permanent failure or an exhausted
/// retry budget.
async fn apply_outcome(
    shared: &Arc<EngineShared>,
    dispatched: MutationRecord,
    outcome: Result<(), ApiError>,
) {
    let mut state = shared.state.lock().await;

    // The queue may have been cleared while the dispatch was in flight;
    // the id guard stops the outcome from landing on the wrong record.
    let Some(mut record) = state.queue.pop_head_if(dispatched.id) else {
        tracing::warn!("Record {} left the queue mid-dispatch; outcome dropped", dispatched.id);
        return;
    };

    match outcome {
        Ok(()) => {
            tracing::info!("Synced {} (local id {})", record.kind(), record.local_id);
            shared.persist_queue(&state).await;
        }
        Err(error) if error.is_permanent() => {
            tracing::warn!(
                "Backend rejected {} (local id {}): {}; moving to dead letter",
                record.kind(),
                record.local_id,
                error
            );
            state.dead_letter.push(record);
            // Dead-letter snapshot first: if interrupted between the two
            // writes, the record survives in both and load keeps the
            // dead-letter copy.
            shared.persist_dead_letter(&state).await;
            shared.persist_queue(&state).await;
        }
        Err(error) => {
            record.retry_count += 1;
            if shared.policy.is_exhausted(record.retry_count) {
                tracing::warn!(
                    "Retries exhausted for {} (local id {}) after {} attempts: {}; moving to dead letter",
                    record.kind(),
                    record.local_id,
                    record.retry_count,
                    error
                );
                state.dead_letter.push(record);
                shared.persist_dead_letter(&state).await;
                shared.persist_queue(&state).await;
            } else {
                let delay = shared.policy.delay(record.retry_count);
                record.next_attempt_at = Some(unix_time_millis() + delay.as_millis() as u64);
                tracing::info!(
                    "Attempt {} failed for {} (local id {}): {}; retrying in {:?}",
                    record.retry_count,
                    record.kind(),
                    record.local_id,
                    error,
                    delay
                );
                state.queue.push_back(record);
                shared.persist_queue(&state).await;
            }
        }
    }
}
