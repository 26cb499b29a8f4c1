//! Durable snapshots of the queue collections.
//!
//! The active queue and the dead-letter queue live under two independent
//! keys, each an ordered JSON array of records written wholesale after
//! every state transition. A restart reloads exactly the last persisted
//! snapshot of each.

use crate::store::{KeyValueStore, StoreError};
use std::sync::Arc;
use sync_types::MutationRecord;

/// Storage key for the active queue.
pub const QUEUE_KEY: &str = "sync_queue";

/// Storage key for the dead-letter queue.
pub const DEAD_LETTER_KEY: &str = "failed_queue";

/// JSON snapshot persistence for the two queue collections.
#[derive(Clone)]
pub struct QueueStore {
    kv: Arc<dyn KeyValueStore>,
}

impl QueueStore {
    /// Create a queue store over any key-value backend.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Load the active queue. An absent key is an empty queue.
    pub async fn load_queue(&self) -> Result<Vec<MutationRecord>, StoreError> {
        self.load(QUEUE_KEY).await
    }

    /// Persist the active queue wholesale.
    pub async fn save_queue(&self, records: &[MutationRecord]) -> Result<(), StoreError> {
        self.save(QUEUE_KEY, records).await
    }

    /// Load the dead-letter queue. An absent key is an empty queue.
    pub async fn load_dead_letter(&self) -> Result<Vec<MutationRecord>, StoreError> {
        self.load(DEAD_LETTER_KEY).await
    }

    /// Persist the dead-letter queue wholesale.
    pub async fn save_dead_letter(&self, records: &[MutationRecord]) -> Result<(), StoreError> {
        self.save(DEAD_LETTER_KEY, records).await
    }

    /// Drop the dead-letter snapshot entirely.
    pub async fn clear_dead_letter(&self) -> Result<(), StoreError> {
        self.kv.delete(DEAD_LETTER_KEY).await
    }

    async fn load(&self, key: &str) -> Result<Vec<MutationRecord>, StoreError> {
        match self.kv.get(key).await? {
            None => Ok(Vec::new()),
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    async fn save(&self, key: &str, records: &[MutationRecord]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(records)?;
        self.kv.set(key, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use sync_types::{LocalId, Mutation, MutationRecord, RecoveryPayload};

    fn make_record(local_id: i64) -> MutationRecord {
        MutationRecord::new(
            Mutation::RecoveryAssessmentCreate(RecoveryPayload {
                date: "2026-02-01".to_string(),
                sleep_quality: 4,
                muscle_soreness: 1,
                mental_motivation: 5,
            }),
            LocalId::new(local_id),
        )
    }

    #[tokio::test]
    async fn queue_roundtrip_preserves_order() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        let records = vec![make_record(1), make_record(2), make_record(3)];

        store.save_queue(&records).await.unwrap();
        let loaded = store.load_queue().await.unwrap();

        assert_eq!(loaded, records);
    }

    #[tokio::test]
    async fn absent_snapshots_load_empty() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load_queue().await.unwrap().is_empty());
        assert!(store.load_dead_letter().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_independent() {
        let store = QueueStore::new(Arc::new(MemoryStore::new()));
        store.save_queue(&[make_record(1)]).await.unwrap();
        store.save_dead_letter(&[make_record(2)]).await.unwrap();

        assert_eq!(store.load_queue().await.unwrap()[0].local_id, LocalId::new(1));
        assert_eq!(
            store.load_dead_letter().await.unwrap()[0].local_id,
            LocalId::new(2)
        );
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_decode_error() {
        let kv = MemoryStore::new();
        kv.set(QUEUE_KEY, b"not json").await.unwrap();

        let store = QueueStore::new(Arc::new(kv));
        let result = store.load_queue().await;
        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn clear_dead_letter_removes_snapshot() {
        let kv = MemoryStore::new();
        let store = QueueStore::new(Arc::new(kv.clone()));
        store.save_dead_letter(&[make_record(1)]).await.unwrap();

        store.clear_dead_letter().await.unwrap();

        assert!(store.load_dead_letter().await.unwrap().is_empty());
        assert_eq!(kv.get(DEAD_LETTER_KEY).await.unwrap(), None);
    }
}
