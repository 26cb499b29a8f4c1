//! Command implementations for sync-cli.

pub mod clear;
pub mod enqueue;
pub mod requeue;
pub mod status;
pub mod sync;

use crate::config::BackendConfig;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use sync_engine::{FileStore, HttpApiClient, QueueStore, SyncConfig, SyncEngine};

/// Direct snapshot access for the offline commands (status, enqueue,
/// requeue, clear). These never dispatch, so they need no backend
/// configuration.
pub(crate) async fn open_queue_store(data_dir: &Path) -> Result<QueueStore> {
    let store = FileStore::create(data_dir).await?;
    Ok(QueueStore::new(Arc::new(store)))
}

/// Build a loaded engine against the configured backend (for `sync`).
pub(crate) async fn open_engine(data_dir: &Path) -> Result<SyncEngine> {
    let backend = BackendConfig::load(data_dir).await?;
    let store = Arc::new(FileStore::create(data_dir).await?);
    let api = Arc::new(HttpApiClient::new(
        &backend.api_base_url,
        backend.auth_token,
    )?);

    let engine = SyncEngine::new(store, api, SyncConfig::default());
    engine.load().await?;
    Ok(engine)
}
